pub const YOLO_MODEL_NAME: &str = "yolov8n-face.onnx";

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;
pub const DEFAULT_MIN_FACE_SIZE: u32 = 40;
pub const DEFAULT_MAX_ASPECT_RATIO: f64 = 2.0;
pub const DEFAULT_MIN_SKIN_FRACTION: f64 = 0.1;
pub const DEFAULT_HASH_SIZE: u32 = 16;
pub const MAX_HASH_SIZE: u32 = 64;
pub const DEFAULT_MATCH_THRESHOLD: u32 = 150;
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.5;
pub const DEFAULT_UNKNOWN_SIMILARITY_THRESHOLD: u32 = 150;
pub const DEFAULT_PROCESSING_IMAGE_SIZE: u32 = 640;
pub const DEFAULT_CROP_PADDING: f64 = 0.1;

/// Side length every face crop is resized to before hashing.
pub const FACE_CROP_SIZE: u32 = 200;

/// Rotation applied by the rotated hash variants, in degrees.
pub const VARIANT_ROTATION_DEGREES: f32 = 5.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
