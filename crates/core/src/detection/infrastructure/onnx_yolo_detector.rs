/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Letterboxes the frame to the model's square input, runs inference, maps
/// boxes back to frame coordinates and applies greedy NMS. Quality filtering
/// is left to the candidate filter; only a low score floor is applied here.
use std::path::Path;

use image::RgbImage;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::collaborator::CollaboratorError;
use crate::shared::frame::Frame;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Score floor below which raw outputs are discarded before NMS.
pub const DEFAULT_SCORE_FLOOR: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

/// Face class reported on every detection; the model has a single class.
pub const FACE_CLASS: u32 = 0;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    score_floor: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Loads a YOLO face model. The input resolution is read from the model's
    /// NCHW input shape, falling back to 640 when it is dynamic.
    pub fn new(model_path: &Path, score_floor: f64) -> Result<Self, CollaboratorError> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded face model {} (input {}x{})",
            model_path.display(),
            input_size,
            input_size
        );

        Ok(Self {
            session,
            score_floor,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, CollaboratorError> {
        let rgb = frame.to_rgb_image()?;
        let (input_tensor, scale, pad_x, pad_y) = letterbox(&rgb, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("unexpected face model output shape: {shape:?}").into());
        }

        // Output is [1, features, detections] or [1, detections, features].
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < 5 {
            return Err(format!("face model output has {num_feats} features, need 5").into());
        }
        let data = tensor.as_slice().ok_or("face model output is not contiguous")?;
        let feature = |det: usize, f: usize| {
            if transposed {
                data[f * num_dets + det]
            } else {
                data[det * num_feats + f]
            }
        };

        // row: [cx, cy, w, h, score, ...landmarks]
        let mut raw = Vec::new();
        for i in 0..num_dets {
            let score = feature(i, 4) as f64;
            if score < self.score_floor {
                continue;
            }
            let cx = feature(i, 0) as f64;
            let cy = feature(i, 1) as f64;
            let w = feature(i, 2) as f64;
            let h = feature(i, 3) as f64;
            raw.push(RawDetection {
                x1: (cx - w / 2.0 - pad_x as f64) / scale,
                y1: (cy - h / 2.0 - pad_y as f64) / scale,
                x2: (cx + w / 2.0 - pad_x as f64) / scale,
                y2: (cy + h / 2.0 - pad_y as f64) / scale,
                confidence: score,
            });
        }

        let kept = nms(&mut raw, NMS_IOU_THRESH);
        Ok(kept
            .iter()
            .filter_map(|d| {
                let bbox = BoundingBox::from_corners(d.x1, d.y1, d.x2, d.y2).ok()?;
                Some(Detection::new(bbox, d.confidence, FACE_CLASS))
            })
            .collect())
    }
}

fn execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize an image to `target_size` x `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(image: &RgbImage, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = image.width() as f64;
    let fh = image.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // 114/255 gray padding, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src_w = image.width();
    let src_h = image.height();

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h {
        let src_y = ((y as f64 / scale) as u32).min(src_h - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scale) as u32).min(src_w - 1);
            let px = image.get_pixel(src_x, src_y);
            let ty = (pad_y + y) as usize;
            let tx = (pad_x + x) as usize;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = px[c] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

impl RawDetection {
    fn iou(&self, other: &RawDetection) -> f64 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        let area_a = (self.x2 - self.x1) * (self.y2 - self.y1);
        let area_b = (other.x2 - other.x1) * (other.y2 - other.y1);
        inter / (area_a + area_b - inter)
    }
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| k.iou(det) <= iou_thresh) {
            keep.push(det.clone());
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> RawDetection {
        RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // scale = min(640/200, 640/100) = 3.2 → 640x320, padded 160 top/bottom
        let image = RgbImage::from_pixel(200, 100, image::Rgb([128, 128, 128]));
        let (tensor, scale, pad_x, pad_y) = letterbox(&image, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(scale, 3.2, epsilon = 0.01);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let image = RgbImage::from_pixel(100, 50, image::Rgb([255, 255, 255]));
        let (tensor, _, pad_x, pad_y) = letterbox(&image, 640);

        let y = pad_y as usize + 1;
        let x = pad_x as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, x]], 1.0, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0, epsilon = 0.01);
    }

    #[test]
    fn test_nms_suppresses_overlapping_keeping_highest_score() {
        let mut dets = vec![
            raw(0.0, 0.0, 100.0, 100.0, 0.5),
            raw(2.0, 2.0, 102.0, 102.0, 0.9),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_non_overlapping() {
        let mut dets = vec![
            raw(0.0, 0.0, 50.0, 50.0, 0.9),
            raw(200.0, 200.0, 250.0, 250.0, 0.8),
        ];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_nms_empty_input() {
        assert!(nms(&mut [], 0.3).is_empty());
    }

    #[test]
    fn test_raw_iou_perfect_and_disjoint() {
        let a = raw(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = raw(20.0, 20.0, 30.0, 30.0, 1.0);
        assert_relative_eq!(a.iou(&a), 1.0);
        assert_relative_eq!(a.iou(&b), 0.0);
    }
}
