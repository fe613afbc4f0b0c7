use std::path::{Path, PathBuf};

use crate::shared::collaborator::CollaboratorError;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

/// Adapts a single still image to the [`FrameSource`] interface.
///
/// Yields exactly one frame (index 0), then end of stream. Decoding is
/// deferred to the first `next_frame` call so that a missing or corrupt
/// file surfaces as a capture failure of the session.
pub struct ImageFileSource {
    path: PathBuf,
    consumed: bool,
}

impl ImageFileSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            consumed: false,
        }
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CollaboratorError> {
        if self.consumed {
            return Ok(None);
        }
        self.consumed = true;
        let image = image::open(&self.path)
            .map_err(|e| format!("failed to read image {}: {e}", self.path.display()))?;
        Ok(Some(Frame::from_rgb_image(image.to_rgb8(), 0)))
    }

    fn close(&mut self) {
        self.consumed = true;
    }
}

/// True when the path has one of the still-image extensions (case-insensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}
