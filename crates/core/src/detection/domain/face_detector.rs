use crate::detection::domain::detection::Detection;
use crate::shared::collaborator::CollaboratorError;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Implementations may keep per-session buffers, hence `&mut self`.
/// Boxes are in the pixel space of the frame passed in.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, CollaboratorError>;
}
