use crate::shared::collaborator::CollaboratorError;
use crate::shared::frame::Frame;

/// Produces frames sequentially from a camera, a video file or a still image.
///
/// End of stream is `Ok(None)`. An `Err` means acquisition failed and the
/// session cannot continue.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, CollaboratorError>;

    /// Live sources produce frames in real time, so stale frames may be
    /// dropped when processing falls behind.
    fn is_live(&self) -> bool {
        false
    }

    /// Releases the capture resource. Safe to call more than once.
    fn close(&mut self);
}
