use crate::shared::collaborator::CollaboratorError;
use crate::shared::frame::Frame;
use crate::tracking::domain::track::TrackAssignment;

/// Receives each processed frame with its assignments for rendering.
///
/// The pipeline outputs data only; labeling and drawing belong here.
pub trait FramePresenter: Send {
    fn present(
        &mut self,
        frame: &Frame,
        assignments: &[TrackAssignment],
    ) -> Result<(), CollaboratorError>;

    /// Called once when the session ends, successfully or not.
    fn finish(&mut self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
