/// Error type returned across collaborator ports (detector, frame source,
/// presenter). `Send + Sync` so failures can cross the capture thread.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;
