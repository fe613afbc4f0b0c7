pub mod frame_pipeline;
pub mod frame_presenter;
pub mod frame_slot;
pub mod infrastructure;
pub mod pipeline_logger;
pub mod recognition_session;
pub mod seen_persons;
