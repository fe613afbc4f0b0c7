pub mod bounding_box;
pub mod collaborator;
pub mod config;
pub mod constants;
pub mod frame;
