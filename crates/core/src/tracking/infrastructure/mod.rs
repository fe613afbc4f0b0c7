pub mod face_tracker;
