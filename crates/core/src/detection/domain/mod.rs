pub mod candidate_filter;
pub mod detection;
pub mod face_detector;
pub mod skin_tone;
