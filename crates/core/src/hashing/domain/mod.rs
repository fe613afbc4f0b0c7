pub mod face_crop;
pub mod fingerprint;
pub mod fingerprint_hasher;
pub mod hash_vector;
