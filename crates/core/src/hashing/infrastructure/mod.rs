pub mod clahe;
pub mod dct;
pub mod perceptual_hasher;
