use super::face_crop::FaceCrop;
use super::fingerprint::{FingerprintSet, ImageVariant};

/// Computes perceptual fingerprints of face crops.
///
/// Must be deterministic: the same crop and variants always yield
/// bit-identical vectors.
pub trait FingerprintHasher: Send + Sync {
    fn hash_size(&self) -> u32;

    fn fingerprint(&self, crop: &FaceCrop, variants: &[ImageVariant]) -> FingerprintSet;

    /// Every variant, for matching live queries.
    fn query_fingerprint(&self, crop: &FaceCrop) -> FingerprintSet {
        self.fingerprint(crop, &ImageVariant::ALL)
    }

    /// Identity variant only, for storing a registered reference.
    fn reference_fingerprint(&self, crop: &FaceCrop) -> FingerprintSet {
        self.fingerprint(crop, &[ImageVariant::Identity])
    }
}
