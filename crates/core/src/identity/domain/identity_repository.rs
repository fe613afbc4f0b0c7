use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

use super::identity::{IdentityId, IdentitySnapshot};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("identity store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("identity store document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to write reference image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("identity store is corrupt: {0}")]
    Corrupt(String),
    #[error("stored fingerprints use hash size {stored}, configured hash size is {configured}")]
    HashSizeMismatch { stored: u32, configured: u32 },
}

/// Persistence port of the identity store.
///
/// `save` replaces the whole stored state in one step: identities and their
/// fingerprints are written together, so no fingerprint outlives its identity.
pub trait IdentityRepository: Send + Sync {
    fn load(&self) -> Result<IdentitySnapshot, StoreError>;

    fn save(&self, snapshot: &IdentitySnapshot) -> Result<(), StoreError>;

    /// Archives a reference image of identity `id` under a path no other
    /// identity and no earlier image of the same identity occupies.
    /// `None` when this repository keeps no images.
    fn store_image(
        &self,
        id: IdentityId,
        name: &str,
        image: &RgbImage,
    ) -> Result<Option<PathBuf>, StoreError>;

    fn remove_image(&self, path: &Path) -> Result<(), StoreError>;
}
