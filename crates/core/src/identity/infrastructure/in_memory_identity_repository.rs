use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbImage;

use crate::identity::domain::identity::{IdentityId, IdentitySnapshot};
use crate::identity::domain::identity_repository::{IdentityRepository, StoreError};

/// Volatile repository for tests and throwaway sessions. Keeps no images.
///
/// Clones share the same underlying snapshot.
#[derive(Clone, Default)]
pub struct InMemoryIdentityRepository {
    snapshot: Arc<Mutex<IdentitySnapshot>>,
}

impl IdentityRepository for InMemoryIdentityRepository {
    fn load(&self) -> Result<IdentitySnapshot, StoreError> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &IdentitySnapshot) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        Ok(())
    }

    fn store_image(
        &self,
        _id: IdentityId,
        _name: &str,
        _image: &RgbImage,
    ) -> Result<Option<PathBuf>, StoreError> {
        Ok(None)
    }

    fn remove_image(&self, _path: &Path) -> Result<(), StoreError> {
        Ok(())
    }
}
