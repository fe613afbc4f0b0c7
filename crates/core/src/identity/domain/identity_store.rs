use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbImage;
use thiserror::Error;

use crate::hashing::domain::face_crop::FaceCrop;
use crate::hashing::domain::fingerprint::FingerprintSet;
use crate::hashing::domain::fingerprint_hasher::FingerprintHasher;

use super::identity::{Identity, IdentityId, IdentitySnapshot};
use super::identity_repository::{IdentityRepository, StoreError};
use super::matcher::{self, IdentityMatch};

#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("a person named {0:?} is already registered")]
    AlreadyExists(String),
    #[error("face is too similar to registered person {existing:?} (distance {distance})")]
    DuplicatePerson { existing: String, distance: u32 },
    #[error("person name must not be empty")]
    EmptyName,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegisterError {
    /// True for both refusal reasons: the name is taken, or the face already
    /// belongs to someone registered.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            RegisterError::AlreadyExists(_) | RegisterError::DuplicatePerson { .. }
        )
    }
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    next_id: u64,
    identities: BTreeMap<IdentityId, Identity>,
}

impl StoreState {
    fn from_snapshot(snapshot: IdentitySnapshot) -> Self {
        Self {
            next_id: snapshot.next_id,
            identities: snapshot
                .identities
                .into_iter()
                .map(|identity| (identity.id, identity))
                .collect(),
        }
    }

    fn to_snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot {
            next_id: self.next_id,
            identities: self.identities.values().cloned().collect(),
        }
    }

    fn find_by_name(&self, name: &str) -> Option<&Identity> {
        self.identities
            .values()
            .find(|identity| identity.name.eq_ignore_ascii_case(name))
    }
}

/// Registered identities and nearest-match search over them.
///
/// Matching takes a read lock and runs every frame; register, update and
/// delete take the write lock. A write is persisted before it becomes
/// visible, so a failed save leaves the in-memory state untouched.
pub struct IdentityStore {
    repository: Box<dyn IdentityRepository>,
    hasher: Arc<dyn FingerprintHasher>,
    match_threshold: u32,
    state: RwLock<StoreState>,
}

impl IdentityStore {
    /// Loads the repository's identities; they must have been hashed with the
    /// hasher's hash size.
    pub fn open(
        repository: Box<dyn IdentityRepository>,
        hasher: Arc<dyn FingerprintHasher>,
        match_threshold: u32,
    ) -> Result<Self, StoreError> {
        let snapshot = repository.load()?;
        let configured = hasher.hash_size();
        if let Some(identity) = snapshot
            .identities
            .iter()
            .find(|identity| identity.reference.hash_size() != configured)
        {
            return Err(StoreError::HashSizeMismatch {
                stored: identity.reference.hash_size(),
                configured,
            });
        }
        log::info!("Loaded {} registered identities", snapshot.identities.len());
        Ok(Self {
            repository,
            hasher,
            match_threshold,
            state: RwLock::new(StoreState::from_snapshot(snapshot)),
        })
    }

    pub fn match_threshold(&self) -> u32 {
        self.match_threshold
    }

    pub fn hasher(&self) -> &Arc<dyn FingerprintHasher> {
        &self.hasher
    }

    /// Registers `name` with the face in `image`.
    ///
    /// Refused when the name is taken or when the face is already within the
    /// match threshold of a registered identity.
    pub fn register(&self, name: &str, image: &RgbImage) -> Result<IdentityId, RegisterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegisterError::EmptyName);
        }
        let query = self.hasher.query_fingerprint(&FaceCrop::from_image(image));

        let mut state = self.write();
        if let Some(existing) = state.find_by_name(name) {
            return Err(RegisterError::AlreadyExists(existing.name.clone()));
        }
        if let Some(m) = matcher::find_match(&query, state.identities.values(), self.match_threshold)
        {
            return Err(RegisterError::DuplicatePerson {
                existing: m.name,
                distance: m.distance.combined,
            });
        }

        let id = IdentityId(state.next_id);
        let image_path = self.repository.store_image(id, name, image)?;
        let mut next = state.clone();
        next.next_id += 1;
        next.identities.insert(
            id,
            Identity {
                id,
                name: name.to_string(),
                reference: query.reference(),
                image_path: image_path.clone(),
                created_at: unix_now(),
            },
        );
        if let Err(e) = self.repository.save(&next.to_snapshot()) {
            if let Some(path) = &image_path {
                self.discard_image(path);
            }
            return Err(e.into());
        }
        *state = next;
        log::info!("Registered {name:?} as identity {id}");
        Ok(id)
    }

    /// Replaces the reference fingerprint and image of `name`, keeping its id.
    /// Returns `false` when no such person exists.
    pub fn update_image(&self, name: &str, image: &RgbImage) -> Result<bool, StoreError> {
        let reference = self
            .hasher
            .reference_fingerprint(&FaceCrop::from_image(image));

        let mut state = self.write();
        let Some(current) = state.find_by_name(name.trim()).cloned() else {
            return Ok(false);
        };
        let image_path = self.repository.store_image(current.id, &current.name, image)?;

        let mut next = state.clone();
        if let Some(identity) = next.identities.get_mut(&current.id) {
            identity.reference = reference;
            identity.image_path = image_path.clone();
        }
        if let Err(e) = self.repository.save(&next.to_snapshot()) {
            if let Some(path) = &image_path {
                self.discard_image(path);
            }
            return Err(e);
        }
        *state = next;

        if let Some(old) = &current.image_path {
            if image_path.as_ref() != Some(old) {
                self.discard_image(old);
            }
        }
        log::info!("Updated reference image of {:?}", current.name);
        Ok(true)
    }

    /// Removes `name` together with its fingerprint and archived image.
    /// Returns `false` when no such person exists.
    pub fn delete_person(&self, name: &str) -> Result<bool, StoreError> {
        let mut state = self.write();
        let Some(current) = state.find_by_name(name.trim()).cloned() else {
            return Ok(false);
        };
        let mut next = state.clone();
        next.identities.remove(&current.id);
        self.repository.save(&next.to_snapshot())?;
        *state = next;

        if let Some(path) = &current.image_path {
            self.discard_image(path);
        }
        log::info!("Deleted {:?} (identity {})", current.name, current.id);
        Ok(true)
    }

    /// All identities, ordered by name.
    pub fn list_all(&self) -> Vec<Identity> {
        let mut all: Vec<Identity> = self.read().identities.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        all
    }

    pub fn get(&self, name: &str) -> Option<Identity> {
        self.read().find_by_name(name.trim()).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nearest identity to `query` within `threshold` (inclusive).
    pub fn find_match(&self, query: &FingerprintSet, threshold: u32) -> Option<IdentityMatch> {
        matcher::find_match(query, self.read().identities.values(), threshold)
    }

    fn discard_image(&self, path: &std::path::Path) {
        if let Err(e) = self.repository.remove_image(path) {
            log::warn!("Could not remove reference image {}: {e}", path.display());
        }
    }

    // State is replaced only after a successful save, so a poisoned lock
    // still guards a consistent value.
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
