/// File-backed identity repository.
///
/// Layout under the store root:
/// - `identities.json`: the `identities` and `fingerprints` record sets
/// - `face_images/<id>_<lower_snake_name>.jpg`: archived reference images;
///   a replacement is written beside the current one as `<id>_<name>.2.jpg`
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::hashing::domain::fingerprint::{FingerprintSet, ImageVariant};
use crate::hashing::domain::hash_vector::{HashAlgorithm, HashVector};
use crate::identity::domain::identity::{Identity, IdentityId, IdentitySnapshot};
use crate::identity::domain::identity_repository::{IdentityRepository, StoreError};

const DOCUMENT_NAME: &str = "identities.json";
const IMAGE_DIR: &str = "face_images";
const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocument {
    version: u32,
    next_id: u64,
    identities: Vec<IdentityRecord>,
    fingerprints: Vec<FingerprintRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityRecord {
    id: u64,
    name: String,
    image_path: Option<PathBuf>,
    created_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintRecord {
    identity_id: u64,
    algorithm: HashAlgorithm,
    hash_size: u32,
    bits: String,
}

pub struct JsonIdentityRepository {
    root: PathBuf,
}

impl JsonIdentityRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self) -> PathBuf {
        self.root.join(DOCUMENT_NAME)
    }

    fn image_dir(&self) -> PathBuf {
        self.root.join(IMAGE_DIR)
    }
}

impl IdentityRepository for JsonIdentityRepository {
    fn load(&self) -> Result<IdentitySnapshot, StoreError> {
        let path = self.document_path();
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IdentitySnapshot::default())
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let document: StoreDocument = serde_json::from_str(&json)?;
        from_document(document)
    }

    fn save(&self, snapshot: &IdentitySnapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;
        let json = serde_json::to_vec_pretty(&to_document(snapshot))?;

        let dest = self.document_path();
        let temp_path = dest.with_extension("json.tmp");
        let result = write_then_rename(&temp_path, &dest, &json);
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn store_image(
        &self,
        id: IdentityId,
        name: &str,
        image: &RgbImage,
    ) -> Result<Option<PathBuf>, StoreError> {
        let dir = self.image_dir();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = free_image_path(&dir, &format!("{id}_{}", image_file_stem(name)));
        image
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|source| StoreError::Image {
                path: path.clone(),
                source,
            })?;
        Ok(Some(path))
    }

    fn remove_image(&self, path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

fn write_then_rename(temp_path: &Path, dest: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| StoreError::Io { path, source }
    };
    let mut file = fs::File::create(temp_path).map_err(io_err(temp_path))?;
    file.write_all(bytes).map_err(io_err(temp_path))?;
    file.sync_all().map_err(io_err(temp_path))?;
    fs::rename(temp_path, dest).map_err(io_err(dest))
}

// The id prefix keeps identities apart even when their names reduce to the
// same stem; the counter keeps a replacement from overwriting the image it
// replaces before the new state is saved.
fn free_image_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.jpg"));
    if !first.exists() {
        return first;
    }
    (2u32..)
        .map(|n| dir.join(format!("{stem}.{n}.jpg")))
        .find(|path| !path.exists())
        .unwrap_or(first)
}

/// `"Juan Pérez"` → `"juan_pérez"`; anything but letters, digits, `-` and `_` is dropped.
pub fn image_file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if stem.is_empty() {
        "person".to_string()
    } else {
        stem
    }
}

fn to_document(snapshot: &IdentitySnapshot) -> StoreDocument {
    let mut identities = Vec::with_capacity(snapshot.identities.len());
    let mut fingerprints = Vec::new();
    for identity in &snapshot.identities {
        identities.push(IdentityRecord {
            id: identity.id.0,
            name: identity.name.clone(),
            image_path: identity.image_path.clone(),
            created_at: identity.created_at,
        });
        for (algorithm, variant, vector) in identity.reference.iter() {
            if variant != ImageVariant::Identity {
                continue;
            }
            fingerprints.push(FingerprintRecord {
                identity_id: identity.id.0,
                algorithm,
                hash_size: identity.reference.hash_size(),
                bits: vector.to_hex(),
            });
        }
    }
    StoreDocument {
        version: DOCUMENT_VERSION,
        next_id: snapshot.next_id,
        identities,
        fingerprints,
    }
}

fn from_document(document: StoreDocument) -> Result<IdentitySnapshot, StoreError> {
    if document.version != DOCUMENT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported document version {}",
            document.version
        )));
    }

    let mut names = HashSet::new();
    let mut references: BTreeMap<u64, Option<FingerprintSet>> = BTreeMap::new();
    for record in &document.identities {
        if record.name.trim().is_empty() {
            return Err(StoreError::Corrupt(format!("identity {} has no name", record.id)));
        }
        if !names.insert(record.name.to_lowercase()) {
            return Err(StoreError::Corrupt(format!("duplicate name {:?}", record.name)));
        }
        if references.insert(record.id, None).is_some() {
            return Err(StoreError::Corrupt(format!("duplicate identity id {}", record.id)));
        }
        if record.id >= document.next_id {
            return Err(StoreError::Corrupt(format!(
                "identity id {} is not below nextId {}",
                record.id, document.next_id
            )));
        }
    }

    let mut hash_size: Option<u32> = None;
    for record in document.fingerprints {
        let slot = references.get_mut(&record.identity_id).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "fingerprint references unknown identity {}",
                record.identity_id
            ))
        })?;
        match hash_size {
            Some(size) if size != record.hash_size => {
                return Err(StoreError::Corrupt(format!(
                    "mixed hash sizes {size} and {}",
                    record.hash_size
                )));
            }
            _ => hash_size = Some(record.hash_size),
        }
        let bits = record.hash_size as usize * record.hash_size as usize;
        let vector = HashVector::from_hex(record.algorithm, &record.bits, bits).map_err(|e| {
            StoreError::Corrupt(format!(
                "{} fingerprint of identity {}: {e}",
                record.algorithm, record.identity_id
            ))
        })?;
        let set = slot.get_or_insert_with(|| FingerprintSet::new(record.hash_size));
        if set.get(record.algorithm, ImageVariant::Identity).is_some() {
            return Err(StoreError::Corrupt(format!(
                "identity {} has two {} fingerprints",
                record.identity_id, record.algorithm
            )));
        }
        set.insert(ImageVariant::Identity, vector)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    }

    let mut identities = Vec::with_capacity(document.identities.len());
    for record in document.identities {
        let reference = references
            .remove(&record.id)
            .flatten()
            .ok_or_else(|| StoreError::Corrupt(format!("identity {} has no fingerprint", record.id)))?;
        identities.push(Identity {
            id: IdentityId(record.id),
            name: record.name,
            reference,
            image_path: record.image_path,
            created_at: record.created_at,
        });
    }

    Ok(IdentitySnapshot {
        next_id: document.next_id,
        identities,
    })
}
