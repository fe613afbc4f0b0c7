use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::hashing::domain::fingerprint::FingerprintSet;

/// Stable identifier of a registered person; assigned once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub u64);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered person with their reference fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: IdentityId,
    pub name: String,
    /// Identity-variant vectors only.
    pub reference: FingerprintSet,
    pub image_path: Option<PathBuf>,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

/// Everything a repository persists: the identities plus the id counter.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentitySnapshot {
    pub next_id: u64,
    pub identities: Vec<Identity>,
}

impl Default for IdentitySnapshot {
    fn default() -> Self {
        Self {
            next_id: 1,
            identities: Vec::new(),
        }
    }
}
