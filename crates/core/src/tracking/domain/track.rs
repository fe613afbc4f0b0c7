use std::fmt;

use serde::Serialize;

use crate::detection::domain::detection::Detection;
use crate::hashing::domain::fingerprint::FingerprintSet;
use crate::identity::domain::identity::IdentityId;
use crate::identity::domain::matcher::IdentityMatch;
use crate::shared::bounding_box::BoundingBox;

/// Session-scoped track identifier; never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TrackStatus {
    #[serde(rename_all = "camelCase")]
    Known { identity_id: IdentityId, name: String },
    #[serde(rename_all = "camelCase")]
    Unknown { group_id: u64 },
}

impl TrackStatus {
    pub fn is_known(&self) -> bool {
        matches!(self, TrackStatus::Known { .. })
    }

    /// Display label: the person's name, or `Unknown #<group>`.
    pub fn label(&self) -> String {
        match self {
            TrackStatus::Known { name, .. } => name.clone(),
            TrackStatus::Unknown { group_id } => format!("Unknown #{group_id}"),
        }
    }
}

/// A face followed across frames.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub last_box: BoundingBox,
    pub last_fingerprint: FingerprintSet,
    pub status: TrackStatus,
    pub last_seen_frame: u64,
    pub confidence: f64,
    pub missed_frames: u32,
}

/// One surviving detection of the current frame with its hashing and
/// matching results.
#[derive(Debug, Clone)]
pub struct TrackInput {
    pub detection: Detection,
    pub fingerprint: FingerprintSet,
    pub matched: Option<IdentityMatch>,
}

/// Per-detection output handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackAssignment {
    pub track_id: TrackId,
    pub status: TrackStatus,
    pub confidence: f64,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}
