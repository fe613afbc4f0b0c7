use std::collections::HashMap;

use serde::Serialize;

use crate::tracking::domain::track::{TrackAssignment, TrackStatus};

/// One distinct person (known identity or unknown group) seen in a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
    pub status: TrackStatus,
    pub best_confidence: f64,
    pub first_frame: usize,
    pub sightings: usize,
}

/// Distinct persons seen during one session.
#[derive(Debug, Clone, Default)]
pub struct SeenPersons {
    by_status: HashMap<TrackStatus, Sighting>,
}

impl SeenPersons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every assignment of frame `frame_index`.
    pub fn record(&mut self, frame_index: usize, assignments: &[TrackAssignment]) {
        for assignment in assignments {
            self.by_status
                .entry(assignment.status.clone())
                .and_modify(|seen| {
                    seen.best_confidence = seen.best_confidence.max(assignment.confidence);
                    seen.sightings += 1;
                })
                .or_insert_with(|| Sighting {
                    status: assignment.status.clone(),
                    best_confidence: assignment.confidence,
                    first_frame: frame_index,
                    sightings: 1,
                });
        }
    }

    pub fn get(&self, status: &TrackStatus) -> Option<&Sighting> {
        self.by_status.get(status)
    }

    pub fn len(&self) -> usize {
        self.by_status.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_status.is_empty()
    }

    pub fn known_count(&self) -> usize {
        self.by_status.keys().filter(|s| s.is_known()).count()
    }

    /// Known persons by name, then unknown groups by group id.
    pub fn sorted(&self) -> Vec<&Sighting> {
        let mut all: Vec<&Sighting> = self.by_status.values().collect();
        all.sort_by(|a, b| sort_key(&a.status).cmp(&sort_key(&b.status)));
        all
    }

    pub fn clear(&mut self) {
        self.by_status.clear();
    }
}

fn sort_key(status: &TrackStatus) -> (u8, &str, u64) {
    match status {
        TrackStatus::Known { name, identity_id } => (0, name.as_str(), identity_id.0),
        TrackStatus::Unknown { group_id } => (1, "", *group_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::domain::identity::IdentityId;
    use crate::shared::bounding_box::BoundingBox;
    use crate::tracking::domain::track::TrackId;

    fn assignment(status: TrackStatus, confidence: f64) -> TrackAssignment {
        TrackAssignment {
            track_id: TrackId(1),
            status,
            confidence,
            bbox: BoundingBox::new(0, 0, 10, 10).unwrap(),
        }
    }

    fn known(name: &str, id: u64) -> TrackStatus {
        TrackStatus::Known {
            identity_id: IdentityId(id),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_record_tracks_best_confidence_first_frame_and_count() {
        let mut seen = SeenPersons::new();
        seen.record(3, &[assignment(known("Ana", 1), 0.7)]);
        seen.record(4, &[assignment(known("Ana", 1), 0.9)]);
        seen.record(5, &[assignment(known("Ana", 1), 0.8)]);

        let ana = seen.get(&known("Ana", 1)).unwrap();
        assert_eq!(ana.first_frame, 3);
        assert_eq!(ana.sightings, 3);
        assert!((ana.best_confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sorted_lists_known_by_name_then_unknown_groups() {
        let mut seen = SeenPersons::new();
        seen.record(
            0,
            &[
                assignment(TrackStatus::Unknown { group_id: 10 }, 0.0),
                assignment(known("Zoe", 1), 0.9),
                assignment(TrackStatus::Unknown { group_id: 2 }, 0.0),
                assignment(known("Ana", 2), 0.9),
            ],
        );

        let labels: Vec<String> = seen.sorted().iter().map(|s| s.status.label()).collect();
        assert_eq!(labels, vec!["Ana", "Zoe", "Unknown #2", "Unknown #10"]);
        assert_eq!(seen.known_count(), 2);
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_clear() {
        let mut seen = SeenPersons::new();
        seen.record(0, &[assignment(known("Ana", 1), 0.9)]);
        seen.clear();
        assert!(seen.is_empty());
    }
}
