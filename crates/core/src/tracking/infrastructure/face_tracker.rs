/// Frame-to-frame face tracker.
///
/// Association runs in three stages per frame:
/// 1. greedy IoU matching of existing tracks to detections;
/// 2. leftover detections with a known identity open a known track;
/// 3. leftover unknown detections join the closest unassociated unknown track
///    by fingerprint distance, or open a new unknown group.
///
/// Tracks missing from a frame are dropped once they exceed the configured
/// number of missed frames (0 by default: dropped immediately).
use std::collections::HashSet;

use crate::hashing::domain::fingerprint::FingerprintSet;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::config::TrackerConfig;
use crate::tracking::domain::track::{Track, TrackAssignment, TrackId, TrackInput, TrackStatus};

pub struct FaceTracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_track_id: u64,
    next_group_id: u64,
    frame_index: u64,
}

impl FaceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_track_id: 1,
            next_group_id: 1,
            frame_index: 0,
        }
    }

    /// Discards all session state; the next frame starts a new session.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_track_id = 1;
        self.next_group_id = 1;
        self.frame_index = 0;
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Associates this frame's detections with tracks. Returns one assignment
    /// per input, in input order.
    pub fn track(&mut self, inputs: &[TrackInput]) -> Vec<TrackAssignment> {
        self.frame_index += 1;
        let mut assigned: Vec<Option<usize>> = vec![None; inputs.len()];
        let mut associated: HashSet<usize> = HashSet::new();

        self.associate_by_iou(inputs, &mut assigned, &mut associated);

        for (di, input) in inputs.iter().enumerate() {
            if assigned[di].is_some() {
                continue;
            }
            let ti = match &input.matched {
                Some(_) => self.open_track(input),
                None => match self.closest_unknown(&input.fingerprint, &associated) {
                    Some(ti) => {
                        self.refresh(ti, input);
                        ti
                    }
                    None => self.open_track(input),
                },
            };
            associated.insert(ti);
            assigned[di] = Some(ti);
        }

        let assignments = assigned
            .iter()
            .zip(inputs)
            .filter_map(|(ti, input)| {
                let track = &self.tracks[(*ti)?];
                Some(TrackAssignment {
                    track_id: track.id,
                    status: track.status.clone(),
                    confidence: track.confidence,
                    bbox: input.detection.bbox,
                })
            })
            .collect();

        self.age_unassociated(&associated);
        assignments
    }

    fn associate_by_iou(
        &mut self,
        inputs: &[TrackInput],
        assigned: &mut [Option<usize>],
        associated: &mut HashSet<usize>,
    ) {
        let track_boxes: Vec<(usize, BoundingBox)> = self
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (i, t.last_box))
            .collect();
        let det_boxes: Vec<(usize, BoundingBox)> = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| (i, input.detection.bbox))
            .collect();

        for (ti, di) in greedy_match(&track_boxes, &det_boxes, self.config.iou_threshold) {
            self.refresh(ti, &inputs[di]);
            associated.insert(ti);
            assigned[di] = Some(ti);
        }
    }

    /// Updates a continuing track. A fresh identity match overrides its status;
    /// without one the previous status and confidence carry over.
    fn refresh(&mut self, ti: usize, input: &TrackInput) {
        let frame_index = self.frame_index;
        let track = &mut self.tracks[ti];
        track.last_box = input.detection.bbox;
        track.last_fingerprint = input.fingerprint.clone();
        track.last_seen_frame = frame_index;
        track.missed_frames = 0;
        if let Some(m) = &input.matched {
            track.status = TrackStatus::Known {
                identity_id: m.identity_id,
                name: m.name.clone(),
            };
            track.confidence = m.confidence();
        }
    }

    fn open_track(&mut self, input: &TrackInput) -> usize {
        let (status, confidence) = match &input.matched {
            Some(m) => (
                TrackStatus::Known {
                    identity_id: m.identity_id,
                    name: m.name.clone(),
                },
                m.confidence(),
            ),
            None => {
                let group_id = self.next_group_id;
                self.next_group_id += 1;
                (TrackStatus::Unknown { group_id }, 0.0)
            }
        };
        let id = TrackId(self.next_track_id);
        self.next_track_id += 1;
        log::debug!("Opened track {id} ({})", status.label());

        self.tracks.push(Track {
            id,
            last_box: input.detection.bbox,
            last_fingerprint: input.fingerprint.clone(),
            status,
            last_seen_frame: self.frame_index,
            confidence,
            missed_frames: 0,
        });
        self.tracks.len() - 1
    }

    /// Unknown track not yet associated this frame whose fingerprint is
    /// strictly closer than the similarity threshold; ties go to the older track.
    fn closest_unknown(
        &self,
        fingerprint: &FingerprintSet,
        associated: &HashSet<usize>,
    ) -> Option<usize> {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(i, t)| {
                !associated.contains(i) && matches!(t.status, TrackStatus::Unknown { .. })
            })
            .filter_map(|(i, t)| {
                let d = fingerprint.distance_to(&t.last_fingerprint)?;
                (d.combined < self.config.unknown_similarity_threshold).then_some((d.combined, t.id, i))
            })
            .min()
            .map(|(_, _, i)| i)
    }

    fn age_unassociated(&mut self, associated: &HashSet<usize>) {
        for (i, track) in self.tracks.iter_mut().enumerate() {
            if !associated.contains(&i) {
                track.missed_frames += 1;
            }
        }
        let max_missed = self.config.max_missed_frames;
        self.tracks.retain(|t| {
            let keep = t.missed_frames <= max_missed;
            if !keep {
                log::debug!("Dropped track {} ({})", t.id, t.status.label());
            }
            keep
        });
    }
}

/// Greedy IoU matching: pairs at or above `thresh`, taken in descending IoU
/// order, each track/detection used at most once.
fn greedy_match(
    tracks: &[(usize, BoundingBox)],
    dets: &[(usize, BoundingBox)],
    thresh: f64,
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for (ti, track_box) in tracks {
        for (di, det_box) in dets {
            let score = track_box.iou(det_box);
            if score > 0.0 && score >= thresh {
                pairs.push((*ti, *di, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut used_tracks = HashSet::new();
    let mut used_dets = HashSet::new();
    let mut matches = Vec::new();

    for (ti, di, _) in &pairs {
        if !used_tracks.contains(ti) && !used_dets.contains(di) {
            used_tracks.insert(*ti);
            used_dets.insert(*di);
            matches.push((*ti, *di));
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::Detection;
    use crate::hashing::domain::fingerprint::{FingerprintDistance, ImageVariant};
    use crate::hashing::domain::hash_vector::{HashAlgorithm, HashVector};
    use crate::identity::domain::identity::IdentityId;
    use crate::identity::domain::matcher::IdentityMatch;
    use approx::assert_relative_eq;

    /// 64-bit fingerprint whose first `ones` bits are set.
    fn fingerprint(ones: usize) -> FingerprintSet {
        let bits: Vec<bool> = (0..64).map(|i| i < ones).collect();
        let mut fp = FingerprintSet::new(8);
        fp.insert(
            ImageVariant::Identity,
            HashVector::from_bits(HashAlgorithm::Average, &bits),
        )
        .unwrap();
        fp
    }

    fn unknown(x: i32, y: i32, ones: usize) -> TrackInput {
        TrackInput {
            detection: Detection::new(BoundingBox::new(x, y, 50, 50).unwrap(), 0.9, 0),
            fingerprint: fingerprint(ones),
            matched: None,
        }
    }

    fn known(x: i32, y: i32, id: u64, name: &str, distance: u32) -> TrackInput {
        TrackInput {
            matched: Some(IdentityMatch {
                identity_id: IdentityId(id),
                name: name.to_string(),
                distance: FingerprintDistance {
                    combined: distance,
                    max: 64,
                },
            }),
            ..unknown(x, y, 0)
        }
    }

    fn tracker() -> FaceTracker {
        FaceTracker::new(TrackerConfig {
            iou_threshold: 0.5,
            unknown_similarity_threshold: 10,
            max_missed_frames: 0,
        })
    }

    #[test]
    fn test_new_detections_get_unique_ids() {
        let mut tracker = tracker();
        let out = tracker.track(&[unknown(0, 0, 0), unknown(200, 200, 40)]);
        assert_eq!(out.len(), 2);
        assert_ne!(out[0].track_id, out[1].track_id);
        assert_ne!(out[0].status, out[1].status);
    }

    #[test]
    fn test_overlapping_boxes_keep_track_id() {
        let mut tracker = tracker();
        let first = tracker.track(&[unknown(10, 10, 0)]);
        let second = tracker.track(&[unknown(13, 12, 40)]);
        assert_eq!(first[0].track_id, second[0].track_id);
        assert_eq!(first[0].status, second[0].status);
    }

    #[test]
    fn test_distant_dissimilar_boxes_get_new_ids() {
        let mut tracker = tracker();
        let first = tracker.track(&[unknown(0, 0, 0)]);
        let second = tracker.track(&[unknown(300, 300, 40)]);
        assert_ne!(first[0].track_id, second[0].track_id);
    }

    #[test]
    fn test_unknown_regroups_by_fingerprint_without_overlap() {
        let mut tracker = tracker();
        let first = tracker.track(&[unknown(0, 0, 0)]);
        // jumped across the frame, fingerprint distance 3 < 10
        let second = tracker.track(&[unknown(300, 300, 3)]);
        assert_eq!(first[0].track_id, second[0].track_id);
        assert_eq!(second[0].bbox, BoundingBox::new(300, 300, 50, 50).unwrap());
    }

    #[test]
    fn test_unknown_similarity_threshold_is_strict() {
        let mut tracker = tracker();
        let first = tracker.track(&[unknown(0, 0, 0)]);
        let second = tracker.track(&[unknown(300, 300, 10)]);
        assert_ne!(first[0].track_id, second[0].track_id);
    }

    #[test]
    fn test_unknown_track_absorbs_at_most_one_detection() {
        let mut tracker = tracker();
        tracker.track(&[unknown(0, 0, 0)]);
        let out = tracker.track(&[unknown(300, 0, 1), unknown(0, 300, 2)]);
        assert_ne!(out[0].track_id, out[1].track_id);
    }

    #[test]
    fn test_known_match_opens_known_track_with_confidence() {
        let mut tracker = tracker();
        let out = tracker.track(&[known(0, 0, 7, "Alice", 16)]);
        assert_eq!(
            out[0].status,
            TrackStatus::Known {
                identity_id: IdentityId(7),
                name: "Alice".into()
            }
        );
        assert_relative_eq!(out[0].confidence, 0.75);
    }

    #[test]
    fn test_new_unknown_has_zero_confidence() {
        let out = tracker().track(&[unknown(0, 0, 0)]);
        assert_relative_eq!(out[0].confidence, 0.0);
        assert!(!out[0].status.is_known());
    }

    #[test]
    fn test_known_status_survives_unmatched_continuation() {
        let mut tracker = tracker();
        let first = tracker.track(&[known(10, 10, 1, "Alice", 8)]);
        let second = tracker.track(&[unknown(12, 12, 50)]);
        assert_eq!(second[0].track_id, first[0].track_id);
        assert_eq!(second[0].status, first[0].status);
        assert_relative_eq!(second[0].confidence, first[0].confidence);
    }

    #[test]
    fn test_fresh_match_upgrades_unknown_track() {
        let mut tracker = tracker();
        let first = tracker.track(&[unknown(10, 10, 0)]);
        let second = tracker.track(&[known(12, 12, 2, "Bob", 0)]);
        assert_eq!(second[0].track_id, first[0].track_id);
        assert!(second[0].status.is_known());
    }

    #[test]
    fn test_track_dropped_after_single_miss_by_default() {
        let mut tracker = tracker();
        let first = tracker.track(&[known(10, 10, 1, "Alice", 0)]);
        assert!(tracker.track(&[]).is_empty());
        assert!(tracker.tracks().is_empty());
        let again = tracker.track(&[known(10, 10, 1, "Alice", 0)]);
        assert_ne!(again[0].track_id, first[0].track_id);
    }

    #[test]
    fn test_grace_frames_keep_track_alive() {
        let mut tracker = FaceTracker::new(TrackerConfig {
            max_missed_frames: 2,
            ..TrackerConfig::default()
        });
        let first = tracker.track(&[known(10, 10, 1, "Alice", 0)]);
        tracker.track(&[]);
        tracker.track(&[]);
        let back = tracker.track(&[known(11, 11, 1, "Alice", 0)]);
        assert_eq!(back[0].track_id, first[0].track_id);

        tracker.track(&[]);
        tracker.track(&[]);
        tracker.track(&[]);
        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn test_ids_never_reused_within_session() {
        let mut tracker = tracker();
        let mut seen = HashSet::new();
        for i in 0..5 {
            let out = tracker.track(&[unknown(i * 300, 0, (i as usize) * 12)]);
            assert!(seen.insert(out[0].track_id));
        }
    }

    #[test]
    fn test_reset_starts_new_session() {
        let mut tracker = tracker();
        tracker.track(&[unknown(0, 0, 0), unknown(100, 100, 30)]);
        tracker.reset();
        assert!(tracker.tracks().is_empty());
        let out = tracker.track(&[unknown(0, 0, 0)]);
        assert_eq!(out[0].track_id, TrackId(1));
        assert_eq!(out[0].status, TrackStatus::Unknown { group_id: 1 });
    }

    #[test]
    fn test_greedy_match_prefers_highest_iou() {
        let tracks = [(0, BoundingBox::new(0, 0, 100, 100).unwrap())];
        let dets = [
            (0, BoundingBox::new(20, 0, 100, 100).unwrap()),
            (1, BoundingBox::new(5, 0, 100, 100).unwrap()),
        ];
        assert_eq!(greedy_match(&tracks, &dets, 0.5), vec![(0, 1)]);
    }

    #[test]
    fn test_greedy_match_respects_threshold() {
        let tracks = [(0, BoundingBox::new(0, 0, 100, 100).unwrap())];
        let dets = [(0, BoundingBox::new(60, 0, 100, 100).unwrap())];
        assert!(greedy_match(&tracks, &dets, 0.5).is_empty());
    }
}
