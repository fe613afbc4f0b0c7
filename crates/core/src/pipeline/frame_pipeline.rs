use std::sync::Arc;
use std::time::Instant;

use image::imageops::FilterType;
use image::RgbImage;
use thiserror::Error;

use crate::detection::domain::candidate_filter::{CandidateFilter, FilterStats};
use crate::detection::domain::face_detector::FaceDetector;
use crate::hashing::domain::face_crop::FaceCrop;
use crate::hashing::domain::fingerprint_hasher::FingerprintHasher;
use crate::identity::domain::identity_store::IdentityStore;
use crate::pipeline::pipeline_logger::{
    PipelineLogger, STAGE_DETECT, STAGE_FILTER, STAGE_HASH, STAGE_MATCH, STAGE_TRACK,
};
use crate::shared::collaborator::CollaboratorError;
use crate::shared::config::RecognitionConfig;
use crate::shared::frame::{Frame, InputError};
use crate::tracking::domain::track::{TrackAssignment, TrackInput};
use crate::tracking::infrastructure::face_tracker::FaceTracker;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The frame was unusable; skip it and carry on.
    #[error("invalid frame: {0}")]
    Input(#[from] InputError),
    /// The detector failed; the session cannot continue.
    #[error("face detector failed: {0}")]
    Collaborator(#[source] CollaboratorError),
}

/// Per-frame recognition: detect, filter, hash, match, track.
///
/// Source-agnostic: live cameras, video files and still images all go
/// through [`FramePipeline::process_frame`]. Tracker state lives here and
/// persists between calls until [`FramePipeline::reset_session`].
pub struct FramePipeline {
    detector: Box<dyn FaceDetector>,
    filter: CandidateFilter,
    hasher: Arc<dyn FingerprintHasher>,
    store: Arc<IdentityStore>,
    tracker: FaceTracker,
    match_threshold: u32,
    crop_padding: f64,
    processing_image_size: u32,
    logger: Box<dyn PipelineLogger>,
    last_filter_stats: FilterStats,
}

impl FramePipeline {
    /// Hashes with the store's hasher so queries and references always
    /// share a hash size.
    pub fn new(
        detector: Box<dyn FaceDetector>,
        store: Arc<IdentityStore>,
        config: &RecognitionConfig,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            detector,
            filter: CandidateFilter::new(config.candidate_filter()),
            hasher: Arc::clone(store.hasher()),
            store,
            tracker: FaceTracker::new(config.tracker()),
            match_threshold: config.match_threshold,
            crop_padding: config.crop_padding,
            processing_image_size: config.processing_image_size,
            logger,
            last_filter_stats: FilterStats::default(),
        }
    }

    /// Runs one frame through the pipeline. Returned boxes are in the
    /// coordinates of `frame`, one assignment per surviving face.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Vec<TrackAssignment>, PipelineError> {
        let source = frame.to_rgb_image()?;
        let (work, scale) = downscale(source, self.processing_image_size);

        let t0 = Instant::now();
        let work_frame = Frame::from_rgb_image(work.clone(), frame.index());
        let detections = self
            .detector
            .detect(&work_frame)
            .map_err(PipelineError::Collaborator)?;
        self.logger.timing(STAGE_DETECT, elapsed_ms(t0));

        let t0 = Instant::now();
        let (kept, stats) = self.filter.filter(&detections, &work);
        self.logger.timing(STAGE_FILTER, elapsed_ms(t0));
        self.logger.metric("faces_detected", stats.total as f64);
        self.logger.metric("faces_kept", stats.passed as f64);
        if stats.rejected() > 0 {
            log::debug!(
                "Frame {}: kept {}/{} candidates ({} low confidence, {} small, {} elongated, {} out of frame, {} not skin)",
                frame.index(),
                stats.passed,
                stats.total,
                stats.low_confidence,
                stats.too_small,
                stats.bad_aspect_ratio,
                stats.out_of_frame,
                stats.low_skin_fraction
            );
        }
        self.last_filter_stats = stats;

        let t0 = Instant::now();
        let hashed: Vec<_> = kept
            .into_iter()
            .filter_map(|detection| {
                let crop = FaceCrop::extract(&work, &detection.bbox, self.crop_padding)?;
                Some((detection, self.hasher.query_fingerprint(&crop)))
            })
            .collect();
        self.logger.timing(STAGE_HASH, elapsed_ms(t0));

        let t0 = Instant::now();
        let inputs: Vec<TrackInput> = hashed
            .into_iter()
            .map(|(detection, fingerprint)| {
                let matched = self.store.find_match(&fingerprint, self.match_threshold);
                TrackInput {
                    detection,
                    fingerprint,
                    matched,
                }
            })
            .collect();
        self.logger.timing(STAGE_MATCH, elapsed_ms(t0));

        let t0 = Instant::now();
        let mut assignments = self.tracker.track(&inputs);
        self.logger.timing(STAGE_TRACK, elapsed_ms(t0));

        if scale < 1.0 {
            for assignment in &mut assignments {
                let restored = assignment.bbox.scaled(1.0 / scale);
                assignment.bbox = restored
                    .clamp_to(frame.width(), frame.height())
                    .unwrap_or(restored);
            }
        }
        Ok(assignments)
    }

    /// Discards tracker state; track ids restart with the next frame.
    pub fn reset_session(&mut self) {
        self.tracker.reset();
        self.last_filter_stats = FilterStats::default();
    }

    /// Candidate filter counts of the most recent frame.
    pub fn last_filter_stats(&self) -> &FilterStats {
        &self.last_filter_stats
    }

    pub fn tracker(&self) -> &FaceTracker {
        &self.tracker
    }

    pub fn store(&self) -> &Arc<IdentityStore> {
        &self.store
    }

    pub fn logger_mut(&mut self) -> &mut dyn PipelineLogger {
        self.logger.as_mut()
    }
}

/// Shrinks `image` so its longest side is at most `max_side`. Returns the
/// image and the applied scale (1.0 when untouched).
fn downscale(image: RgbImage, max_side: u32) -> (RgbImage, f64) {
    let longest = image.width().max(image.height());
    if longest <= max_side {
        return (image, 1.0);
    }
    let scale = max_side as f64 / longest as f64;
    let width = ((image.width() as f64 * scale).round() as u32).max(1);
    let height = ((image.height() as f64 * scale).round() as u32).max(1);
    (
        image::imageops::resize(&image, width, height, FilterType::Triangle),
        scale,
    )
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
