use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    DEFAULT_CROP_PADDING, DEFAULT_HASH_SIZE, DEFAULT_IOU_THRESHOLD, DEFAULT_MATCH_THRESHOLD,
    DEFAULT_MAX_ASPECT_RATIO, DEFAULT_MIN_CONFIDENCE, DEFAULT_MIN_FACE_SIZE,
    DEFAULT_MIN_SKIN_FRACTION, DEFAULT_PROCESSING_IMAGE_SIZE, DEFAULT_UNKNOWN_SIMILARITY_THRESHOLD,
    MAX_HASH_SIZE,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Every tunable of the recognition pipeline.
///
/// Built once, validated, then split into the per-component configs below.
/// Missing JSON keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecognitionConfig {
    pub min_confidence: f64,
    pub min_face_size: u32,
    pub max_aspect_ratio: f64,
    pub min_skin_fraction: f64,
    pub hash_size: u32,
    pub match_threshold: u32,
    pub iou_threshold: f64,
    pub unknown_similarity_threshold: u32,
    pub processing_image_size: u32,
    pub crop_padding: f64,
    pub max_missed_frames: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            max_aspect_ratio: DEFAULT_MAX_ASPECT_RATIO,
            min_skin_fraction: DEFAULT_MIN_SKIN_FRACTION,
            hash_size: DEFAULT_HASH_SIZE,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            unknown_similarity_threshold: DEFAULT_UNKNOWN_SIMILARITY_THRESHOLD,
            processing_image_size: DEFAULT_PROCESSING_IMAGE_SIZE,
            crop_padding: DEFAULT_CROP_PADDING,
            max_missed_frames: 0,
        }
    }
}

impl RecognitionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |key: &'static str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    key,
                    reason: format!("{v} is outside [0, 1]"),
                })
            }
        };
        unit("minConfidence", self.min_confidence)?;
        unit("iouThreshold", self.iou_threshold)?;
        unit("minSkinFraction", self.min_skin_fraction)?;
        if self.max_aspect_ratio.is_nan() || self.max_aspect_ratio < 1.0 {
            return Err(ConfigError::Invalid {
                key: "maxAspectRatio",
                reason: format!("{} is below 1.0", self.max_aspect_ratio),
            });
        }
        if !(2..=MAX_HASH_SIZE).contains(&self.hash_size) {
            return Err(ConfigError::Invalid {
                key: "hashSize",
                reason: format!("{} is outside [2, {MAX_HASH_SIZE}]", self.hash_size),
            });
        }
        if self.processing_image_size == 0 {
            return Err(ConfigError::Invalid {
                key: "processingImageSize",
                reason: "must be positive".into(),
            });
        }
        if self.crop_padding.is_nan() || self.crop_padding < 0.0 {
            return Err(ConfigError::Invalid {
                key: "cropPadding",
                reason: format!("{} is negative", self.crop_padding),
            });
        }
        Ok(())
    }

    pub fn candidate_filter(&self) -> CandidateFilterConfig {
        CandidateFilterConfig {
            min_confidence: self.min_confidence,
            min_face_size: self.min_face_size,
            max_aspect_ratio: self.max_aspect_ratio,
            min_skin_fraction: self.min_skin_fraction,
        }
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            iou_threshold: self.iou_threshold,
            unknown_similarity_threshold: self.unknown_similarity_threshold,
            max_missed_frames: self.max_missed_frames,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateFilterConfig {
    pub min_confidence: f64,
    pub min_face_size: u32,
    pub max_aspect_ratio: f64,
    pub min_skin_fraction: f64,
}

impl Default for CandidateFilterConfig {
    fn default() -> Self {
        RecognitionConfig::default().candidate_filter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    pub iou_threshold: f64,
    pub unknown_similarity_threshold: u32,
    pub max_missed_frames: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        RecognitionConfig::default().tracker()
    }
}
