use crate::shared::bounding_box::BoundingBox;

/// One raw face candidate reported by a detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Detector score in [0, 1].
    pub confidence: f64,
    pub source_class: u32,
}

impl Detection {
    /// Clamps the score into [0, 1]; a non-finite score counts as 0.
    pub fn new(bbox: BoundingBox, confidence: f64, source_class: u32) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            bbox,
            confidence,
            source_class,
        }
    }
}
