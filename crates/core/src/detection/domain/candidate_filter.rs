use image::RgbImage;
use serde::Serialize;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::skin_tone::skin_fraction;
use crate::shared::config::CandidateFilterConfig;

/// Per-criterion rejection counts for one filter pass.
///
/// A detection is counted once, against the first check it fails, in the
/// order: confidence, size, aspect ratio, frame bounds, skin tone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    pub total: usize,
    pub passed: usize,
    pub low_confidence: usize,
    pub too_small: usize,
    pub bad_aspect_ratio: usize,
    pub out_of_frame: usize,
    pub low_skin_fraction: usize,
}

impl FilterStats {
    pub fn rejected(&self) -> usize {
        self.total - self.passed
    }

    pub fn accumulate(&mut self, other: &FilterStats) {
        self.total += other.total;
        self.passed += other.passed;
        self.low_confidence += other.low_confidence;
        self.too_small += other.too_small;
        self.bad_aspect_ratio += other.bad_aspect_ratio;
        self.out_of_frame += other.out_of_frame;
        self.low_skin_fraction += other.low_skin_fraction;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    LowConfidence,
    TooSmall,
    BadAspectRatio,
    OutOfFrame,
    LowSkinFraction,
}

/// Drops raw detections that are not worth hashing.
pub struct CandidateFilter {
    config: CandidateFilterConfig,
}

impl CandidateFilter {
    pub fn new(config: CandidateFilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CandidateFilterConfig {
        &self.config
    }

    /// Keeps the detections passing every check, in input order.
    pub fn filter(&self, detections: &[Detection], frame: &RgbImage) -> (Vec<Detection>, FilterStats) {
        let mut stats = FilterStats {
            total: detections.len(),
            ..FilterStats::default()
        };
        let mut kept = Vec::with_capacity(detections.len());

        for detection in detections {
            match self.check(detection, frame) {
                None => kept.push(*detection),
                Some(Rejection::LowConfidence) => stats.low_confidence += 1,
                Some(Rejection::TooSmall) => stats.too_small += 1,
                Some(Rejection::BadAspectRatio) => stats.bad_aspect_ratio += 1,
                Some(Rejection::OutOfFrame) => stats.out_of_frame += 1,
                Some(Rejection::LowSkinFraction) => stats.low_skin_fraction += 1,
            }
        }
        stats.passed = kept.len();
        (kept, stats)
    }

    fn check(&self, detection: &Detection, frame: &RgbImage) -> Option<Rejection> {
        let bbox = &detection.bbox;
        let min_side = self.config.min_face_size as i64;

        if detection.confidence.is_nan() || detection.confidence < self.config.min_confidence {
            return Some(Rejection::LowConfidence);
        }
        if bbox.area() < min_side * min_side {
            return Some(Rejection::TooSmall);
        }
        if bbox.aspect_ratio() > self.config.max_aspect_ratio {
            return Some(Rejection::BadAspectRatio);
        }
        if bbox.clamp_to(frame.width(), frame.height()).is_none() {
            return Some(Rejection::OutOfFrame);
        }
        if self.config.min_skin_fraction > 0.0
            && skin_fraction(frame, bbox) < self.config.min_skin_fraction
        {
            return Some(Rejection::LowSkinFraction);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use image::Rgb;
    use rstest::rstest;

    const SKIN: Rgb<u8> = Rgb([224, 172, 140]);

    fn detection(x: i32, y: i32, w: i32, h: i32, confidence: f64) -> Detection {
        Detection::new(BoundingBox::new(x, y, w, h).unwrap(), confidence, 0)
    }

    fn skin_frame() -> RgbImage {
        RgbImage::from_pixel(320, 240, SKIN)
    }

    fn default_filter() -> CandidateFilter {
        CandidateFilter::new(CandidateFilterConfig::default())
    }

    #[test]
    fn test_good_detection_passes() {
        let (kept, stats) = default_filter().filter(&[detection(10, 10, 60, 70, 0.9)], &skin_frame());
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.rejected(), 0);
    }

    #[rstest]
    #[case::low_confidence(detection(10, 10, 60, 60, 0.3), |s: &FilterStats| s.low_confidence)]
    #[case::too_small(detection(10, 10, 20, 20, 0.9), |s: &FilterStats| s.too_small)]
    #[case::elongated(detection(10, 10, 40, 120, 0.9), |s: &FilterStats| s.bad_aspect_ratio)]
    #[case::out_of_frame(detection(400, 300, 60, 60, 0.9), |s: &FilterStats| s.out_of_frame)]
    fn test_rejects_with_reason(
        #[case] d: Detection,
        #[case] counter: fn(&FilterStats) -> usize,
    ) {
        let (kept, stats) = default_filter().filter(&[d], &skin_frame());
        assert!(kept.is_empty());
        assert_eq!(counter(&stats), 1);
        assert_eq!(stats.rejected(), 1);
    }

    #[test]
    fn test_exact_thresholds_pass() {
        // confidence == 0.6 and area == 40² are both accepted
        let (kept, _) = default_filter().filter(&[detection(0, 0, 40, 40, 0.6)], &skin_frame());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_rejects_non_skin_region() {
        let frame = RgbImage::from_pixel(320, 240, Rgb([30, 60, 200]));
        let (kept, stats) = default_filter().filter(&[detection(10, 10, 60, 60, 0.9)], &frame);
        assert!(kept.is_empty());
        assert_eq!(stats.low_skin_fraction, 1);
    }

    #[test]
    fn test_zero_skin_fraction_disables_skin_check() {
        let frame = RgbImage::from_pixel(320, 240, Rgb([30, 60, 200]));
        let filter = CandidateFilter::new(CandidateFilterConfig {
            min_skin_fraction: 0.0,
            ..CandidateFilterConfig::default()
        });
        let (kept, _) = filter.filter(&[detection(10, 10, 60, 60, 0.9)], &frame);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_nan_score_is_rejected() {
        let built = detection(10, 10, 60, 60, f64::NAN);
        let raw = Detection {
            confidence: f64::NAN,
            ..built
        };
        let (kept, stats) = default_filter().filter(&[built, raw], &skin_frame());
        assert!(kept.is_empty());
        assert_eq!(stats.low_confidence, 2);
    }

    #[test]
    fn test_first_failing_check_is_counted_once() {
        // low confidence and too small: counted as low confidence only
        let (_, stats) = default_filter().filter(&[detection(0, 0, 10, 10, 0.1)], &skin_frame());
        assert_eq!(stats.low_confidence, 1);
        assert_eq!(stats.too_small, 0);
    }

    #[test]
    fn test_preserves_input_order_and_is_deterministic() {
        let detections = [
            detection(0, 0, 50, 50, 0.9),
            detection(0, 0, 10, 10, 0.9),
            detection(100, 100, 60, 60, 0.8),
        ];
        let filter = default_filter();
        let (a, sa) = filter.filter(&detections, &skin_frame());
        let (b, sb) = filter.filter(&detections, &skin_frame());
        assert_eq!(a, vec![detections[0], detections[2]]);
        assert_eq!(a, b);
        assert_eq!(sa, sb);
    }

    #[test]
    fn test_accumulate_sums_counters() {
        let mut total = FilterStats::default();
        let (_, stats) = default_filter().filter(&[detection(0, 0, 10, 10, 0.9)], &skin_frame());
        total.accumulate(&stats);
        total.accumulate(&stats);
        assert_eq!(total.total, 2);
        assert_eq!(total.too_small, 2);
    }
}
