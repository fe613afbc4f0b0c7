//! Synthetic images and collaborator stubs shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::hashing::domain::face_crop::FaceCrop;
use crate::hashing::domain::fingerprint::{FingerprintSet, ImageVariant};
use crate::hashing::domain::fingerprint_hasher::FingerprintHasher;
use crate::hashing::domain::hash_vector::{HashAlgorithm, HashVector};
use crate::pipeline::frame_presenter::FramePresenter;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::collaborator::CollaboratorError;
use crate::shared::frame::Frame;
use crate::tracking::domain::track::TrackAssignment;
use crate::video::domain::frame_source::FrameSource;

/// Deterministic, face-sized test image. Different `kind`s are visually
/// unrelated patterns; all stay within [40, 210] per channel and are
/// skin-toned so they pass the candidate filter.
pub fn synthetic_face(kind: u32, width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let u = x as f64 / width as f64;
        let v = y as f64 / height as f64;
        let t = match kind % 4 {
            0 => {
                let r = ((u - 0.4).powi(2) + (v - 0.55).powi(2)).sqrt();
                (r * 40.0).sin()
            }
            1 => ((u + 2.0 * v) * 14.0).sin(),
            2 => (u * 9.0).sin() * (v * 6.0 + 1.0).cos(),
            _ => ((u * 5.0 - v * 11.0).sin() + (u * v * 20.0).cos()) / 2.0,
        };
        let level = (125.0 + 70.0 * t + 15.0 * u).clamp(40.0, 210.0);
        Rgb([
            level as u8,
            (level * 0.78) as u8,
            (level * 0.62) as u8,
        ])
    })
}

pub fn brighten(image: &RgbImage, delta: u8) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        Rgb([
            p[0].saturating_add(delta),
            p[1].saturating_add(delta),
            p[2].saturating_add(delta),
        ])
    })
}

/// Frame filled with `background` and one solid rectangle per `(box, color)`.
pub fn painted_frame(
    width: u32,
    height: u32,
    faces: &[(BoundingBox, [u8; 3])],
    index: usize,
) -> Frame {
    let mut image = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
    for (bbox, color) in faces {
        for y in bbox.y()..bbox.bottom() {
            for x in bbox.x()..bbox.right() {
                image.put_pixel(x as u32, y as u32, Rgb(*color));
            }
        }
    }
    Frame::from_rgb_image(image, index)
}

pub fn face(x: i32, y: i32, size: i32) -> Detection {
    Detection::new(BoundingBox::new(x, y, size, size).unwrap(), 0.9, 0)
}

/// Hashes a crop from its center color: red sets how many leading bits are
/// on (one per 4 levels), a green above 150 inverts the vector. Only the
/// difference hash of the identity variant is produced, so distances are
/// exact and easy to reason about.
pub struct ColorHasher;

pub const COLOR_HASH_SIZE: u32 = 16;

impl FingerprintHasher for ColorHasher {
    fn hash_size(&self) -> u32 {
        COLOR_HASH_SIZE
    }

    fn fingerprint(&self, crop: &FaceCrop, _variants: &[ImageVariant]) -> FingerprintSet {
        let image = crop.image();
        let px = image.get_pixel(image.width() / 2, image.height() / 2);
        let ones = (px[0] as usize + 2) / 4;
        let invert = px[1] > 150;
        let bits: Vec<bool> = (0..(COLOR_HASH_SIZE * COLOR_HASH_SIZE) as usize)
            .map(|i| (i < ones) != invert)
            .collect();
        let mut set = FingerprintSet::new(COLOR_HASH_SIZE);
        set.insert(
            ImageVariant::Identity,
            HashVector::from_bits(HashAlgorithm::Difference, &bits),
        )
        .unwrap();
        set
    }
}

/// Returns pre-scripted detections, one list per call, and records the
/// size of every frame it was shown.
#[derive(Default)]
pub struct ScriptedDetector {
    pub frames: VecDeque<Vec<Detection>>,
    pub seen_sizes: Arc<Mutex<Vec<(u32, u32)>>>,
    pub fail: bool,
}

impl ScriptedDetector {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: frames.into(),
            ..Self::default()
        }
    }

    /// Same detections on every frame.
    pub fn repeating(detections: Vec<Detection>, times: usize) -> Self {
        Self::new(vec![detections; times])
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, CollaboratorError> {
        if self.fail {
            return Err("detector offline".into());
        }
        self.seen_sizes
            .lock()
            .unwrap()
            .push((frame.width(), frame.height()));
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}

/// Finite frame source over prepared items; an `Err` item simulates a
/// capture failure.
pub struct VecFrameSource {
    items: VecDeque<Result<Frame, String>>,
    live: bool,
    pub closed: Arc<AtomicBool>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self::with_items(frames.into_iter().map(Ok).collect())
    }

    pub fn with_items(items: Vec<Result<Frame, String>>) -> Self {
        Self {
            items: items.into(),
            live: false,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CollaboratorError> {
        match self.items.pop_front() {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(message)) => Err(message.into()),
            None => Ok(None),
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Keeps every presented frame index with its assignments.
#[derive(Default)]
pub struct RecordingPresenter {
    pub frames: Vec<(usize, Vec<TrackAssignment>)>,
    pub finished: bool,
    /// Raised after the first presented frame when set.
    pub cancel_after_first: Option<Arc<AtomicBool>>,
}

impl FramePresenter for RecordingPresenter {
    fn present(
        &mut self,
        frame: &Frame,
        assignments: &[TrackAssignment],
    ) -> Result<(), CollaboratorError> {
        self.frames.push((frame.index(), assignments.to_vec()));
        if let Some(flag) = &self.cancel_after_first {
            flag.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CollaboratorError> {
        self.finished = true;
        Ok(())
    }
}
