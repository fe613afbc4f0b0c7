use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::hashing::domain::face_crop::FaceCrop;
use crate::hashing::domain::fingerprint::{FingerprintSet, ImageVariant};
use crate::hashing::domain::fingerprint_hasher::FingerprintHasher;
use crate::hashing::domain::hash_vector::{HashAlgorithm, HashVector};
use crate::hashing::infrastructure::clahe;
use crate::hashing::infrastructure::dct::Dct2;
use crate::shared::constants::VARIANT_ROTATION_DEGREES;

const CLAHE_GRID: u32 = 8;
const CLAHE_CLIP_LIMIT: f64 = 2.0;

/// Oversampling factor of the frequency hash: the DCT runs on a block this many
/// times larger than the hash side.
const FREQUENCY_OVERSAMPLE: u32 = 4;

/// Difference, frequency and average hashes over CLAHE-normalised grayscale.
pub struct PerceptualHasher {
    hash_size: u32,
    dct: Dct2,
}

impl PerceptualHasher {
    pub fn new(hash_size: u32) -> Self {
        Self {
            hash_size,
            dct: Dct2::new((hash_size * FREQUENCY_OVERSAMPLE) as usize),
        }
    }

    fn difference_hash(&self, gray: &GrayImage) -> HashVector {
        let n = self.hash_size;
        let small = imageops::resize(gray, n + 1, n, FilterType::Lanczos3);
        let mut bits = Vec::with_capacity((n * n) as usize);
        for y in 0..n {
            for x in 0..n {
                bits.push(small.get_pixel(x + 1, y)[0] > small.get_pixel(x, y)[0]);
            }
        }
        HashVector::from_bits(HashAlgorithm::Difference, &bits)
    }

    fn frequency_hash(&self, gray: &GrayImage) -> HashVector {
        let n = self.hash_size as usize;
        let side = self.dct.len();
        let small = imageops::resize(gray, side as u32, side as u32, FilterType::Lanczos3);
        let mut block: Vec<f64> = small.pixels().map(|p| p[0] as f64).collect();
        self.dct.transform_2d(&mut block);

        let low: Vec<f64> = (0..n)
            .flat_map(|r| block[r * side..r * side + n].iter().copied())
            .collect();
        let med = median(&low);
        let bits: Vec<bool> = low.iter().map(|&v| v > med).collect();
        HashVector::from_bits(HashAlgorithm::Frequency, &bits)
    }

    fn average_hash(&self, gray: &GrayImage) -> HashVector {
        let n = self.hash_size;
        let small = imageops::resize(gray, n, n, FilterType::Lanczos3);
        let total: u64 = small.pixels().map(|p| p[0] as u64).sum();
        let mean = total as f64 / (n * n) as f64;
        let bits: Vec<bool> = small.pixels().map(|p| p[0] as f64 > mean).collect();
        HashVector::from_bits(HashAlgorithm::Average, &bits)
    }
}

impl FingerprintHasher for PerceptualHasher {
    fn hash_size(&self) -> u32 {
        self.hash_size
    }

    fn fingerprint(&self, crop: &FaceCrop, variants: &[ImageVariant]) -> FingerprintSet {
        let gray = imageops::grayscale(crop.image());
        let normalized = clahe::equalize(&gray, CLAHE_GRID, CLAHE_CLIP_LIMIT);

        let mut set = FingerprintSet::new(self.hash_size);
        for &variant in variants {
            let image = apply_variant(&normalized, variant);
            for vector in [
                self.difference_hash(&image),
                self.frequency_hash(&image),
                self.average_hash(&image),
            ] {
                // every hash above is hash_size² bits long
                let _ = set.insert(variant, vector);
            }
        }
        set
    }
}

fn apply_variant(gray: &GrayImage, variant: ImageVariant) -> GrayImage {
    let theta = VARIANT_ROTATION_DEGREES.to_radians();
    match variant {
        ImageVariant::Identity => gray.clone(),
        ImageVariant::Mirrored => imageops::flip_horizontal(gray),
        ImageVariant::RotatedCw => {
            rotate_about_center(gray, theta, Interpolation::Bilinear, Luma([128]))
        }
        ImageVariant::RotatedCcw => {
            rotate_about_center(gray, -theta, Interpolation::Bilinear, Luma([128]))
        }
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.is_empty() {
        0.0
    } else if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
