use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::FACE_CROP_SIZE;

/// Square, fixed-size face image cut out of a frame.
///
/// Lives for one frame's processing; only hashes derived from it are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceCrop {
    image: RgbImage,
}

impl FaceCrop {
    /// Cuts `bbox` grown by `padding` out of `frame`, normalised to
    /// `FACE_CROP_SIZE` square. `None` when the box misses the frame.
    pub fn extract(frame: &RgbImage, bbox: &BoundingBox, padding: f64) -> Option<FaceCrop> {
        let region = bbox.padded(padding, frame.width(), frame.height())?;
        let view = imageops::crop_imm(
            frame,
            region.x() as u32,
            region.y() as u32,
            region.width() as u32,
            region.height() as u32,
        );
        Some(Self::normalize(&view.to_image()))
    }

    /// Wraps a whole image (e.g. a registration photo) as a crop.
    pub fn from_image(image: &RgbImage) -> FaceCrop {
        Self::normalize(image)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    fn normalize(image: &RgbImage) -> FaceCrop {
        if image.dimensions() == (FACE_CROP_SIZE, FACE_CROP_SIZE) {
            return FaceCrop {
                image: image.clone(),
            };
        }
        FaceCrop {
            image: imageops::resize(image, FACE_CROP_SIZE, FACE_CROP_SIZE, FilterType::Triangle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_extract_normalizes_size() {
        let frame = RgbImage::from_pixel(320, 240, Rgb([10, 20, 30]));
        let bbox = BoundingBox::new(100, 50, 60, 80).unwrap();
        let crop = FaceCrop::extract(&frame, &bbox, 0.1).unwrap();
        assert_eq!(crop.image().dimensions(), (FACE_CROP_SIZE, FACE_CROP_SIZE));
        assert_eq!(crop.image().get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_extract_outside_frame_is_none() {
        let frame = RgbImage::new(100, 100);
        let bbox = BoundingBox::new(150, 150, 20, 20).unwrap();
        assert!(FaceCrop::extract(&frame, &bbox, 0.1).is_none());
    }

    #[test]
    fn test_from_image_keeps_exact_size_untouched() {
        let image = RgbImage::from_fn(FACE_CROP_SIZE, FACE_CROP_SIZE, |x, y| {
            Rgb([x as u8, y as u8, 0])
        });
        assert_eq!(FaceCrop::from_image(&image).image(), &image);
    }
}
