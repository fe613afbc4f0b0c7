use serde::Serialize;

use super::frame::InputError;

/// Axis-aligned box in the pixel space of one frame.
///
/// Width and height are always positive; construction through [`BoundingBox::new`]
/// enforces it, so every box in the pipeline has a well-defined area and
/// aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct BoundingBox {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Result<Self, InputError> {
        if width <= 0 || height <= 0 {
            return Err(InputError::DegenerateBox { width, height });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Builds a box from floating-point corner coordinates, rounding to the
    /// nearest pixel.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, InputError> {
        let left = x1.min(x2).round() as i32;
        let top = y1.min(y2).round() as i32;
        let right = x1.max(x2).round() as i32;
        let bottom = y1.max(y2).round() as i32;
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// `max(w/h, h/w)`: 1.0 for a square, growing with elongation in either axis.
    pub fn aspect_ratio(&self) -> f64 {
        let w = self.width as f64;
        let h = self.height as f64;
        (w / h).max(h / w)
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.area() as f64;
        let area_b = other.area() as f64;
        inter / (area_a + area_b - inter)
    }

    /// True when the box lies entirely within a `frame_width` x `frame_height` frame.
    pub fn is_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.right() as i64 <= frame_width as i64
            && self.bottom() as i64 <= frame_height as i64
    }

    /// Intersection with the frame, or `None` when nothing of the box is visible.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<BoundingBox> {
        let fw = i32::try_from(frame_width).unwrap_or(i32::MAX);
        let fh = i32::try_from(frame_height).unwrap_or(i32::MAX);
        let x1 = self.x.clamp(0, fw);
        let y1 = self.y.clamp(0, fh);
        let x2 = self.right().clamp(0, fw);
        let y2 = self.bottom().clamp(0, fh);
        BoundingBox::new(x1, y1, x2 - x1, y2 - y1).ok()
    }

    /// Grows the box by `fraction` of its size on every side, then clamps to the frame.
    pub fn padded(
        &self,
        fraction: f64,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<BoundingBox> {
        let pad_x = (self.width as f64 * fraction).round() as i32;
        let pad_y = (self.height as f64 * fraction).round() as i32;
        let grown = BoundingBox {
            x: self.x - pad_x,
            y: self.y - pad_y,
            width: self.width + 2 * pad_x,
            height: self.height + 2 * pad_y,
        };
        grown.clamp_to(frame_width, frame_height)
    }

    /// Maps the box through a uniform scale factor, keeping at least one pixel per side.
    pub fn scaled(&self, factor: f64) -> BoundingBox {
        let x1 = (self.x as f64 * factor).round() as i32;
        let y1 = (self.y as f64 * factor).round() as i32;
        let x2 = (self.right() as f64 * factor).round() as i32;
        let y2 = (self.bottom() as f64 * factor).round() as i32;
        BoundingBox {
            x: x1,
            y: y1,
            width: (x2 - x1).max(1),
            height: (y2 - y1).max(1),
        }
    }
}
