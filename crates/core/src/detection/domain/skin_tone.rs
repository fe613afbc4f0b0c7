use image::RgbImage;

use crate::shared::bounding_box::BoundingBox;

/// Upper bound on sample points per axis; larger boxes are strided.
const MAX_SAMPLES_PER_AXIS: u32 = 24;

const LIGHTNESS_RANGE: (f64, f64) = (15.0, 95.0);
const CHROMA_RANGE: (f64, f64) = (8.0, 60.0);
const HUE_RANGE_DEG: (f64, f64) = (10.0, 80.0);

/// Fraction of sampled pixels in `bbox` whose CIE LCh colour falls inside the
/// skin band. Deliberately loose: it only weeds out obvious non-faces.
pub fn skin_fraction(image: &RgbImage, bbox: &BoundingBox) -> f64 {
    let Some(region) = bbox.clamp_to(image.width(), image.height()) else {
        return 0.0;
    };
    let w = region.width() as u32;
    let h = region.height() as u32;
    let step_x = w.div_ceil(MAX_SAMPLES_PER_AXIS).max(1);
    let step_y = h.div_ceil(MAX_SAMPLES_PER_AXIS).max(1);

    let mut total = 0u32;
    let mut skin = 0u32;
    for dy in (0..h).step_by(step_y as usize) {
        for dx in (0..w).step_by(step_x as usize) {
            let p = image.get_pixel(region.x() as u32 + dx, region.y() as u32 + dy);
            total += 1;
            if is_skin(p[0], p[1], p[2]) {
                skin += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        skin as f64 / total as f64
    }
}

pub fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let (l, c, h) = rgb_to_lch(r, g, b);
    (LIGHTNESS_RANGE.0..=LIGHTNESS_RANGE.1).contains(&l)
        && (CHROMA_RANGE.0..=CHROMA_RANGE.1).contains(&c)
        && (HUE_RANGE_DEG.0..=HUE_RANGE_DEG.1).contains(&h)
}

/// sRGB (D65) to CIE LCh(ab): lightness, chroma, hue in degrees [0, 360).
pub fn rgb_to_lch(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (l, a, b) = rgb_to_lab(r, g, b);
    let c = (a * a + b * b).sqrt();
    let mut h = b.atan2(a).to_degrees();
    if h < 0.0 {
        h += 360.0;
    }
    (l, c, h)
}

fn rgb_to_lab(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let lin = |v: u8| {
        let c = v as f64 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    let (r, g, b) = (lin(r), lin(g), lin(b));

    let x = 0.4124564 * r + 0.3575761 * g + 0.1804375 * b;
    let y = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
    let z = 0.0193339 * r + 0.1191920 * g + 0.9503041 * b;

    // D65 reference white
    let f = |t: f64| {
        if t > 216.0 / 24389.0 {
            t.cbrt()
        } else {
            (24389.0 / 27.0 * t + 16.0) / 116.0
        }
    };
    let fx = f(x / 0.95047);
    let fy = f(y);
    let fz = f(z / 1.08883);

    (116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}
