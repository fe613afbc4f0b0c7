use image::GrayImage;

const BINS: usize = 256;

/// Contrast-limited adaptive histogram equalisation.
///
/// The image is split into a `grid` x `grid` set of tiles, each tile gets a
/// clipped-histogram equalisation lookup table, and every pixel is mapped
/// through a bilinear blend of the four nearest tile tables.
pub fn equalize(image: &GrayImage, grid: u32, clip_limit: f64) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tile_w = width.div_ceil(grid.clamp(1, width));
    let tile_h = height.div_ceil(grid.clamp(1, height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(image, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    GrayImage::from_fn(width, height, |x, y| {
        let (tx0, tx1, fx) = neighbours(x, tile_w, tiles_x);
        let (ty0, ty1, fy) = neighbours(y, tile_h, tiles_y);
        let v = image.get_pixel(x, y)[0] as usize;

        let top = lut(tx0, ty0)[v] as f64 * (1.0 - fx) + lut(tx1, ty0)[v] as f64 * fx;
        let bottom = lut(tx0, ty1)[v] as f64 * (1.0 - fx) + lut(tx1, ty1)[v] as f64 * fx;
        let blended = top * (1.0 - fy) + bottom * fy;
        image::Luma([blended.round().clamp(0.0, 255.0) as u8])
    })
}

/// The two tile indices whose centres bracket `pos`, and the weight of the second.
fn neighbours(pos: u32, tile: u32, tiles: u32) -> (u32, u32, f64) {
    let g = (pos as f64 + 0.5) / tile as f64 - 0.5;
    if g <= 0.0 {
        return (0, 0, 0.0);
    }
    let last = tiles - 1;
    let i0 = (g.floor() as u32).min(last);
    if i0 == last {
        return (last, last, 0.0);
    }
    (i0, i0 + 1, g - i0 as f64)
}

fn tile_lut(image: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f64) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = (x1 - x0) * (y1 - y0);

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f64 / BINS as f64) as u32).max(1);
        let mut excess = 0u32;
        for h in hist.iter_mut() {
            if *h > limit {
                excess += *h - limit;
                *h = limit;
            }
        }
        let share = excess / BINS as u32;
        let remainder = (excess % BINS as u32) as usize;
        for h in hist.iter_mut() {
            *h += share;
        }
        if remainder > 0 {
            let step = (BINS / remainder).max(1);
            for i in (0..BINS).step_by(step).take(remainder) {
                hist[i] += 1;
            }
        }
    }

    let scale = 255.0 / area as f64;
    let mut lut = [0u8; BINS];
    let mut cdf = 0u32;
    for (i, h) in hist.iter().enumerate() {
        cdf += h;
        lut[i] = (cdf as f64 * scale).round().min(255.0) as u8;
    }
    lut
}
