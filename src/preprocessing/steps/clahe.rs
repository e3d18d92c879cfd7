use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};

/// Number of tiles along each axis
const GRID_SIZE: u32 = 8;
/// Histogram bins are clipped at this multiple of the uniform bin height
const CLIP_LIMIT: f32 = 2.0;

/// Contrast limited adaptive histogram equalization.
///
/// Each tile gets its own clipped equalization lookup table; pixels are
/// mapped by bilinear interpolation between the four nearest tile centers
/// so tile borders do not show.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.into_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(OcrError::Processing("Cannot equalize an empty image".to_string()));
    }
    Ok(DynamicImage::ImageLuma8(equalize(&gray, GRID_SIZE, CLIP_LIMIT)))
}

struct TileGrid {
    tile_w: u32,
    tile_h: u32,
    cols: u32,
    rows: u32,
    luts: Vec<[u8; 256]>,
}

impl TileGrid {
    fn lut(&self, col: u32, row: u32) -> &[u8; 256] {
        &self.luts[(row * self.cols + col) as usize]
    }
}

fn equalize(img: &GrayImage, grid: u32, clip_limit: f32) -> GrayImage {
    let tiles = build_tiles(img, grid, clip_limit);

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let value = img.get_pixel(x, y).0[0] as usize;

        let (c0, c1, wx) = neighbours(x, tiles.tile_w, tiles.cols);
        let (r0, r1, wy) = neighbours(y, tiles.tile_h, tiles.rows);

        let top = lerp(tiles.lut(c0, r0)[value], tiles.lut(c1, r0)[value], wx);
        let bottom = lerp(tiles.lut(c0, r1)[value], tiles.lut(c1, r1)[value], wx);
        let mapped = top + (bottom - top) * wy;

        Luma([mapped.round().clamp(0.0, 255.0) as u8])
    })
}

fn build_tiles(img: &GrayImage, grid: u32, clip_limit: f32) -> TileGrid {
    let (width, height) = img.dimensions();
    let tile_w = width.div_ceil(grid.min(width));
    let tile_h = height.div_ceil(grid.min(height));
    // Recompute counts so that no trailing tile is empty
    let cols = width.div_ceil(tile_w);
    let rows = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let x0 = col * tile_w;
            let y0 = row * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut histogram = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    histogram[img.get_pixel(x, y).0[0] as usize] += 1;
                }
            }

            let area = (x1 - x0) * (y1 - y0);
            clip_histogram(&mut histogram, area, clip_limit);
            luts.push(cumulative_lut(&histogram, area));
        }
    }

    TileGrid {
        tile_w,
        tile_h,
        cols,
        rows,
        luts,
    }
}

/// Clip bins above the limit and spread the excess evenly over all bins
fn clip_histogram(histogram: &mut [u32; 256], area: u32, clip_limit: f32) {
    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for bin in histogram.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in histogram.iter_mut().enumerate() {
        *bin += share;
        if i < remainder {
            *bin += 1;
        }
    }
}

fn cumulative_lut(histogram: &[u32; 256], area: u32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (value, count) in histogram.iter().enumerate() {
        cumulative += count;
        lut[value] = ((cumulative as f32 * 255.0) / area as f32).round().min(255.0) as u8;
    }
    lut
}

/// Indices of the two tiles whose centers surround `pos`, and the weight of the second
fn neighbours(pos: u32, tile_size: u32, count: u32) -> (u32, u32, f32) {
    let center = (pos as f32 + 0.5) / tile_size as f32 - 0.5;
    if center <= 0.0 {
        return (0, 0, 0.0);
    }
    let first = (center.floor() as u32).min(count - 1);
    let second = (first + 1).min(count - 1);
    let weight = if first == second {
        0.0
    } else {
        center - first as f32
    };
    (first, second, weight)
}

fn lerp(a: u8, b: u8, t: f32) -> f32 {
    a as f32 + (b as f32 - a as f32) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(img: &GrayImage) -> (u8, u8) {
        img.pixels()
            .fold((255, 0), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])))
    }

    #[test]
    fn test_clahe_expands_low_contrast() {
        let img = GrayImage::from_fn(64, 64, |x, y| Luma([100 + ((x + y) % 20) as u8]));

        let result = apply(DynamicImage::ImageLuma8(img.clone())).unwrap().to_luma8();

        let (lo, hi) = range(&img);
        let (new_lo, new_hi) = range(&result);
        assert!(new_hi - new_lo > hi - lo, "{}..{} vs {}..{}", new_lo, new_hi, lo, hi);
    }

    #[test]
    fn test_clahe_uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(40, 30, Luma([90]));

        let result = apply(DynamicImage::ImageLuma8(img)).unwrap().to_luma8();

        let first = result.get_pixel(0, 0).0[0];
        assert!(result.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn test_clahe_handles_tiny_image() {
        let img = GrayImage::from_fn(3, 2, |x, _| Luma([(x * 80) as u8]));
        let result = apply(DynamicImage::ImageLuma8(img)).unwrap();
        assert_eq!(result.width(), 3);
        assert_eq!(result.height(), 2);
    }

    #[test]
    fn test_clip_histogram_conserves_mass() {
        let mut histogram = [0u32; 256];
        histogram[10] = 1000;
        clip_histogram(&mut histogram, 1000, 2.0);
        assert_eq!(histogram.iter().sum::<u32>(), 1000);
        assert!(histogram[10] < 1000);
    }
}
