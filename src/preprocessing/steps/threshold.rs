use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};

/// Sauvola threshold parameters
const WINDOW_SIZE: u32 = 15;
const K: f32 = 0.2;
const R: f32 = 128.0; // Dynamic range / 2

/// Apply Sauvola adaptive thresholding
/// Handles uneven lighting better than a global threshold
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.into_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(OcrError::Processing("Cannot binarize an empty image".to_string()));
    }
    Ok(DynamicImage::ImageLuma8(sauvola(&gray, WINDOW_SIZE, K)))
}

/// Summed-area tables of pixel values and squared values, one row and
/// column larger than the image so window sums need no bounds checks.
struct IntegralImage {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl IntegralImage {
    fn new(img: &GrayImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let stride = width + 1;
        let mut sum = vec![0.0f64; stride * (height + 1)];
        let mut sum_sq = vec![0.0f64; stride * (height + 1)];

        for y in 0..height {
            let mut row_sum = 0.0;
            let mut row_sum_sq = 0.0;
            for x in 0..width {
                let val = img.get_pixel(x as u32, y as u32).0[0] as f64;
                row_sum += val;
                row_sum_sq += val * val;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                sum_sq[idx] = sum_sq[idx - stride] + row_sum_sq;
            }
        }

        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    /// Mean and standard deviation over the inclusive window [x1, x2] x [y1, y2]
    fn window_stats(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> (f32, f32) {
        let (x1, y1, x2, y2) = (x1 as usize, y1 as usize, x2 as usize + 1, y2 as usize + 1);
        let area = ((x2 - x1) * (y2 - y1)) as f64;
        let at = |table: &[f64], x: usize, y: usize| table[y * self.stride + x];

        let sum = at(&self.sum, x2, y2) - at(&self.sum, x2, y1) - at(&self.sum, x1, y2)
            + at(&self.sum, x1, y1);
        let sum_sq = at(&self.sum_sq, x2, y2) - at(&self.sum_sq, x2, y1)
            - at(&self.sum_sq, x1, y2)
            + at(&self.sum_sq, x1, y1);

        let mean = sum / area;
        let variance = (sum_sq / area) - (mean * mean);
        (mean as f32, variance.max(0.0).sqrt() as f32)
    }
}

/// For each pixel, threshold = mean * (1 + k * (std_dev / R - 1))
pub fn sauvola(img: &GrayImage, window_size: u32, k: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let half_window = window_size / 2;
    let integral = IntegralImage::new(img);

    GrayImage::from_fn(width, height, |x, y| {
        let x1 = x.saturating_sub(half_window);
        let y1 = y.saturating_sub(half_window);
        let x2 = (x + half_window).min(width - 1);
        let y2 = (y + half_window).min(height - 1);

        let (mean, std_dev) = integral.window_stats(x1, y1, x2, y2);
        let threshold = mean * (1.0 + k * (std_dev / R - 1.0));

        if img.get_pixel(x, y).0[0] as f32 > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_binarizes_image() {
        let img = GrayImage::from_fn(50, 50, |x, _| Luma([(x as u8 * 5).min(255)]));

        let result = apply(DynamicImage::ImageLuma8(img)).unwrap().to_luma8();

        assert!(result.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_threshold_separates_text_from_background() {
        let mut img = GrayImage::from_pixel(50, 20, Luma([240]));
        for x in 10..40 {
            img.put_pixel(x, 10, Luma([20]));
        }

        let result = apply(DynamicImage::ImageLuma8(img)).unwrap().to_luma8();

        assert_eq!(result.get_pixel(25, 10).0[0], 0);
        assert_eq!(result.get_pixel(25, 5).0[0], 255);
    }

    #[test]
    fn test_window_stats_on_constant_image() {
        let img = GrayImage::from_pixel(8, 8, Luma([100]));
        let integral = IntegralImage::new(&img);
        let (mean, std_dev) = integral.window_stats(1, 1, 5, 6);
        assert!((mean - 100.0).abs() < 1e-3);
        assert!(std_dev.abs() < 1e-3);
    }
}
