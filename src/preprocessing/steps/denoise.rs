use crate::error::OcrError;
use image::DynamicImage;
use imageproc::filter::median_filter;

/// Apply an edge-preserving median filter
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    apply_with_radius(image, 1)
}

/// Median filter with a square window of `2 * radius + 1` pixels
pub fn apply_with_radius(image: DynamicImage, radius: u32) -> Result<DynamicImage, OcrError> {
    let gray = image.into_luma8();
    if radius == 0 {
        return Ok(DynamicImage::ImageLuma8(gray));
    }
    let denoised = median_filter(&gray, radius, radius);
    Ok(DynamicImage::ImageLuma8(denoised))
}
