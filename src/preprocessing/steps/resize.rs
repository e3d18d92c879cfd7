use crate::error::OcrError;
use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Images narrower than this fraction of the target width get upscaled
const UPSCALE_RATIO: f32 = 0.7;
/// Maximum dimension to avoid memory issues
pub const MAX_DIMENSION: u32 = 4000;

/// Upscale narrow images to `target_width`, preserving aspect ratio.
/// Images that are already reasonably wide are returned unchanged.
pub fn apply(image: DynamicImage, target_width: u32) -> Result<DynamicImage, OcrError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::Processing("Image has zero size".to_string()));
    }

    if width as f32 >= target_width as f32 * UPSCALE_RATIO {
        return Ok(image);
    }

    let scale = target_width as f32 / width as f32;
    let new_height = ((height as f32 * scale).round() as u32).max(1);
    if new_height > MAX_DIMENSION {
        tracing::debug!(
            "Skipping upscale of {}x{}: height would exceed {}",
            width,
            height,
            MAX_DIMENSION
        );
        return Ok(image);
    }

    Ok(image.resize_exact(target_width, new_height, FilterType::Lanczos3))
}

/// Scale an image by `factor` for a recognition attempt.
/// Returns `None` when the result would be empty or exceed `MAX_DIMENSION`.
pub fn scale_by(image: &DynamicImage, factor: f32) -> Option<DynamicImage> {
    let (width, height) = image.dimensions();
    let new_width = (width as f32 * factor).round() as u32;
    let new_height = (height as f32 * factor).round() as u32;

    if new_width == 0 || new_height == 0 || new_width.max(new_height) > MAX_DIMENSION {
        return None;
    }

    Some(image.resize_exact(new_width, new_height, FilterType::Lanczos3))
}
