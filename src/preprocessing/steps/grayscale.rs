use image::{DynamicImage, GrayImage, Luma};

/// Convert image to a single-channel working copy.
///
/// Transparent pixels are composited onto white first, so dark text on a
/// transparent background does not disappear into a black canvas.
pub fn apply(image: &DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return DynamicImage::ImageLuma8(image.to_luma8());
    }

    let luma_alpha = image.to_luma_alpha8();
    let flattened = GrayImage::from_fn(luma_alpha.width(), luma_alpha.height(), |x, y| {
        let [value, alpha] = luma_alpha.get_pixel(x, y).0;
        let alpha = alpha as u32;
        let blended = (value as u32 * alpha + 255 * (255 - alpha)) / 255;
        Luma([blended as u8])
    });
    DynamicImage::ImageLuma8(flattened)
}
