use crate::error::OcrError;
use image::{imageops, DynamicImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, dilate};

/// Reconnect broken strokes in a binarized image.
///
/// Text is dark on a light background, while imageproc treats bright pixels
/// as foreground, so the image is inverted around a closing and a dilation.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let mut strokes = image.into_luma8();
    imageops::invert(&mut strokes);

    let closed = close(&strokes, Norm::LInf, 1);
    let mut thickened = dilate(&closed, Norm::LInf, 1);

    imageops::invert(&mut thickened);
    Ok(DynamicImage::ImageLuma8(thickened))
}
