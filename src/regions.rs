//! Text region detection for sparse-text images
//!
//! When full-frame recognition finds almost nothing (isolated signage, a
//! label in a photo), candidate text blobs are located, merged into
//! horizontal runs and recognized one crop at a time.

use crate::engine::{RecognitionBackend, SegmentationMode};
use crate::preprocessing::steps;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::Serialize;

/// Boxes must be strictly larger than this on both axes
const MIN_REGION_SIZE: u32 = 10;
/// Boxes must be strictly smaller than this fraction of the image on both axes
const MAX_REGION_FRACTION: f32 = 0.8;

/// Axis-aligned box in pixel coordinates of the image it was detected in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Smallest box containing both
    pub fn union(&self, other: &TextRegion) -> TextRegion {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        TextRegion {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Intersect with the image rectangle; `None` if nothing is left
    fn clamp_to(&self, width: u32, height: u32) -> Option<TextRegion> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let clamped = TextRegion {
            x: self.x,
            y: self.y,
            width: self.width.min(width - self.x),
            height: self.height.min(height - self.y),
        };
        (clamped.width > 0 && clamped.height > 0).then_some(clamped)
    }
}

/// Produces raw candidate boxes from a grayscale image
pub trait BlobDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Vec<TextRegion>;
}

/// Connected components of an Otsu-binarized image, for dark-on-light and
/// light-on-dark text alike
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentBlobDetector;

impl BlobDetector for ComponentBlobDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<TextRegion> {
        if !can_hold_region(gray.width(), gray.height()) {
            return Vec::new();
        }

        let level = otsu_level(gray);
        let binary = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            if gray.get_pixel(x, y).0[0] > level {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        let mut boxes = component_boxes(&binary, Luma([255u8]));
        boxes.extend(component_boxes(&binary, Luma([0u8])));
        boxes
    }
}

/// Bounding boxes of every component that is not `background`
fn component_boxes(binary: &GrayImage, background: Luma<u8>) -> Vec<TextRegion> {
    let labels = connected_components(binary, Connectivity::Eight, background);

    // (min_x, min_y, max_x, max_y) per label, label 0 is background
    let mut extents: Vec<Option<(u32, u32, u32, u32)>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label == 0 {
            continue;
        }
        if extents.len() < label {
            extents.resize(label, None);
        }
        let entry = &mut extents[label - 1];
        *entry = Some(match *entry {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    extents
        .into_iter()
        .flatten()
        .map(|(x0, y0, x1, y1)| TextRegion::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
        .collect()
}

/// No box on an image this small can survive `filter_regions`
fn can_hold_region(width: u32, height: u32) -> bool {
    width > MIN_REGION_SIZE && height > MIN_REGION_SIZE
}

/// Drop noise specks and boxes that cover most of the image
pub fn filter_regions(boxes: Vec<TextRegion>, width: u32, height: u32) -> Vec<TextRegion> {
    let max_w = width as f32 * MAX_REGION_FRACTION;
    let max_h = height as f32 * MAX_REGION_FRACTION;
    boxes
        .into_iter()
        .filter(|b| {
            b.width > MIN_REGION_SIZE
                && b.height > MIN_REGION_SIZE
                && (b.width as f32) < max_w
                && (b.height as f32) < max_h
        })
        .collect()
}

/// Sort boxes by left edge and merge each into the previous accumulated
/// box when its left edge lies within that box's right edge.
pub fn merge_regions(mut boxes: Vec<TextRegion>) -> Vec<TextRegion> {
    boxes.sort_by_key(|b| b.x);

    let mut merged: Vec<TextRegion> = Vec::with_capacity(boxes.len());
    for current in boxes {
        match merged.last_mut() {
            Some(last) if current.x <= last.right() => *last = last.union(&current),
            _ => merged.push(current),
        }
    }
    merged
}

/// Locates and recognizes text regions
pub struct RegionDetector {
    blobs: Box<dyn BlobDetector>,
}

impl Default for RegionDetector {
    fn default() -> Self {
        Self::new(Box::new(ComponentBlobDetector))
    }
}

impl RegionDetector {
    pub fn new(blobs: Box<dyn BlobDetector>) -> Self {
        Self { blobs }
    }

    /// Filtered, merged regions ordered by left edge
    pub fn detect_regions(&self, image: &DynamicImage) -> Vec<TextRegion> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        if !can_hold_region(width, height) {
            return Vec::new();
        }

        let raw = self.blobs.detect(&gray);
        let raw_count = raw.len();
        let regions: Vec<TextRegion> = merge_regions(filter_regions(raw, width, height))
            .into_iter()
            .filter_map(|r| r.clamp_to(width, height))
            .collect();

        tracing::debug!(
            "Region detector: {} raw boxes, {} merged regions",
            raw_count,
            regions.len()
        );
        regions
    }

    /// Recognize every region on its own and join the non-empty results
    /// with single spaces, in region order. Failed regions are skipped.
    pub fn recognize_regions(
        &self,
        backend: &dyn RecognitionBackend,
        image: &DynamicImage,
        regions: &[TextRegion],
    ) -> String {
        let mut texts = Vec::new();

        for region in regions {
            let Some(region) = region.clamp_to(image.width(), image.height()) else {
                continue;
            };
            let crop = image.crop_imm(region.x, region.y, region.width, region.height);

            let prepared = match steps::denoise::apply(crop).and_then(steps::threshold::apply) {
                Ok(img) => img,
                Err(e) => {
                    tracing::warn!("Skipping region {:?}: {}", region, e);
                    continue;
                }
            };

            match backend.recognize_text(&prepared, SegmentationMode::Auto) {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        texts.push(text.to_string());
                    }
                }
                Err(e) => tracing::warn!("Recognition failed for region {:?}: {}", region, e),
            }
        }

        texts.join(" ")
    }
}
