#![allow(dead_code)]

use assistive_vqa::engine::{RecognitionBackend, SegmentationMode, TokenConfidence};
use assistive_vqa::error::OcrError;
use assistive_vqa::vision::{validate_request, VisionModel};
use image::{DynamicImage, GrayImage, Luma};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Backend that "reads" the same words from every image
pub struct StaticBackend {
    words: Vec<(String, f32)>,
}

impl StaticBackend {
    pub fn new(words: &[(&str, f32)]) -> Self {
        Self {
            words: words.iter().map(|(w, c)| (w.to_string(), *c)).collect(),
        }
    }
}

impl RecognitionBackend for StaticBackend {
    fn name(&self) -> &'static str {
        "static"
    }

    fn description(&self) -> &'static str {
        "reads fixed words"
    }

    fn recognize_text(&self, _: &DynamicImage, _: SegmentationMode) -> Result<String, OcrError> {
        Ok(self
            .words
            .iter()
            .map(|(w, _)| w.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn recognize_with_confidences(
        &self,
        _: &DynamicImage,
        _: SegmentationMode,
    ) -> Result<Vec<TokenConfidence>, OcrError> {
        Ok(self
            .words
            .iter()
            .map(|(w, c)| TokenConfidence::new(w.as_str(), *c))
            .collect())
    }

    fn supported_languages(&self) -> Vec<String> {
        vec!["eng".to_string()]
    }
}

/// Vision model with a canned reply that remembers the image paths it saw
pub struct CannedVision {
    pub reply: String,
    pub seen: Arc<Mutex<Vec<PathBuf>>>,
}

impl VisionModel for CannedVision {
    fn name(&self) -> &str {
        "canned"
    }

    fn answer(&self, image_path: &Path, question: &str) -> Result<String, OcrError> {
        validate_request(image_path, question)?;
        self.seen.lock().unwrap().push(image_path.to_path_buf());
        Ok(self.reply.clone())
    }
}

/// PNG bytes of a light gray image
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    GrayImage::from_pixel(64, 32, Luma([220]))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}
