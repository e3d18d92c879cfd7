use crate::engine::{RecognitionBackend, SegmentationMode, TokenConfidence};
use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};
use std::path::Path;

/// Returns the same tokens for every image and mode, or fails every call
pub struct FixedBackend {
    result: Result<Vec<TokenConfidence>, String>,
}

impl FixedBackend {
    pub fn new(words: &[(&str, f32)]) -> Self {
        Self {
            result: Ok(words
                .iter()
                .map(|(text, conf)| TokenConfidence::new(*text, *conf))
                .collect()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }

    fn tokens(&self) -> Result<Vec<TokenConfidence>, OcrError> {
        self.result
            .clone()
            .map_err(OcrError::BackendUnavailable)
    }
}

impl RecognitionBackend for FixedBackend {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn description(&self) -> &'static str {
        "returns fixed tokens"
    }

    fn recognize_text(&self, _: &DynamicImage, _: SegmentationMode) -> Result<String, OcrError> {
        Ok(self
            .tokens()?
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn recognize_with_confidences(
        &self,
        _: &DynamicImage,
        _: SegmentationMode,
    ) -> Result<Vec<TokenConfidence>, OcrError> {
        self.tokens()
    }

    fn supported_languages(&self) -> Vec<String> {
        vec!["eng".to_string()]
    }
}

/// Write a small light-gray PNG to `path`
pub fn write_png(path: &Path) {
    GrayImage::from_pixel(64, 32, Luma([220]))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}
