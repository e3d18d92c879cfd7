//! Text module: preprocessing, recognition and correction of one image

use crate::config::Config;
use crate::engine::RecognitionBackend;
use crate::error::OcrError;
use crate::preprocessing::Pipeline;
use crate::recognition::{RecognitionSettings, TextRecognizer, TextSource};
use crate::text::{normalize, Vocabulary};
use image::{DynamicImage, ImageReader};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Returned by `extract_text` when nothing was recognized
pub const NO_TEXT_FOUND: &str = "No text found";

#[derive(Debug, Clone, Serialize)]
pub struct TextExtraction {
    /// Best recognized text before correction
    pub raw_text: String,
    /// Normalized and corrected text
    pub text: String,
    pub confidence: f32,
    pub source: TextSource,
    pub preprocessing_ms: u64,
    pub recognition_ms: u64,
    /// Preprocessing fell back to the plain grayscale image
    pub degraded: bool,
}

/// Runs the full text pipeline with a fixed backend and vocabulary
pub struct OcrProcessor {
    pipeline: Pipeline,
    recognizer: TextRecognizer,
    vocabulary: Arc<Vocabulary>,
}

impl OcrProcessor {
    pub fn new(pipeline: Pipeline, recognizer: TextRecognizer, vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            pipeline,
            recognizer,
            vocabulary,
        }
    }

    pub fn from_config(
        config: &Config,
        backend: Arc<dyn RecognitionBackend>,
        vocabulary: Arc<Vocabulary>,
    ) -> Self {
        let pipeline = Pipeline::new(config.preset).with_target_width(config.target_width);
        let recognizer = TextRecognizer::new(backend).with_settings(RecognitionSettings {
            scales: config.scales.clone(),
            ..Default::default()
        });
        Self::new(pipeline, recognizer, vocabulary)
    }

    pub fn backend_name(&self) -> &'static str {
        self.recognizer.backend().name()
    }

    /// Load an image file and extract its text
    pub fn process(&self, path: &Path) -> Result<TextExtraction, OcrError> {
        let image = load_image(path)?;
        Ok(self.process_image(&image))
    }

    /// Extract text from an already decoded image. Never fails; an image
    /// without readable text yields an empty extraction.
    pub fn process_image(&self, image: &DynamicImage) -> TextExtraction {
        let preprocessed = self.pipeline.process(image);

        let start = Instant::now();
        let best = self.recognizer.recognize_best(&preprocessed.image);
        let recognition_ms = start.elapsed().as_millis() as u64;

        let text = normalize(&best.text, &self.vocabulary);

        tracing::info!(
            "Extracted {} chars in {}ms (preprocess {}ms, confidence {:.1})",
            text.chars().count(),
            recognition_ms,
            preprocessed.total_time_ms,
            best.confidence
        );

        TextExtraction {
            raw_text: best.text,
            text,
            confidence: best.confidence,
            source: best.source,
            preprocessing_ms: preprocessed.total_time_ms,
            recognition_ms,
            degraded: preprocessed.degraded,
        }
    }

    /// Corrected text of the image, or `NO_TEXT_FOUND`
    pub fn extract_text(&self, path: &Path) -> Result<String, OcrError> {
        let extraction = self.process(path)?;
        if extraction.text.trim().is_empty() {
            return Ok(NO_TEXT_FOUND.to_string());
        }
        Ok(extraction.text)
    }
}

/// Decode an image, detecting the format from its contents
pub fn load_image(path: &Path) -> Result<DynamicImage, OcrError> {
    ImageReader::open(path)
        .map_err(|e| OcrError::ImageLoad(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| OcrError::ImageLoad(format!("{}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| OcrError::ImageLoad(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::Preset;
    use crate::test_support::{write_png, FixedBackend};

    fn processor(backend: FixedBackend) -> OcrProcessor {
        OcrProcessor::from_config(
            &Config::default(),
            Arc::new(backend),
            Arc::new(Vocabulary::builtin()),
        )
    }

    #[test]
    fn test_recognized_text_is_corrected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sign.png");
        write_png(&path);

        let extraction = processor(FixedBackend::new(&[("5T0P", 92.0), ("here", 88.0)]))
            .process(&path)
            .unwrap();

        assert_eq!(extraction.raw_text, "5T0P here");
        assert_eq!(extraction.text, "STOP HERE");
        assert_eq!(extraction.confidence, 90.0);
        assert!(!extraction.degraded);
    }

    #[test]
    fn test_empty_result_is_no_text_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        write_png(&path);

        let text = processor(FixedBackend::new(&[])).extract_text(&path).unwrap();
        assert_eq!(text, NO_TEXT_FOUND);
    }

    #[test]
    fn test_failing_backend_yields_no_text_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        write_png(&path);

        let text = processor(FixedBackend::failing("not installed"))
            .extract_text(&path)
            .unwrap();
        assert_eq!(text, NO_TEXT_FOUND);
    }

    #[test]
    fn test_missing_file_is_image_load_error() {
        let result = processor(FixedBackend::new(&[])).process(Path::new("/no/such/image.png"));
        assert!(matches!(result, Err(OcrError::ImageLoad(_))));
    }

    #[test]
    fn test_corrupt_file_is_image_load_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"definitely not an image").unwrap();

        let result = processor(FixedBackend::new(&[])).process(file.path());
        assert!(matches!(result, Err(OcrError::ImageLoad(_))));
    }

    #[test]
    fn test_format_detected_without_extension() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_png(file.path());

        let processor = OcrProcessor::new(
            Pipeline::new(Preset::Minimal),
            TextRecognizer::new(Arc::new(FixedBackend::new(&[("EXIT", 90.0), ("ONLY", 90.0)]))),
            Arc::new(Vocabulary::builtin()),
        );
        assert_eq!(processor.extract_text(file.path()).unwrap(), "EXIT ONLY");
    }
}
