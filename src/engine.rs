use crate::error::OcrError;
use image::DynamicImage;
use serde::Serialize;

/// Confidence values below zero mean the backend found no text at that position
pub const NO_DETECTION: f32 = -1.0;

/// How the backend partitions an image into text blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    /// Fully automatic page layout
    Auto,
    /// A single uniform block of text
    SingleBlock,
    /// As much text as possible, in no particular order
    SparseText,
    /// The image is one text line
    RawLine,
}

impl SegmentationMode {
    /// Trial order used by the recognizer
    pub const ALL: [SegmentationMode; 4] = [
        SegmentationMode::Auto,
        SegmentationMode::SingleBlock,
        SegmentationMode::SparseText,
        SegmentationMode::RawLine,
    ];

    /// Tesseract page segmentation mode number
    pub fn psm(&self) -> u8 {
        match self {
            Self::Auto => 3,
            Self::SingleBlock => 6,
            Self::SparseText => 11,
            Self::RawLine => 13,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::SingleBlock => "single_block",
            Self::SparseText => "sparse_text",
            Self::RawLine => "raw_line",
        }
    }
}

/// One recognition configuration: segmentation mode plus the scale the
/// image was resized by before the backend saw it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecognitionConfig {
    pub mode: SegmentationMode,
    pub scale: f32,
}

impl RecognitionConfig {
    pub fn new(mode: SegmentationMode, scale: f32) -> Self {
        Self { mode, scale }
    }
}

/// A recognized token and the backend's certainty, 0-100
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenConfidence {
    pub text: String,
    pub confidence: f32,
}

impl TokenConfidence {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Output of one backend invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionAttempt {
    config: RecognitionConfig,
    raw_text: String,
    tokens: Vec<TokenConfidence>,
}

impl RecognitionAttempt {
    /// Build an attempt, dropping no-detection tokens and tokens that are
    /// empty after trimming. Remaining confidences are clamped to 0-100.
    pub fn new(
        config: RecognitionConfig,
        raw_text: impl Into<String>,
        tokens: Vec<TokenConfidence>,
    ) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|t| t.confidence >= 0.0 && !t.text.trim().is_empty())
            .map(|t| TokenConfidence {
                text: t.text.trim().to_string(),
                confidence: t.confidence.clamp(0.0, 100.0),
            })
            .collect();

        Self {
            config,
            raw_text: raw_text.into(),
            tokens,
        }
    }

    pub fn config(&self) -> RecognitionConfig {
        self.config
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn tokens(&self) -> &[TokenConfidence] {
        &self.tokens
    }

    /// Length of the trimmed text in characters
    pub fn text_len(&self) -> usize {
        self.raw_text.trim().chars().count()
    }

    /// Mean token confidence, 0 when nothing was recognized
    pub fn mean_confidence(&self) -> f32 {
        if self.tokens.is_empty() {
            return 0.0;
        }
        let total: f32 = self.tokens.iter().map(|t| t.confidence).sum();
        total / self.tokens.len() as f32
    }
}

/// Trait that all recognition backends must implement
pub trait RecognitionBackend: Send + Sync {
    /// Returns the backend identifier (e.g., "ocrs", "tesseract")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the backend
    fn description(&self) -> &'static str;

    /// Recognize the text of an image under a segmentation mode
    fn recognize_text(&self, image: &DynamicImage, mode: SegmentationMode)
        -> Result<String, OcrError>;

    /// Recognize tokens with per-token confidences
    fn recognize_with_confidences(
        &self,
        image: &DynamicImage,
        mode: SegmentationMode,
    ) -> Result<Vec<TokenConfidence>, OcrError>;

    /// Produce a full attempt. Backends that get text and confidences from
    /// a single pass should override this.
    fn recognize(
        &self,
        image: &DynamicImage,
        config: RecognitionConfig,
    ) -> Result<RecognitionAttempt, OcrError> {
        let text = self.recognize_text(image, config.mode)?;
        let tokens = self.recognize_with_confidences(image, config.mode)?;
        Ok(RecognitionAttempt::new(config, text.trim(), tokens))
    }

    /// Mode whose ranking this mode reproduces on this backend. The
    /// recognizer tries only the first configured mode of each class.
    fn equivalent_mode(&self, mode: SegmentationMode) -> SegmentationMode {
        mode
    }

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String>;
}
