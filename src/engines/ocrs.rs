//! OCRS backend implementation
//!
//! Pure Rust recognition backend using the ocrs library. No system dependencies required.
//! Downloads neural network models automatically on first use.
//!
//! ocrs has no page segmentation modes, so each mode is mapped onto a way
//! of grouping detected words into lines before recognition.

use crate::engine::{
    RecognitionAttempt, RecognitionBackend, RecognitionConfig, SegmentationMode, TokenConfidence,
};
use crate::engines::cache;
use crate::error::OcrError;
use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams};
use rten::Model;
use std::sync::Arc;

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// Recognition backend wrapping the ocrs library
pub struct OcrsBackend {
    engine: Arc<OcrsOcrEngine>,
}

impl OcrsBackend {
    /// Create the backend, downloading models if needed
    pub fn new() -> Result<Self, OcrError> {
        let dir = cache::cache_dir(None)?;
        let detection_model_path =
            cache::ensure_downloaded(DETECTION_MODEL_URL, &dir, "text-detection.rten")?;
        let recognition_model_path =
            cache::ensure_downloaded(RECOGNITION_MODEL_URL, &dir, "text-recognition.rten")?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            OcrError::Initialization(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            OcrError::Initialization(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| OcrError::Initialization(format!("Failed to create OCR engine: {}", e)))?;

        tracing::info!("ocrs backend initialized successfully");

        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    /// Recognized lines, each as its words in reading order
    fn recognize_lines(
        &self,
        image: &DynamicImage,
        mode: SegmentationMode,
    ) -> Result<Vec<Vec<String>>, OcrError> {
        let rgb_img = image.to_rgb8();
        let dimensions = rgb_img.dimensions();

        let img_source = ImageSource::from_bytes(rgb_img.as_raw(), dimensions).map_err(|e| {
            OcrError::Recognition(format!("Failed to create image source: {}", e))
        })?;

        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| OcrError::Recognition(format!("Failed to prepare input: {}", e)))?;

        let word_rects = self
            .engine
            .detect_words(&ocr_input)
            .map_err(|e| OcrError::Recognition(format!("Failed to detect words: {}", e)))?;

        let line_rects = match mode {
            // Every word recognized on its own
            SegmentationMode::SparseText => word_rects.iter().map(|w| vec![*w]).collect(),
            // Every word on a single line
            SegmentationMode::RawLine => {
                let lines = self.engine.find_text_lines(&ocr_input, &word_rects);
                vec![lines.into_iter().flatten().collect()]
            }
            SegmentationMode::Auto | SegmentationMode::SingleBlock => {
                self.engine.find_text_lines(&ocr_input, &word_rects)
            }
        };

        let line_texts = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| OcrError::Recognition(format!("Failed to recognize text: {}", e)))?;

        Ok(line_texts
            .iter()
            .filter_map(|line| line.as_ref())
            .map(|line| line.words().map(|word| word.to_string()).collect::<Vec<_>>())
            .filter(|words| !words.is_empty())
            .collect())
    }
}

/// `SingleBlock` groups words exactly like `Auto` and only joins lines
/// differently, so its text has the same length and the same tokens
fn mode_class(mode: SegmentationMode) -> SegmentationMode {
    match mode {
        SegmentationMode::SingleBlock => SegmentationMode::Auto,
        other => other,
    }
}

/// Join recognized lines the way the mode lays text out
fn join_lines(lines: &[Vec<String>], mode: SegmentationMode) -> String {
    let separator = match mode {
        SegmentationMode::Auto => "\n",
        _ => " ",
    };
    lines
        .iter()
        .map(|words| words.join(" "))
        .collect::<Vec<_>>()
        .join(separator)
}

/// One token per word, scored on its own and discounted on fragmented lines
fn line_tokens(lines: &[Vec<String>]) -> Vec<TokenConfidence> {
    lines
        .iter()
        .flat_map(|words| {
            let singles = words.iter().filter(|w| w.chars().count() == 1).count();
            let factor = if words.len() > 1 && singles * 2 > words.len() {
                FRAGMENTED_LINE_PENALTY
            } else {
                1.0
            };
            words
                .iter()
                .map(move |word| TokenConfidence::new(word.as_str(), word_confidence(word) * factor))
        })
        .collect()
}

impl RecognitionBackend for OcrsBackend {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn recognize_text(
        &self,
        image: &DynamicImage,
        mode: SegmentationMode,
    ) -> Result<String, OcrError> {
        let lines = self.recognize_lines(image, mode)?;
        Ok(join_lines(&lines, mode))
    }

    fn recognize_with_confidences(
        &self,
        image: &DynamicImage,
        mode: SegmentationMode,
    ) -> Result<Vec<TokenConfidence>, OcrError> {
        let lines = self.recognize_lines(image, mode)?;
        Ok(line_tokens(&lines))
    }

    /// Text and confidences come from the same pass
    fn recognize(
        &self,
        image: &DynamicImage,
        config: RecognitionConfig,
    ) -> Result<RecognitionAttempt, OcrError> {
        let lines = self.recognize_lines(image, config.mode)?;
        Ok(RecognitionAttempt::new(
            config,
            join_lines(&lines, config.mode),
            line_tokens(&lines),
        ))
    }

    fn equivalent_mode(&self, mode: SegmentationMode) -> SegmentationMode {
        mode_class(mode)
    }

    fn supported_languages(&self) -> Vec<String> {
        // ocrs currently only supports English/Latin alphabet
        vec!["eng".to_string()]
    }
}

/// Lines where more than half the words are a single character are
/// usually a misread texture
const FRAGMENTED_LINE_PENALTY: f32 = 0.7;

/// Heuristic confidence of one recognized word, 0-100.
///
/// ocrs reports no scores, so a word is judged by its own characters:
/// the share that are letters or digits, case flipping inside the word,
/// letters mixed with digits, runs of one repeated character and
/// single-character words.
fn word_confidence(word: &str) -> f32 {
    let chars: Vec<char> = word.chars().collect();
    if chars.is_empty() {
        return 0.0;
    }

    let alphanumeric = chars.iter().filter(|c| c.is_alphanumeric()).count();
    if alphanumeric == 0 {
        return 10.0;
    }

    let mut score = alphanumeric as f32 / chars.len() as f32;
    if flips_case(&chars) {
        score *= 0.7;
    }
    if chars.iter().any(|c| c.is_alphabetic()) && chars.iter().any(|c| c.is_ascii_digit()) {
        // Often a letter read as a digit; normalization can still fix it
        score *= 0.85;
    }
    if longest_run(&chars) >= 4 {
        score *= 0.6;
    }
    if chars.len() == 1 {
        score *= 0.6;
    }

    (score * 100.0).clamp(0.0, 100.0)
}

/// An uppercase letter right after a lowercase one, as in "eXiT"
fn flips_case(chars: &[char]) -> bool {
    chars
        .windows(2)
        .any(|pair| pair[0].is_lowercase() && pair[1].is_uppercase())
}

fn longest_run(chars: &[char]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut prev = None;
    for &c in chars {
        current = if Some(c) == prev { current + 1 } else { 1 };
        longest = longest.max(current);
        prev = Some(c);
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&[&str]]) -> Vec<Vec<String>> {
        items
            .iter()
            .map(|words| words.iter().map(|w| w.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_auto_keeps_line_breaks() {
        let lines = lines(&[&["NO", "PARKING"], &["TOW", "AWAY", "ZONE"]]);
        assert_eq!(join_lines(&lines, SegmentationMode::Auto), "NO PARKING\nTOW AWAY ZONE");
        assert_eq!(
            join_lines(&lines, SegmentationMode::SparseText),
            "NO PARKING TOW AWAY ZONE"
        );
    }

    #[test]
    fn test_clean_words_are_fully_confident() {
        assert_eq!(word_confidence("EXIT"), 100.0);
        assert_eq!(word_confidence("Parking"), 100.0);
        assert_eq!(word_confidence(""), 0.0);
    }

    #[test]
    fn test_symbol_words_fall_below_token_floor() {
        assert!(word_confidence("§±®") < 30.0);
        assert!(word_confidence("~") < 30.0);
    }

    #[test]
    fn test_suspicious_words_score_lower() {
        let clean = word_confidence("EXIT");
        assert!(word_confidence("eXiT") < clean);
        assert!(word_confidence("EX1T") < clean);
        assert!(word_confidence("EXIIIIT") < clean);
        assert!(word_confidence("A") < clean);
        assert!(word_confidence("EXIT!") < clean);
    }

    #[test]
    fn test_fragmented_line_is_discounted() {
        let tokens = line_tokens(&lines(&[&["NO", "PARKING"], &["a", "b", "PUSH"]]));

        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0].confidence, 100.0);
        assert_eq!(tokens[1].confidence, 100.0);
        assert_eq!(tokens[4].confidence, 100.0 * FRAGMENTED_LINE_PENALTY);
    }

    #[test]
    fn test_single_block_reproduces_auto() {
        assert_eq!(mode_class(SegmentationMode::SingleBlock), SegmentationMode::Auto);
        assert_eq!(mode_class(SegmentationMode::SparseText), SegmentationMode::SparseText);
        assert_eq!(mode_class(SegmentationMode::RawLine), SegmentationMode::RawLine);
    }
}
