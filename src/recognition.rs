//! Multi-pass text recognition
//!
//! Runs the backend under every segmentation mode at several scales,
//! scores each attempt from its token confidences and keeps the best one.
//! Sparse-text images that yield almost nothing fall back to per-region
//! recognition.

use crate::engine::{RecognitionAttempt, RecognitionBackend, RecognitionConfig, SegmentationMode};
use crate::preprocessing::steps::resize;
use crate::ranking::select_best;
use crate::regions::RegionDetector;
use image::DynamicImage;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;

/// Tokens below this confidence do not count towards the score
pub const MIN_TOKEN_CONFIDENCE: f32 = 30.0;
/// Texts shorter than this have their score multiplied by `SHORT_TEXT_PENALTY`
pub const SHORT_TEXT_CHARS: usize = 3;
pub const SHORT_TEXT_PENALTY: f32 = 0.5;
/// Below either of these the region detector is tried
pub const MIN_USABLE_CHARS: usize = 5;
pub const MIN_USABLE_CONFIDENCE: f32 = 50.0;

pub const DEFAULT_SCALES: [f32; 3] = [1.0, 1.5, 2.0];

/// Score of one attempt: sum of token confidences at or above the floor,
/// halved for very short texts.
pub fn score_attempt(attempt: &RecognitionAttempt) -> f32 {
    let sum: f32 = attempt
        .tokens()
        .iter()
        .filter(|t| t.confidence >= MIN_TOKEN_CONFIDENCE)
        .map(|t| t.confidence)
        .sum();

    if attempt.text_len() < SHORT_TEXT_CHARS {
        sum * SHORT_TEXT_PENALTY
    } else {
        sum
    }
}

/// An attempt reduced to what ranking needs
#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    pub config: RecognitionConfig,
    pub text: String,
    pub score: f32,
    pub confidence: f32,
}

impl ScoredResult {
    pub fn from_attempt(attempt: &RecognitionAttempt) -> Self {
        Self {
            config: attempt.config(),
            text: attempt.raw_text().trim().to_string(),
            score: score_attempt(attempt),
            confidence: attempt.mean_confidence(),
        }
    }

    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Higher score wins, then longer text
    fn rank(&self) -> (f32, usize) {
        (self.score, self.text_len())
    }
}

/// Where the returned text came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextSource {
    FullFrame { mode: SegmentationMode, scale: f32 },
    Regions { count: usize },
    Nothing,
}

/// Final output of a recognition session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestText {
    pub text: String,
    /// Mean token confidence of the winning full-frame attempt, 0-100
    pub confidence: f32,
    pub source: TextSource,
}

impl BestText {
    fn nothing() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            source: TextSource::Nothing,
        }
    }

    fn is_usable(&self) -> bool {
        self.text.chars().count() >= MIN_USABLE_CHARS && self.confidence >= MIN_USABLE_CONFIDENCE
    }
}

/// Which configurations a session tries, in order
#[derive(Debug, Clone)]
pub struct RecognitionSettings {
    pub modes: Vec<SegmentationMode>,
    pub scales: Vec<f32>,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            modes: SegmentationMode::ALL.to_vec(),
            scales: DEFAULT_SCALES.to_vec(),
        }
    }
}

/// Recognizes text with a backend, trying several configurations
pub struct TextRecognizer {
    backend: Arc<dyn RecognitionBackend>,
    regions: RegionDetector,
    settings: RecognitionSettings,
}

impl TextRecognizer {
    pub fn new(backend: Arc<dyn RecognitionBackend>) -> Self {
        Self {
            backend,
            regions: RegionDetector::default(),
            settings: RecognitionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RecognitionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_region_detector(mut self, regions: RegionDetector) -> Self {
        self.regions = regions;
        self
    }

    pub fn backend(&self) -> &dyn RecognitionBackend {
        self.backend.as_ref()
    }

    /// Best text over all configured modes and scales.
    ///
    /// Ties on score go to the longer text, then to the earlier
    /// configuration. Failed invocations are logged and skipped; if every
    /// invocation fails the result is empty with zero confidence.
    pub fn recognize_best(&self, image: &DynamicImage) -> BestText {
        let scaled = self.scaled_images(image);

        let per_mode = self.trial_modes().into_iter().filter_map(|mode| {
            let attempts = scaled
                .iter()
                .filter_map(|(scale, img)| self.attempt(img, RecognitionConfig::new(mode, *scale)));
            select_best(attempts, ScoredResult::rank)
        });

        let Some(best) = select_best(per_mode, ScoredResult::rank) else {
            tracing::warn!("Every recognition attempt failed");
            return BestText::nothing();
        };

        tracing::debug!(
            "Best attempt: mode={} scale={} score={:.1} confidence={:.1} chars={}",
            best.config.mode.as_str(),
            best.config.scale,
            best.score,
            best.confidence,
            best.text_len()
        );

        let mut result = BestText {
            source: TextSource::FullFrame {
                mode: best.config.mode,
                scale: best.config.scale,
            },
            text: best.text,
            confidence: best.confidence,
        };

        if !result.is_usable() {
            self.try_regions(image, &mut result);
        }

        result
    }

    /// Replace `result` with region text when that is strictly longer
    fn try_regions(&self, image: &DynamicImage, result: &mut BestText) {
        let regions = self.regions.detect_regions(image);
        if regions.is_empty() {
            return;
        }

        let region_text = self
            .regions
            .recognize_regions(self.backend.as_ref(), image, &regions);
        if region_text.chars().count() > result.text.chars().count() {
            tracing::debug!(
                "Using text from {} regions ({} chars)",
                regions.len(),
                region_text.chars().count()
            );
            result.text = region_text;
            result.source = TextSource::Regions {
                count: regions.len(),
            };
        }
    }

    fn attempt(&self, image: &DynamicImage, config: RecognitionConfig) -> Option<ScoredResult> {
        match self.backend.recognize(image, config) {
            Ok(attempt) => {
                let scored = ScoredResult::from_attempt(&attempt);
                tracing::debug!(
                    "Attempt mode={} scale={}: score={:.1} tokens={} chars={}",
                    config.mode.as_str(),
                    config.scale,
                    scored.score,
                    attempt.tokens().len(),
                    scored.text_len()
                );
                Some(scored)
            }
            Err(e) => {
                tracing::warn!(
                    "Recognition failed (mode={}, scale={}): {}",
                    config.mode.as_str(),
                    config.scale,
                    e
                );
                None
            }
        }
    }

    /// Configured modes minus those the backend treats as a repeat of an
    /// earlier one
    fn trial_modes(&self) -> Vec<SegmentationMode> {
        let mut classes = Vec::new();
        let mut modes = Vec::new();
        for &mode in &self.settings.modes {
            let class = self.backend.equivalent_mode(mode);
            if classes.contains(&class) {
                tracing::debug!("Skipping mode {}: same as {}", mode.as_str(), class.as_str());
                continue;
            }
            classes.push(class);
            modes.push(mode);
        }
        modes
    }

    fn scaled_images<'a>(&self, image: &'a DynamicImage) -> Vec<(f32, Cow<'a, DynamicImage>)> {
        self.settings
            .scales
            .iter()
            .filter_map(|&scale| {
                if (scale - 1.0).abs() < f32::EPSILON {
                    return Some((scale, Cow::Borrowed(image)));
                }
                match resize::scale_by(image, scale) {
                    Some(scaled) => Some((scale, Cow::Owned(scaled))),
                    None => {
                        tracing::debug!("Skipping scale {} for {}x{}", scale, image.width(), image.height());
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TokenConfidence;
    use crate::error::OcrError;
    use image::{GrayImage, Luma};

    type Script = dyn Fn(&DynamicImage, SegmentationMode) -> Result<Vec<TokenConfidence>, OcrError>
        + Send
        + Sync;

    /// Backend whose tokens come from a closure; text is the tokens joined by spaces
    struct ScriptedBackend(Box<Script>);

    impl RecognitionBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn description(&self) -> &'static str {
            "test backend"
        }

        fn recognize_text(
            &self,
            image: &DynamicImage,
            mode: SegmentationMode,
        ) -> Result<String, OcrError> {
            let tokens = (self.0)(image, mode)?;
            Ok(tokens
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" "))
        }

        fn recognize_with_confidences(
            &self,
            image: &DynamicImage,
            mode: SegmentationMode,
        ) -> Result<Vec<TokenConfidence>, OcrError> {
            (self.0)(image, mode)
        }

        fn supported_languages(&self) -> Vec<String> {
            vec!["eng".to_string()]
        }
    }

    fn recognizer<F>(script: F) -> TextRecognizer
    where
        F: Fn(&DynamicImage, SegmentationMode) -> Result<Vec<TokenConfidence>, OcrError>
            + Send
            + Sync
            + 'static,
    {
        TextRecognizer::new(Arc::new(ScriptedBackend(Box::new(script))))
    }

    fn tokens(items: &[(&str, f32)]) -> Vec<TokenConfidence> {
        items
            .iter()
            .map(|(text, conf)| TokenConfidence::new(*text, *conf))
            .collect()
    }

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255])))
    }

    fn attempt(text: &str, items: &[(&str, f32)]) -> RecognitionAttempt {
        RecognitionAttempt::new(
            RecognitionConfig::new(SegmentationMode::Auto, 1.0),
            text,
            tokens(items),
        )
    }

    #[test]
    fn test_short_text_score_is_halved() {
        let short = attempt("AB", &[("AB", 90.0)]);
        let long = attempt("ABCDEFGHIJ", &[("ABCDEFGHIJ", 90.0)]);
        assert_eq!(score_attempt(&short), 45.0);
        assert_eq!(score_attempt(&long), 90.0);
    }

    #[test]
    fn test_low_confidence_tokens_are_excluded() {
        let scored = attempt("NOISE EXIT", &[("NOISE", 25.0), ("EXIT", 80.0)]);
        assert_eq!(score_attempt(&scored), 80.0);
    }

    #[test]
    fn test_highest_score_wins_across_modes() {
        let rec = recognizer(|_, mode| match mode {
            SegmentationMode::SparseText => Ok(tokens(&[("HELLO", 45.0), ("WORLD", 90.0)])),
            _ => Ok(tokens(&[("HELLO", 40.0)])),
        });

        let best = rec.recognize_best(&blank(100, 40));

        assert_eq!(best.text, "HELLO WORLD");
        assert_eq!(best.confidence, 67.5);
        assert!(matches!(
            best.source,
            TextSource::FullFrame {
                mode: SegmentationMode::SparseText,
                ..
            }
        ));
    }

    #[test]
    fn test_equal_scores_prefer_longer_text() {
        let rec = recognizer(|_, mode| match mode {
            SegmentationMode::SingleBlock => Ok(tokens(&[("EXITS", 80.0)])),
            _ => Ok(tokens(&[("EXIT", 80.0)])),
        });

        assert_eq!(rec.recognize_best(&blank(100, 40)).text, "EXITS");
    }

    #[test]
    fn test_full_ties_keep_first_configuration() {
        let rec = recognizer(|_, _| Ok(tokens(&[("WELCOME", 90.0)])));

        let best = rec.recognize_best(&blank(100, 40));

        assert_eq!(
            best.source,
            TextSource::FullFrame {
                mode: SegmentationMode::Auto,
                scale: 1.0
            }
        );
    }

    #[test]
    fn test_larger_scale_can_win() {
        let rec = recognizer(|image, _| {
            if image.width() >= 200 {
                Ok(tokens(&[("OPEN", 95.0), ("NOW", 95.0)]))
            } else {
                Ok(tokens(&[("OPEN", 60.0), ("NOW", 60.0)]))
            }
        })
        .with_settings(RecognitionSettings {
            modes: vec![SegmentationMode::Auto],
            scales: vec![1.0, 2.0],
        });

        let best = rec.recognize_best(&blank(100, 40));

        assert_eq!(best.confidence, 95.0);
        assert_eq!(
            best.source,
            TextSource::FullFrame {
                mode: SegmentationMode::Auto,
                scale: 2.0
            }
        );
    }

    #[test]
    fn test_failed_configurations_are_skipped() {
        let rec = recognizer(|_, mode| match mode {
            SegmentationMode::Auto => Err(OcrError::Recognition("crashed".to_string())),
            _ => Ok(tokens(&[("PARKING", 70.0)])),
        });

        assert_eq!(rec.recognize_best(&blank(100, 40)).text, "PARKING");
    }

    #[test]
    fn test_all_failures_return_empty() {
        let rec = recognizer(|_, _| Err(OcrError::BackendUnavailable("gone".to_string())));

        let best = rec.recognize_best(&blank(100, 40));

        assert_eq!(best.text, "");
        assert_eq!(best.confidence, 0.0);
        assert_eq!(best.source, TextSource::Nothing);
    }

    fn sign_image() -> DynamicImage {
        let mut img = GrayImage::from_pixel(200, 100, Luma([255]));
        for (x0, x1) in [(20u32, 50u32), (120, 150)] {
            for y in 40..60 {
                for x in x0..x1 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_sparse_image_falls_back_to_regions() {
        let rec = recognizer(|image, _| {
            if image.width() >= 200 {
                Ok(vec![])
            } else {
                Ok(tokens(&[("EXIT", 88.0)]))
            }
        });

        let best = rec.recognize_best(&sign_image());

        assert_eq!(best.text, "EXIT EXIT");
        assert_eq!(best.source, TextSource::Regions { count: 2 });
    }

    #[test]
    fn test_region_text_must_be_longer() {
        let rec = recognizer(|image, _| {
            if image.width() >= 200 {
                Ok(tokens(&[("EXITS", 40.0)]))
            } else {
                Ok(tokens(&[("X", 90.0)]))
            }
        });

        let best = rec.recognize_best(&sign_image());

        assert_eq!(best.text, "EXITS");
        assert!(matches!(best.source, TextSource::FullFrame { .. }));
    }

    #[test]
    fn test_confidence_is_bounded() {
        let rec = recognizer(|_, _| Ok(tokens(&[("LOUD", 250.0), ("QUIET", -1.0)])));

        let best = rec.recognize_best(&blank(60, 30));

        assert!((0.0..=100.0).contains(&best.confidence));
    }

    /// Reports `SingleBlock` as a repeat of `Auto` and records every call
    struct MergedModesBackend {
        calls: std::sync::Mutex<Vec<SegmentationMode>>,
    }

    impl RecognitionBackend for MergedModesBackend {
        fn name(&self) -> &'static str {
            "merged-modes"
        }

        fn description(&self) -> &'static str {
            "test backend"
        }

        fn recognize_text(&self, _: &DynamicImage, _: SegmentationMode) -> Result<String, OcrError> {
            Ok("WELCOME".to_string())
        }

        fn recognize_with_confidences(
            &self,
            _: &DynamicImage,
            mode: SegmentationMode,
        ) -> Result<Vec<TokenConfidence>, OcrError> {
            self.calls.lock().unwrap().push(mode);
            Ok(tokens(&[("WELCOME", 90.0)]))
        }

        fn equivalent_mode(&self, mode: SegmentationMode) -> SegmentationMode {
            match mode {
                SegmentationMode::SingleBlock => SegmentationMode::Auto,
                other => other,
            }
        }

        fn supported_languages(&self) -> Vec<String> {
            vec!["eng".to_string()]
        }
    }

    #[test]
    fn test_equivalent_modes_run_once() {
        let backend = Arc::new(MergedModesBackend {
            calls: std::sync::Mutex::new(Vec::new()),
        });
        let rec = TextRecognizer::new(backend.clone()).with_settings(RecognitionSettings {
            modes: SegmentationMode::ALL.to_vec(),
            scales: vec![1.0],
        });

        let best = rec.recognize_best(&blank(200, 50));

        assert_eq!(best.text, "WELCOME");
        assert_eq!(
            *backend.calls.lock().unwrap(),
            vec![
                SegmentationMode::Auto,
                SegmentationMode::SparseText,
                SegmentationMode::RawLine
            ]
        );
    }

    #[test]
    fn test_equivalent_mode_alone_still_runs() {
        let backend = Arc::new(MergedModesBackend {
            calls: std::sync::Mutex::new(Vec::new()),
        });
        let rec = TextRecognizer::new(backend.clone()).with_settings(RecognitionSettings {
            modes: vec![SegmentationMode::SingleBlock],
            scales: vec![1.0],
        });

        rec.recognize_best(&blank(200, 50));

        assert_eq!(*backend.calls.lock().unwrap(), vec![SegmentationMode::SingleBlock]);
    }
}
