use crate::error::OcrError;
use image::DynamicImage;
use serde::Serialize;
use std::time::Instant;

use super::steps;

/// Default width that narrow images are upscaled to
pub const DEFAULT_TARGET_WIDTH: u32 = 800;

/// Preprocessing preset names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Grayscale conversion only
    Minimal,
    /// Gentle processing that keeps glyph shapes intact
    /// Steps: grayscale, upscale, denoise, clahe
    #[default]
    Default,
    /// Default steps followed by adaptive binarization
    /// Steps: grayscale, upscale, denoise, clahe, threshold, morphology
    Binarize,
}

impl Preset {
    /// Parse from a configuration string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "minimal" => Some(Self::Minimal),
            "default" => Some(Self::Default),
            "binarize" => Some(Self::Binarize),
            _ => None,
        }
    }

    /// Get the preset name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Default => "default",
            Self::Binarize => "binarize",
        }
    }
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Preprocessed image (not serialized)
    #[serde(skip)]
    pub image: DynamicImage,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Preset used
    pub preset: String,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
    /// Set when a step failed and the grayscale copy was returned instead
    pub degraded: bool,
}

/// Preprocessing pipeline that applies steps based on preset
#[derive(Debug, Clone)]
pub struct Pipeline {
    preset: Preset,
    target_width: u32,
}

impl Pipeline {
    pub fn new(preset: Preset) -> Self {
        Self {
            preset,
            target_width: DEFAULT_TARGET_WIDTH,
        }
    }

    pub fn with_target_width(mut self, target_width: u32) -> Self {
        self.target_width = target_width.max(1);
        self
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    /// Process an image according to the configured preset.
    ///
    /// The caller's image is left untouched. If any step after grayscale
    /// conversion fails, the grayscale copy is returned with `degraded` set.
    pub fn process(&self, image: &DynamicImage) -> PreprocessingResult {
        let start = Instant::now();
        let mut steps_timing = Vec::new();

        let step_start = Instant::now();
        let gray = steps::grayscale::apply(image);
        steps_timing.push(StepTiming {
            name: "grayscale".to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });

        let (image, degraded) = match self.run_steps(gray.clone(), &mut steps_timing) {
            Ok(img) => (img, false),
            Err(e) => {
                tracing::warn!("Preprocessing failed, using grayscale image: {}", e);
                (gray, true)
            }
        };

        PreprocessingResult {
            image,
            total_time_ms: start.elapsed().as_millis() as u64,
            preset: self.preset.as_str().to_string(),
            steps: steps_timing,
            degraded,
        }
    }

    fn run_steps(
        &self,
        mut img: DynamicImage,
        timings: &mut Vec<StepTiming>,
    ) -> Result<DynamicImage, OcrError> {
        if self.preset == Preset::Minimal {
            return Ok(img);
        }

        let target_width = self.target_width;
        img = self.run_step("upscale", img, timings, |img| {
            steps::resize::apply(img, target_width)
        })?;
        img = self.run_step("denoise", img, timings, steps::denoise::apply)?;
        img = self.run_step("clahe", img, timings, steps::clahe::apply)?;

        if self.preset == Preset::Binarize {
            img = self.run_step("threshold", img, timings, steps::threshold::apply)?;
            img = self.run_step("morphology", img, timings, steps::morphology::apply)?;
        }

        Ok(img)
    }

    fn run_step<F>(
        &self,
        name: &str,
        img: DynamicImage,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> Result<DynamicImage, OcrError>
    where
        F: FnOnce(DynamicImage) -> Result<DynamicImage, OcrError>,
    {
        let step_start = Instant::now();
        let result = step_fn(img)?;
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        Ok(result)
    }
}
