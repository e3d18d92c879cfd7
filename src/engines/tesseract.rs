//! Tesseract backend implementation
//!
//! Better for noisy images like phone photos, and the only backend with
//! real per-word confidences. Uses tesseract-static for static linking
//! (no system dependencies). Downloads tessdata on first use unless a
//! tessdata directory is configured.

use crate::config::Config;
use crate::engine::{
    RecognitionAttempt, RecognitionBackend, RecognitionConfig, SegmentationMode, TokenConfidence,
    NO_DETECTION,
};
use crate::engines::cache;
use crate::error::OcrError;
use image::DynamicImage;
use tesseract_static::tesseract::Tesseract;

/// Column positions in Tesseract's TSV output
const TSV_COLUMNS: usize = 12;
const TSV_CONF: usize = 10;
const TSV_TEXT: usize = 11;

/// Tesseract recognition backend
pub struct TesseractBackend {
    tessdata_path: String,
    language: String,
}

impl TesseractBackend {
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let language = config.language.clone();

        let tessdata_path = match &config.tessdata_path {
            Some(path) => path.clone(),
            None => ensure_tessdata_available(&language)?,
        };

        // Fail at startup rather than on the first request
        let probe = Tesseract::new(Some(&tessdata_path), Some(&language)).map_err(|e| {
            OcrError::Initialization(format!("Failed to initialize Tesseract: {}", e))
        })?;
        drop(probe);

        tracing::info!(
            "Tesseract backend initialized (tessdata: {}, language: {})",
            tessdata_path,
            language
        );

        Ok(Self {
            tessdata_path,
            language,
        })
    }

    /// Run one recognition pass and return (text, tsv)
    fn run(
        &self,
        image: &DynamicImage,
        mode: SegmentationMode,
    ) -> Result<(String, String), OcrError> {
        let rgb_img = image.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        // BMP is always supported by leptonica
        let mut bmp_data = Vec::new();
        rgb_img
            .write_to(&mut std::io::Cursor::new(&mut bmp_data), image::ImageFormat::Bmp)
            .map_err(|e| OcrError::Recognition(format!("Failed to convert to BMP: {}", e)))?;

        tracing::debug!(
            "Tesseract pass: {}x{}, psm {}, BMP size: {} bytes",
            width,
            height,
            mode.psm(),
            bmp_data.len()
        );

        let tess = Tesseract::new(Some(&self.tessdata_path), Some(&self.language))
            .map_err(|e| OcrError::BackendUnavailable(format!("Failed to create Tesseract: {}", e)))?;

        let tess = tess
            .set_variable("tessedit_pageseg_mode", &mode.psm().to_string())
            .map_err(|e| OcrError::Recognition(format!("Failed to set segmentation mode: {}", e)))?;

        let tess = tess.set_image_from_mem(&bmp_data).map_err(|e| {
            OcrError::Recognition(format!(
                "Failed to set image ({}x{}, {} bytes): {}",
                width,
                height,
                bmp_data.len(),
                e
            ))
        })?;

        let mut tess = tess
            .recognize()
            .map_err(|e| OcrError::Recognition(format!("Failed to recognize text: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| OcrError::Recognition(format!("Failed to get text: {}", e)))?;
        let tsv = tess
            .get_tsv_text(0)
            .map_err(|e| OcrError::Recognition(format!("Failed to get word data: {}", e)))?;

        Ok((text, tsv))
    }
}

/// Word tokens from Tesseract TSV output.
///
/// Rows that are not words carry a confidence of -1 and are kept as
/// no-detection tokens; the attempt drops them.
fn parse_tsv(tsv: &str) -> Vec<TokenConfidence> {
    tsv.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.splitn(TSV_COLUMNS, '\t').collect();
            if fields.len() < TSV_COLUMNS {
                return None;
            }
            // Header row
            let confidence: f32 = fields[TSV_CONF].trim().parse().ok()?;
            let confidence = if confidence < 0.0 {
                NO_DETECTION
            } else {
                confidence
            };
            Some(TokenConfidence::new(fields[TSV_TEXT].trim(), confidence))
        })
        .collect()
}

impl RecognitionBackend for TesseractBackend {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR engine - better for noisy/messy images like phone photos"
    }

    fn recognize_text(
        &self,
        image: &DynamicImage,
        mode: SegmentationMode,
    ) -> Result<String, OcrError> {
        let (text, _) = self.run(image, mode)?;
        Ok(text.trim().to_string())
    }

    fn recognize_with_confidences(
        &self,
        image: &DynamicImage,
        mode: SegmentationMode,
    ) -> Result<Vec<TokenConfidence>, OcrError> {
        let (_, tsv) = self.run(image, mode)?;
        Ok(parse_tsv(&tsv))
    }

    fn recognize(
        &self,
        image: &DynamicImage,
        config: RecognitionConfig,
    ) -> Result<RecognitionAttempt, OcrError> {
        let (text, tsv) = self.run(image, config.mode)?;
        Ok(RecognitionAttempt::new(config, text.trim(), parse_tsv(&tsv)))
    }

    /// Only the language the engine was initialized with
    fn supported_languages(&self) -> Vec<String> {
        vec![self.language.clone()]
    }
}

/// Tessdata directory in the cache, downloading the language if needed
fn ensure_tessdata_available(language: &str) -> Result<String, OcrError> {
    let dir = cache::cache_dir(Some("tessdata"))?;
    cache::ensure_downloaded(
        &tessdata_url(language),
        &dir,
        &format!("{}.traineddata", language),
    )?;

    // Tesseract expects the directory, not the file
    dir.to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| OcrError::Initialization("Invalid tessdata path".to_string()))
}

/// tessdata_fast keeps downloads small
fn tessdata_url(language: &str) -> String {
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}
