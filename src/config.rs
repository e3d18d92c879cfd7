use crate::preprocessing::Preset;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "assistive-vqa-server")]
#[command(about = "Answers questions about images using OCR and a vision model")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "VQA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "VQA_PORT", default_value = "5001")]
    pub port: u16,

    /// Recognition language (e.g., "eng")
    #[arg(long, env = "VQA_LANGUAGE", default_value = "eng")]
    pub language: String,

    /// Maximum upload size in bytes (default: 16MB)
    #[arg(long, env = "VQA_MAX_FILE_SIZE", default_value = "16777216")]
    pub max_file_size: usize,

    /// Path to tessdata directory (downloaded into the cache dir if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// Recognition backend to use (defaults to the first compiled-in backend)
    #[arg(long, env = "VQA_BACKEND")]
    pub backend: Option<String>,

    /// Preprocessing preset (minimal, default, binarize)
    #[arg(long, env = "VQA_PREPROCESS_PRESET", default_value = "default", value_parser = parse_preset)]
    pub preset: Preset,

    /// Images narrower than 70% of this width are upscaled to it
    #[arg(long, env = "VQA_TARGET_WIDTH", default_value = "800")]
    pub target_width: u32,

    /// Scale factors tried for every segmentation mode
    #[arg(long, env = "VQA_SCALES", value_delimiter = ',', default_value = "1.0,1.5,2.0")]
    pub scales: Vec<f32>,

    /// Correction vocabulary, one word per line (built-in list if not set)
    #[arg(long, env = "VQA_VOCABULARY")]
    pub vocabulary: Option<PathBuf>,

    /// OpenAI-compatible endpoint of the vision model
    #[arg(long, env = "VQA_VISION_ENDPOINT")]
    pub vision_endpoint: Option<String>,

    /// Model name sent to the vision endpoint
    #[arg(long, env = "VQA_VISION_MODEL", default_value = "llava")]
    pub vision_model: String,

    /// Vision request timeout in seconds
    #[arg(long, env = "VQA_VISION_TIMEOUT_SECS", default_value = "120")]
    pub vision_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

fn parse_preset(s: &str) -> Result<Preset, String> {
    Preset::from_str(s).ok_or_else(|| format!("unknown preset '{}'", s))
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub language: String,
    pub max_file_size: usize,
    pub tessdata_path: Option<String>,
    pub backend: Option<String>,
    pub preset: Preset,
    pub target_width: u32,
    pub scales: Vec<f32>,
    pub vocabulary: Option<PathBuf>,
    pub vision_endpoint: Option<String>,
    pub vision_model: String,
    pub vision_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            language: "eng".to_string(),
            max_file_size: 16 * 1024 * 1024,
            tessdata_path: None,
            backend: None,
            preset: Preset::Default,
            target_width: 800,
            scales: vec![1.0, 1.5, 2.0],
            vocabulary: None,
            vision_endpoint: None,
            vision_model: "llava".to_string(),
            vision_timeout_secs: 120,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            language: args.language,
            max_file_size: args.max_file_size,
            tessdata_path: args.tessdata_path,
            backend: args.backend,
            preset: args.preset,
            target_width: args.target_width,
            scales: sanitize_scales(args.scales),
            vocabulary: args.vocabulary,
            vision_endpoint: args.vision_endpoint,
            vision_model: args.vision_model,
            vision_timeout_secs: args.vision_timeout_secs,
        }
    }
}

/// Drop non-positive scale factors; an empty list means native resolution only.
fn sanitize_scales(scales: Vec<f32>) -> Vec<f32> {
    let mut kept = Vec::with_capacity(scales.len());
    for scale in scales {
        if scale.is_finite() && scale > 0.0 {
            kept.push(scale);
        } else {
            tracing::warn!("Ignoring invalid scale factor {}", scale);
        }
    }
    if kept.is_empty() {
        kept.push(1.0);
    }
    kept
}
