//! Model and training data cache shared by the backends

use crate::error::OcrError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "assistive-vqa";

/// Cache directory for downloaded assets, created on demand
pub fn cache_dir(subdir: Option<&str>) -> Result<PathBuf, OcrError> {
    let mut dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME);
    if let Some(subdir) = subdir {
        dir = dir.join(subdir);
    }

    std::fs::create_dir_all(&dir).map_err(|e| {
        OcrError::Initialization(format!(
            "Failed to create cache directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    Ok(dir)
}

/// Path of `filename` inside `dir`, downloading it from `url` first if missing
pub fn ensure_downloaded(url: &str, dir: &Path, filename: &str) -> Result<PathBuf, OcrError> {
    let path = dir.join(filename);

    if path.exists() {
        tracing::info!("Using cached {} from {:?}", filename, path);
        return Ok(path);
    }

    tracing::info!("Downloading {} (this may take a moment)...", filename);
    download_file(url, &path)?;
    tracing::info!("Downloaded {} to {:?}", filename, path);
    Ok(path)
}

/// Download to a sibling temp file and rename, so an interrupted download
/// never leaves a truncated file at `path`
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url).call().map_err(|e| {
        OcrError::Initialization(format!("Failed to download {}: {}", url, e))
    })?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OcrError::Initialization(format!("Failed to read response body: {}", e))
    })?;

    let partial = path.with_extension("part");
    let mut file = File::create(&partial).map_err(|e| {
        OcrError::Initialization(format!("Failed to create {}: {}", partial.display(), e))
    })?;
    file.write_all(&buffer).map_err(|e| {
        OcrError::Initialization(format!("Failed to write {}: {}", partial.display(), e))
    })?;

    std::fs::rename(&partial, path).map_err(|e| {
        OcrError::Initialization(format!("Failed to move {} into place: {}", path.display(), e))
    })
}
