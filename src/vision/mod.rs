//! Visual question answering capability
//!
//! The model itself lives behind an OpenAI-compatible endpoint. The
//! service hands out one shared client, created on first use.

pub mod vlm;

pub use vlm::VlmVisionModel;

use crate::config::Config;
use crate::error::OcrError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers free-form questions about an image
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;

    /// Missing images are `ImageLoad` errors, blank questions `Validation` errors
    fn answer(&self, image_path: &Path, question: &str) -> Result<String, OcrError>;
}

/// Checks shared by every model before any inference is attempted
pub fn validate_request(image_path: &Path, question: &str) -> Result<(), OcrError> {
    if question.trim().is_empty() {
        return Err(OcrError::Validation("Question must not be empty".to_string()));
    }
    if !image_path.is_file() {
        return Err(OcrError::ImageLoad(format!(
            "Image not found: {}",
            image_path.display()
        )));
    }
    Ok(())
}

type Loader = Box<dyn Fn() -> Result<Arc<dyn VisionModel>, OcrError> + Send + Sync>;

/// Process-wide holder of the vision model.
///
/// The first successful `get` stores the model; later calls return the same
/// instance. The lock is held while loading, so racing first calls load once.
/// A failed load is not stored and is retried on the next call.
pub struct VisionService {
    loader: Loader,
    model: Mutex<Option<Arc<dyn VisionModel>>>,
}

impl VisionService {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn VisionModel>, OcrError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            model: Mutex::new(None),
        }
    }

    /// Service backed by the configured endpoint; without one every load
    /// fails with `BackendUnavailable`
    pub fn from_config(config: &Config) -> Self {
        let Some(endpoint) = config.vision_endpoint.clone() else {
            return Self::new(|| {
                Err(OcrError::BackendUnavailable(
                    "No vision endpoint configured".to_string(),
                ))
            });
        };

        let model_name = config.vision_model.clone();
        let timeout = Duration::from_secs(config.vision_timeout_secs);
        Self::new(move || {
            let model = VlmVisionModel::new(&endpoint, &model_name, timeout);
            Ok(Arc::new(model) as Arc<dyn VisionModel>)
        })
    }

    /// The loaded model, loading it on first use
    pub fn get(&self) -> Result<Arc<dyn VisionModel>, OcrError> {
        let mut slot = self
            .model
            .lock()
            .map_err(|_| OcrError::Internal("Vision model lock poisoned".to_string()))?;

        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        let model = (self.loader)()?;
        tracing::info!("Vision model '{}' loaded", model.name());
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    pub fn answer(&self, image_path: &Path, question: &str) -> Result<String, OcrError> {
        self.get()?.answer(image_path, question)
    }
}
