//! Recognition backend implementations
//!
//! This module contains implementations of the RecognitionBackend trait for
//! different OCR libraries. Backends are conditionally compiled based on
//! feature flags.

pub mod cache;

#[cfg(feature = "backend-ocrs")]
pub mod ocrs;

#[cfg(feature = "backend-tesseract")]
pub mod tesseract;

use crate::config::Config;
use crate::engine::RecognitionBackend;
use crate::error::OcrError;
use serde::Serialize;
use std::sync::Arc;

/// Information about an available backend
#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub supported_languages: Vec<String>,
}

/// Registry of available recognition backends
pub struct BackendRegistry {
    backends: Vec<Arc<dyn RecognitionBackend>>,
    default_backend: String,
}

impl BackendRegistry {
    /// Create a registry with every compiled-in backend initialized
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        #[allow(unused_mut)]
        let mut backends: Vec<Arc<dyn RecognitionBackend>> = Vec::new();

        #[cfg(feature = "backend-ocrs")]
        {
            tracing::info!("Initializing ocrs backend...");
            backends.push(Arc::new(ocrs::OcrsBackend::new()?));
        }

        #[cfg(feature = "backend-tesseract")]
        {
            tracing::info!("Initializing tesseract backend...");
            backends.push(Arc::new(tesseract::TesseractBackend::new(config)?));
        }

        Self::from_backends(backends, config.backend.as_deref())
    }

    /// Build from already constructed backends. `preferred` names the
    /// default; without it the first backend is the default.
    pub fn from_backends(
        backends: Vec<Arc<dyn RecognitionBackend>>,
        preferred: Option<&str>,
    ) -> Result<Self, OcrError> {
        let Some(first) = backends.first() else {
            return Err(OcrError::BackendUnavailable(
                "No recognition backends available. Build with --features backend-ocrs or --features backend-tesseract".to_string(),
            ));
        };

        let default_backend = match preferred {
            Some(name) if backends.iter().any(|b| b.name() == name) => name.to_string(),
            Some(name) => {
                return Err(OcrError::BackendUnavailable(format!(
                    "Unknown backend '{}'. Available: {}",
                    name,
                    backends.iter().map(|b| b.name()).collect::<Vec<_>>().join(", ")
                )))
            }
            None => first.name().to_string(),
        };

        Ok(Self {
            backends,
            default_backend,
        })
    }

    /// Get a backend by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn RecognitionBackend>> {
        self.backends.iter().find(|b| b.name() == name).cloned()
    }

    /// Get the default backend
    pub fn default(&self) -> Option<Arc<dyn RecognitionBackend>> {
        self.get(&self.default_backend)
    }

    pub fn default_name(&self) -> &str {
        &self.default_backend
    }

    /// List all available backend names
    pub fn list(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn info(&self) -> Vec<BackendInfo> {
        self.backends
            .iter()
            .map(|b| BackendInfo {
                name: b.name(),
                description: b.description(),
                supported_languages: b.supported_languages(),
            })
            .collect()
    }
}
