use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Recognition failed: {0}")]
    Recognition(String),

    #[error("Failed to process image: {0}")]
    Processing(String),

    #[error("Failed to initialize: {0}")]
    Initialization(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fieldless discriminant of [`OcrError`], carried by structured module outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ImageLoad,
    BackendUnavailable,
    Validation,
    Recognition,
    Processing,
    Internal,
}

impl OcrError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OcrError::ImageLoad(_) => ErrorKind::ImageLoad,
            OcrError::BackendUnavailable(_) | OcrError::Initialization(_) => {
                ErrorKind::BackendUnavailable
            }
            OcrError::Validation(_)
            | OcrError::ImageTooLarge { .. }
            | OcrError::InvalidRequest(_) => ErrorKind::Validation,
            OcrError::Recognition(_) => ErrorKind::Recognition,
            OcrError::Processing(_) => ErrorKind::Processing,
            OcrError::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            OcrError::ImageLoad(_) => (StatusCode::BAD_REQUEST, "IMAGE_LOAD_ERROR"),
            OcrError::BackendUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "BACKEND_UNAVAILABLE")
            }
            OcrError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            OcrError::Recognition(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RECOGNITION_ERROR"),
            OcrError::Processing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESSING_ERROR"),
            OcrError::Initialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INIT_ERROR"),
            OcrError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            OcrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OcrError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_counts_as_unavailable() {
        let err = OcrError::Initialization("no tessdata".to_string());
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response = OcrError::Validation("empty question".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_too_large_maps_to_payload_status() {
        let response = OcrError::ImageTooLarge { size: 10, max: 5 }.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
