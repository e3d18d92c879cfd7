use crate::config::Config;
use crate::engines::{BackendInfo, BackendRegistry};
use crate::error::OcrError;
use crate::ocr::OcrProcessor;
use crate::orchestrator::{ModuleOutput, Orchestrator, QueryResult};
use crate::router::RoutingDecision;
use crate::text::Vocabulary;
use crate::vision::VisionService;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub backends: Arc<Vec<BackendInfo>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Initialize every backend, the vocabulary and the vision service once
    pub fn from_config(config: Config) -> Result<Self, OcrError> {
        let registry = BackendRegistry::new(&config)?;
        let backend = registry.default().ok_or_else(|| {
            OcrError::BackendUnavailable("No default recognition backend".to_string())
        })?;
        tracing::info!(
            "Using {} backend (available: {})",
            registry.default_name(),
            registry.list().join(", ")
        );

        let vocabulary = match &config.vocabulary {
            Some(path) => Vocabulary::load(path)?,
            None => Vocabulary::builtin(),
        };

        let text = OcrProcessor::from_config(&config, backend, Arc::new(vocabulary));
        let vision = VisionService::from_config(&config);

        Ok(Self {
            orchestrator: Arc::new(Orchestrator::new(text, Arc::new(vision))),
            backends: Arc::new(registry.info()),
            config: Arc::new(config),
        })
    }
}

#[derive(Serialize)]
pub struct QueryDetails {
    pub ocr_text: String,
    pub vqa_answer: String,
    pub vqa_question_used: String,
    pub text_output: ModuleOutput,
    pub vision_output: ModuleOutput,
}

/// Query response
#[derive(Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub answer: String,
    pub module: RoutingDecision,
    pub question: String,
    pub processing_time_ms: u64,
    pub details: QueryDetails,
}

impl QueryResponse {
    fn new(result: QueryResult, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            details: QueryDetails {
                ocr_text: result.text_output.render(RoutingDecision::TextModule),
                vqa_answer: result.vision_output.render(RoutingDecision::VisionModule),
                vqa_question_used: result.vision_question_used,
                text_output: result.text_output,
                vision_output: result.vision_output,
            },
            answer: result.answer,
            module: result.module,
            question: result.question,
            processing_time_ms,
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

/// Module availability response
#[derive(Serialize)]
pub struct ModuleStatusResponse {
    pub vqa_available: bool,
    pub ocr_available: bool,
    pub status: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub backend: String,
    pub backends: Vec<BackendInfo>,
    pub preset: String,
    pub scales: Vec<f32>,
    pub max_file_size_bytes: usize,
    pub language: String,
    pub vision_model: Option<String>,
}

/// Room for multipart headers, boundaries and the question field
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Request body limit that still lets a base64 image of `max_file_size`
/// bytes through, so oversized images reach the handler's size check
fn body_limit(max_file_size: usize) -> usize {
    max_file_size
        .saturating_add(2)
        .saturating_div(3)
        .saturating_mul(4)
        .saturating_add(MULTIPART_OVERHEAD)
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/query", post(handle_query))
        .route("/api/test", post(handle_test))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(body_limit(max_file_size)))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = tokio::task::spawn_blocking(move || AppState::from_config(config)).await??;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Image sent with a query
enum UploadedImage {
    File { data: Bytes, extension: String },
    Base64(String),
}

/// Handle question answering requests
async fn handle_query(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<QueryResponse>, OcrError> {
    let start = Instant::now();

    let mut question: Option<String> = None;
    let mut file: Option<UploadedImage> = None;
    let mut encoded: Option<UploadedImage> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OcrError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "question" => {
                question = Some(field.text().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Invalid question: {}", e))
                })?);
            }
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                if file_name.is_empty() {
                    return Err(OcrError::InvalidRequest("No file selected".to_string()));
                }
                let data = field.bytes().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?;
                file = Some(UploadedImage::File {
                    data,
                    extension: file_extension(&file_name),
                });
            }
            "image_base64" => {
                encoded = Some(UploadedImage::Base64(field.text().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Invalid image_base64: {}", e))
                })?));
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let question = question.unwrap_or_default();
    if question.trim().is_empty() {
        return Err(OcrError::Validation("No question provided".to_string()));
    }

    // An encoded image takes precedence over a file upload
    let image = encoded
        .or(file)
        .ok_or_else(|| OcrError::InvalidRequest("No image provided".to_string()))?;
    let (data, extension) = match image {
        UploadedImage::File { data, extension } => (data.to_vec(), extension),
        UploadedImage::Base64(text) => decode_base64_image(&text)?,
    };

    if data.len() > state.config.max_file_size {
        return Err(OcrError::ImageTooLarge {
            size: data.len(),
            max: state.config.max_file_size,
        });
    }

    let mut temp_file = tempfile::Builder::new()
        .prefix("upload_")
        .suffix(&extension)
        .tempfile()
        .map_err(|e| OcrError::Internal(format!("Failed to create temp file: {}", e)))?;
    temp_file
        .write_all(&data)
        .map_err(|e| OcrError::Internal(format!("Failed to write temp file: {}", e)))?;

    // The temp file moves into the task and is deleted when it is dropped there
    let orchestrator = Arc::clone(&state.orchestrator);
    let result = tokio::task::spawn_blocking(move || {
        let result = orchestrator.answer(temp_file.path(), &question);
        drop(temp_file);
        result
    })
    .await
    .map_err(|e| OcrError::Internal(format!("Query task failed: {}", e)))??;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Query answered by {} in {}ms",
        result.module.as_str(),
        processing_time_ms
    );

    Ok(Json(QueryResponse::new(result, processing_time_ms)))
}

/// Decode a base64 image, with or without a `data:` URL prefix
fn decode_base64_image(text: &str) -> Result<(Vec<u8>, String), OcrError> {
    let payload = match text.split_once(',') {
        Some((_, payload)) => payload,
        None => text,
    };
    let data = STANDARD
        .decode(payload.trim())
        .map_err(|e| OcrError::InvalidRequest(format!("Invalid base64 image: {}", e)))?;
    let format = image::guess_format(&data)
        .map_err(|e| OcrError::InvalidRequest(format!("Invalid base64 image: {}", e)))?;
    let extension = format
        .extensions_str()
        .first()
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    Ok((data, extension))
}

/// Lowercased extension of an uploaded file name, including the dot
fn file_extension(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Assistive VQA API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Report which modules can currently answer
async fn handle_test(State(state): State<AppState>) -> impl IntoResponse {
    let ocr_available = !state.backends.is_empty();
    let orchestrator = Arc::clone(&state.orchestrator);
    let vqa_available =
        tokio::task::spawn_blocking(move || orchestrator.vision_service().get().is_ok())
            .await
            .unwrap_or(false);

    Json(ModuleStatusResponse {
        vqa_available,
        ocr_available,
        status: if vqa_available && ocr_available {
            "ready".to_string()
        } else {
            "partial".to_string()
        },
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.orchestrator.text_module().backend_name().to_string(),
        backends: state.backends.as_ref().clone(),
        preset: state.config.preset.as_str().to_string(),
        scales: state.config.scales.clone(),
        max_file_size_bytes: state.config.max_file_size,
        language: state.config.language.clone(),
        vision_model: state
            .config
            .vision_endpoint
            .as_ref()
            .map(|_| state.config.vision_model.clone()),
    })
}
