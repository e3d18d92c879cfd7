//! Vision model client for an OpenAI-compatible chat completions API

use super::{validate_request, VisionModel};
use crate::error::OcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use std::time::{Duration, Instant};

const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.2;

// --- OpenAI-compatible serde structs ---

#[derive(serde::Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(serde::Serialize)]
struct ChatMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Vision model served over HTTP
pub struct VlmVisionModel {
    agent: ureq::Agent,
    endpoint: String,
    model_name: String,
}

impl VlmVisionModel {
    pub fn new(endpoint: &str, model_name: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        let endpoint = endpoint.trim_end_matches('/').to_string();
        tracing::info!(
            "Vision client configured: endpoint={}, model={}",
            endpoint,
            model_name
        );

        Self {
            agent,
            endpoint,
            model_name: model_name.to_string(),
        }
    }

    fn build_request(&self, question: &str, data_url: &str) -> ChatRequest {
        ChatRequest {
            model: self.model_name.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: serde_json::json!([
                    {"type": "text", "text": question},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]),
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

/// `data:` URL for encoded image bytes, typed from their magic bytes
fn data_url(bytes: &[u8]) -> Result<String, OcrError> {
    let format = image::guess_format(bytes)
        .map_err(|e| OcrError::ImageLoad(format!("Unrecognized image format: {}", e)))?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    ))
}

fn parse_response(body: &[u8]) -> Result<String, OcrError> {
    let response: ChatResponse = serde_json::from_slice(body)
        .map_err(|e| OcrError::Processing(format!("Malformed vision response: {}", e)))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .ok_or_else(|| OcrError::Processing("Vision model returned no choices".to_string()))
}

impl VisionModel for VlmVisionModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn answer(&self, image_path: &Path, question: &str) -> Result<String, OcrError> {
        validate_request(image_path, question)?;
        let start = Instant::now();

        let bytes = std::fs::read(image_path).map_err(|e| {
            OcrError::ImageLoad(format!("Failed to read {}: {}", image_path.display(), e))
        })?;
        let request = self.build_request(question, &data_url(&bytes)?);
        let payload = serde_json::to_string(&request)
            .map_err(|e| OcrError::Internal(format!("Failed to encode request: {}", e)))?;

        let response = self
            .agent
            .post(&format!("{}/v1/chat/completions", self.endpoint))
            .header("Content-Type", "application/json")
            .send(payload.as_str())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => {
                    OcrError::Processing(format!("Vision endpoint returned HTTP {}", status))
                }
                other => OcrError::BackendUnavailable(format!(
                    "Vision endpoint unreachable: {}",
                    other
                )),
            })?;

        let body = response
            .into_body()
            .read_to_vec()
            .map_err(|e| OcrError::Processing(format!("Failed to read vision response: {}", e)))?;
        let answer = parse_response(&body)?;

        tracing::debug!(
            "Vision answer in {}ms ({} chars)",
            start.elapsed().as_millis(),
            answer.chars().count()
        );
        Ok(answer)
    }
}
