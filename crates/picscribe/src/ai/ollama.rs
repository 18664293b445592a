use std::path::Path;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::ai::model_manager::{http_client, ModelError, ModelManager};
use crate::error::ProcessError;
use crate::processor::DescriptionModel;

/// Vision model served by Ollama's `/api/chat`.
pub struct OllamaDescriber {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaDescriber {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, ModelError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into(),
            model: model.into(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: serde_json::Value,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<String>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Shape the model is constrained to answer in.
#[derive(Deserialize)]
struct Answer {
    description: String,
}

fn answer_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "description": { "type": "string" }
        },
        "required": ["description"]
    })
}

/// Pulls the `description` field out of the model's JSON answer.
pub fn parse_answer(content: &str) -> Result<String, ProcessError> {
    let answer: Answer = serde_json::from_str(content.trim())
        .map_err(|e| ProcessError::ModelResponse(format!("{}: {}", e, content)))?;

    let description = answer.description.trim();
    if description.is_empty() {
        return Err(ProcessError::ModelResponse(
            "empty description".to_string(),
        ));
    }
    Ok(description.to_string())
}

impl DescriptionModel for OllamaDescriber {
    fn ensure_ready(&self) -> Result<(), ModelError> {
        ModelManager::new(self.client.clone(), self.base_url.clone()).ensure_model(&self.model)
    }

    fn describe(&self, image: &Path, prompt: &str, timeout: Duration) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("ollama.describe", model = %self.model).entered();
        let start = Instant::now();

        let bytes = std::fs::read(image).map_err(|e| ProcessError::ReadImage {
            path: image.to_path_buf(),
            source: e,
        })?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
                images: vec![STANDARD.encode(&bytes)],
            }],
            stream: false,
            format: answer_schema(),
            options: ChatOptions { temperature: 0.0 },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(timeout)
            .json(&body)
            .send()
            .map_err(|e| request_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().unwrap_or_default();
            return Err(ProcessError::ModelRequest(format!(
                "Ollama returned {}: {}",
                status, error_body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .map_err(|e| request_error(e, timeout))?;

        debug!(latency_ms = start.elapsed().as_millis() as u64, "model answered");
        parse_answer(&chat.message.content)
    }
}

fn request_error(error: reqwest::Error, timeout: Duration) -> ProcessError {
    if error.is_timeout() {
        ProcessError::Timeout(timeout)
    } else if error.is_decode() {
        ProcessError::ModelResponse(error.to_string())
    } else {
        ProcessError::ModelRequest(error.to_string())
    }
}
