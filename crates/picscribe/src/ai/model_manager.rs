//! Making sure the vision model is present on the Ollama server.

use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that keep the model from serving requests. All of them are fatal
/// at startup.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Ollama at {url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Failed to pull model '{model}': {reason}")]
    PullFailed { model: String, reason: String },

    #[error("Unexpected response from Ollama: {0}")]
    InvalidResponse(String),
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<LocalModel>,
}

#[derive(Deserialize)]
struct LocalModel {
    name: String,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Bound on listing local models. Pulls are not bounded by default.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client without a total timeout. Every request sets its own bound
/// where it needs one; a pull of a multi-gigabyte model must not be cut off.
pub fn http_client() -> Result<Client, ModelError> {
    Client::builder()
        .timeout(None::<Duration>)
        .build()
        .map_err(|e| ModelError::Client(e.to_string()))
}

/// Lists and pulls models on an Ollama server.
pub struct ModelManager {
    client: Client,
    base_url: String,
    list_timeout: Duration,
    pull_timeout: Option<Duration>,
}

impl ModelManager {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            list_timeout: LIST_TIMEOUT,
            pull_timeout: None,
        }
    }

    pub fn with_timeouts(mut self, list: Duration, pull: Option<Duration>) -> Self {
        self.list_timeout = list;
        self.pull_timeout = pull;
        self
    }

    /// Names of the models already available locally.
    pub fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.list_timeout)
            .send()
            .map_err(|e| ModelError::Unreachable {
                url: self.base_url.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ModelError::InvalidResponse(format!(
                "GET /api/tags returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Checks if `model` is already available.
    pub fn is_model_available(&self, model: &str) -> Result<bool, ModelError> {
        let local = self.list_models()?;
        Ok(local.iter().any(|name| same_model(name, model)))
    }

    /// Pulls `model` unless it is already present. Blocks until the pull
    /// finishes.
    pub fn ensure_model(&self, model: &str) -> Result<(), ModelError> {
        if self.is_model_available(model)? {
            debug!("Model {} already available", model);
            return Ok(());
        }

        info!("Pulling model {} (this can take a while)...", model);

        let mut request = self
            .client
            .post(format!("{}/api/pull", self.base_url))
            .json(&PullRequest {
                model,
                stream: false,
            });
        if let Some(timeout) = self.pull_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .map_err(|e| ModelError::PullFailed {
                model: model.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body: PullResponse = response.json().map_err(|e| ModelError::PullFailed {
            model: model.to_string(),
            reason: format!("HTTP {}: {}", status, e),
        })?;

        if let Some(error) = body.error {
            return Err(ModelError::PullFailed {
                model: model.to_string(),
                reason: error,
            });
        }
        if !status.is_success() || body.status != "success" {
            return Err(ModelError::PullFailed {
                model: model.to_string(),
                reason: format!("HTTP {}, status '{}'", status, body.status),
            });
        }

        info!("Model {} pulled", model);
        Ok(())
    }
}

/// Ollama reports untagged models as `<name>:latest`.
fn same_model(local: &str, requested: &str) -> bool {
    if local == requested {
        return true;
    }
    !requested.contains(':') && local.strip_suffix(":latest") == Some(requested)
}
