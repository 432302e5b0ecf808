//! Ollama HTTP transport.
//!
//! Talks to a local Ollama server over its native API:
//! - `POST /api/chat` for single-turn, non-streaming completions
//! - `GET /api/tags` for model listing and health checks
//!
//! Returns the raw response JSON; shaping it into answer text is the
//! inference client's job.

use fieldrag_core::InferenceError;
use std::time::Duration;
use tracing::{debug, warn};

/// Default Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// A configured connection to one Ollama server and model.
#[derive(Debug, Clone)]
pub struct OllamaHttpTransport {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaHttpTransport {
    /// Create a transport for `model` at `base_url` with a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` as the only user message and return the response body.
    pub async fn chat(&self, prompt: &str) -> Result<serde_json::Value, InferenceError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });

        debug!(model = %self.model, url = %url, prompt_len = prompt.len(), "Sending Ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Ollama returned error");
            return Err(InferenceError::ApiError {
                status_code: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| InferenceError::MalformedResponse(format!("Failed to parse response: {e}")))
    }

    /// Names of the models the server has pulled.
    pub async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(map_reqwest_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::ApiError {
                status_code: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;
        Ok(model_names(&body))
    }

    /// Is the server answering `/api/tags`?
    pub async fn health_check(&self) -> Result<bool, InferenceError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(map_reqwest_err)?;
        Ok(response.status().is_success())
    }
}

/// Extract model names from a tags listing.
///
/// Accepts `{"models": [{"name": ...}]}` and the older `{"tags": ["..."]}`.
pub fn model_names(body: &serde_json::Value) -> Vec<String> {
    if let Some(models) = body["models"].as_array() {
        return models
            .iter()
            .filter_map(|m| m["name"].as_str().map(String::from))
            .collect();
    }
    body["tags"]
        .as_array()
        .map(|tags| tags.iter().filter_map(|t| t.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn map_reqwest_err(e: reqwest::Error) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Timeout(e.to_string())
    } else {
        InferenceError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_url_is_normalized() {
        let transport = OllamaHttpTransport::new("http://localhost:11434/", "qwen2:0.5b", Duration::from_secs(30)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:11434");
        assert_eq!(transport.model(), "qwen2:0.5b");
    }

    #[test]
    fn model_names_from_models_list() {
        let body = json!({"models": [{"name": "qwen2:0.5b"}, {"name": "llama3:8b"}, {"size": 1}]});
        assert_eq!(model_names(&body), vec!["qwen2:0.5b", "llama3:8b"]);
    }

    #[test]
    fn model_names_from_tags_list() {
        let body = json!({"tags": ["qwen2:0.5b", 3]});
        assert_eq!(model_names(&body), vec!["qwen2:0.5b"]);
        assert!(model_names(&json!({})).is_empty());
    }
}
