//! Inference client: one prompt in, one answer string out.
//!
//! The transport is fixed when the client is built. `try_infer` surfaces
//! typed errors; `infer` never fails and instead returns an answer string
//! carrying an error prefix the caller can detect with [`is_error_answer`].

use crate::ollama::OllamaHttpTransport;
use fieldrag_config::{AppConfig, TransportKind};
use fieldrag_core::provider::{Provider, ProviderRequest};
use fieldrag_core::InferenceError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Prefix of answers produced when the in-process model fails.
pub const SDK_ERROR_PREFIX: &str = "❌ Local model error:";

/// Prefix of answers produced when the Ollama HTTP call fails.
pub const HTTP_ERROR_PREFIX: &str = "❌ Ollama HTTP call failed:";

/// Longest raw JSON excerpt returned when an HTTP body has no recognisable text.
const RAW_EXCERPT_CHARS: usize = 1000;

/// How the client reaches the model.
#[derive(Clone)]
pub enum Transport {
    /// In-process provider
    Sdk(Arc<dyn Provider>),
    /// Ollama HTTP API
    Http(OllamaHttpTransport),
}

impl Transport {
    pub fn name(&self) -> &'static str {
        match self {
            Transport::Sdk(_) => "sdk",
            Transport::Http(_) => "http",
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Sdk(provider) => f.debug_tuple("Sdk").field(&provider.name()).finish(),
            Transport::Http(http) => f.debug_tuple("Http").field(&http.base_url()).finish(),
        }
    }
}

/// Sends composed prompts to the configured model.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    transport: Transport,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl InferenceClient {
    pub fn new(transport: Transport, model: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Sampling settings for the SDK transport.
    pub fn with_sampling(mut self, temperature: f32, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Build the client the configuration asks for.
    ///
    /// `auto` picks the in-process model when this binary has the `local`
    /// feature, the Ollama HTTP API otherwise.
    pub fn from_config(config: &AppConfig) -> Result<Self, InferenceError> {
        let wants_sdk = match config.inference.transport {
            TransportKind::Sdk => true,
            TransportKind::Http => false,
            TransportKind::Auto => cfg!(feature = "local"),
        };

        let transport = if wants_sdk {
            Transport::Sdk(sdk_provider(&config.model)?)
        } else {
            Transport::Http(OllamaHttpTransport::new(
                &config.inference.base_url,
                &config.model,
                Duration::from_secs(config.inference.timeout_secs),
            )?)
        };

        info!(
            transport = transport.name(),
            model = %config.model,
            "Inference client ready"
        );

        Ok(Self::new(transport, &config.model)
            .with_sampling(config.inference.temperature, Some(config.inference.max_tokens)))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run `prompt` and return the normalized answer text.
    pub async fn try_infer(&self, prompt: &str) -> Result<String, InferenceError> {
        debug!(transport = self.transport.name(), prompt_len = prompt.len(), "Running inference");

        match &self.transport {
            Transport::Sdk(provider) => {
                let mut request = ProviderRequest::single_turn(&self.model, prompt);
                request.temperature = self.temperature;
                request.max_tokens = self.max_tokens;

                let response = provider.complete(request).await?;
                let value = serde_json::to_value(&response)
                    .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;
                Ok(normalize_sdk_response(&value))
            }
            Transport::Http(http) => {
                let value = http.chat(prompt).await?;
                Ok(normalize_http_response(&value))
            }
        }
    }

    /// Like [`try_infer`](Self::try_infer), but failures become an
    /// error-prefixed answer instead of an `Err`.
    pub async fn infer(&self, prompt: &str) -> String {
        match self.try_infer(prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(transport = self.transport.name(), error = %e, "Inference failed");
                let prefix = match self.transport {
                    Transport::Sdk(_) => SDK_ERROR_PREFIX,
                    Transport::Http(_) => HTTP_ERROR_PREFIX,
                };
                format!("{prefix} {e}")
            }
        }
    }

    /// Models available to the transport.
    pub async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        match &self.transport {
            Transport::Sdk(provider) => provider.list_models().await,
            Transport::Http(http) => http.list_models().await,
        }
    }

    /// Whether the backend can serve requests.
    pub async fn health_check(&self) -> Result<bool, InferenceError> {
        match &self.transport {
            Transport::Sdk(provider) => provider.health_check().await,
            Transport::Http(http) => http.health_check().await,
        }
    }
}

#[cfg(feature = "local")]
fn sdk_provider(model: &str) -> Result<Arc<dyn Provider>, InferenceError> {
    use crate::local::LocalProvider;

    if !LocalProvider::is_known_model(model) {
        return Err(InferenceError::ModelNotFound(format!(
            "'{model}' is neither a local preset (qwen2:0.5b, qwen2:1.5b) nor a .gguf file"
        )));
    }
    Ok(Arc::new(LocalProvider::new(model)))
}

#[cfg(not(feature = "local"))]
fn sdk_provider(_model: &str) -> Result<Arc<dyn Provider>, InferenceError> {
    Err(InferenceError::NotConfigured(
        "the in-process model needs a build with the `local` feature; set inference.transport = \"http\"".into(),
    ))
}

/// Whether `answer` is an error-bearing answer produced by [`InferenceClient::infer`].
pub fn is_error_answer(answer: &str) -> bool {
    answer.starts_with(SDK_ERROR_PREFIX) || answer.starts_with(HTTP_ERROR_PREFIX)
}

/// Answer text from a serialized SDK response.
///
/// An object `message` yields its `content` (trimmed, empty when absent);
/// anything else yields the whole JSON text.
pub fn normalize_sdk_response(value: &serde_json::Value) -> String {
    match value.get("message") {
        Some(serde_json::Value::Object(message)) => content_of(message),
        _ => value.to_string(),
    }
}

/// Answer text from an HTTP response body.
///
/// The first object found among `choices[0].message`, `choices[0]` (when it
/// has `content`) and `message` decides the answer: its `content`, trimmed,
/// or empty when it has none. Without one, the first 1000 characters of the
/// JSON are returned.
pub fn normalize_http_response(value: &serde_json::Value) -> String {
    use serde_json::Value;

    if let Some(choice) = value.pointer("/choices/0").and_then(Value::as_object) {
        if let Some(Value::Object(message)) = choice.get("message") {
            return content_of(message);
        }
        if choice.contains_key("content") {
            return content_of(choice);
        }
    }
    if let Some(Value::Object(message)) = value.get("message") {
        return content_of(message);
    }
    value.to_string().chars().take(RAW_EXCERPT_CHARS).collect()
}

fn content_of(object: &serde_json::Map<String, serde_json::Value>) -> String {
    object
        .get("content")
        .and_then(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .unwrap_or_default()
}
