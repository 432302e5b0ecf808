//! Local inference provider: runs a quantized Qwen2 model in-process.
//!
//! Uses [Candle](https://github.com/huggingface/candle) to run GGUF weights
//! with no server and no network once the files are cached.
//!
//! `model` can be a preset (`qwen2:0.5b`, `qwen2:1.5b`) that resolves to a
//! HuggingFace repo, or a path to a `.gguf` file with a `tokenizer.json`
//! next to it.

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_qwen2::ModelWeights;
use fieldrag_core::message::Message;
use fieldrag_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use fieldrag_core::InferenceError;
use hf_hub::api::sync::Api;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tokio::sync::Mutex;
use tracing::{debug, info};

struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
}

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    match alias.to_lowercase().as_str() {
        "qwen2" | "qwen2:0.5b" | "qwen2-0.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-0.5B-Instruct-GGUF",
            gguf_file: "qwen2-0_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-0.5B-Instruct",
        }),
        "qwen2:1.5b" | "qwen2-1.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-1.5B-Instruct-GGUF",
            gguf_file: "qwen2-1_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-1.5B-Instruct",
        }),
        _ => None,
    }
}

/// In-process GGUF provider.
///
/// The model is loaded on first request and kept behind a mutex; Candle CPU
/// inference runs one generation at a time.
pub struct LocalProvider {
    inner: Arc<Mutex<Option<LocalModelState>>>,
    model_name: String,
}

struct LocalModelState {
    model: ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    stop_tokens: Vec<u32>,
}

impl LocalProvider {
    /// Create a provider for a preset alias or `.gguf` path. Nothing is loaded yet.
    pub fn new(model_name: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            model_name: model_name.to_string(),
        }
    }

    /// Whether `model_name` is something this provider can load.
    pub fn is_known_model(model_name: &str) -> bool {
        resolve_preset(model_name).is_some() || is_gguf_path(model_name)
    }

    async fn ensure_loaded(&self) -> Result<(), InferenceError> {
        let mut state = self.inner.lock().await;
        if state.is_some() {
            return Ok(());
        }

        info!(model = %self.model_name, "Loading local model on first request");
        let name = self.model_name.clone();
        let loaded = tokio::task::spawn_blocking(move || LocalModelState::load(&name))
            .await
            .map_err(|e| InferenceError::NotConfigured(format!("Model loading task failed: {e}")))??;
        *state = Some(loaded);
        Ok(())
    }
}

fn is_gguf_path(model_name: &str) -> bool {
    model_name.ends_with(".gguf") && Path::new(model_name).is_file()
}

impl LocalModelState {
    fn load(model_name: &str) -> Result<Self, InferenceError> {
        let (model_path, tokenizer_path) = if is_gguf_path(model_name) {
            let path = PathBuf::from(model_name);
            let tokenizer = path.with_file_name("tokenizer.json");
            if !tokenizer.is_file() {
                return Err(InferenceError::NotConfigured(format!(
                    "No tokenizer.json next to {}",
                    path.display()
                )));
            }
            (path, tokenizer)
        } else {
            fetch_preset(model_name)?
        };

        let device = Device::Cpu;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| InferenceError::NotConfigured(format!("Failed to load tokenizer: {e}")))?;

        let mut file = std::fs::File::open(&model_path)
            .map_err(|e| InferenceError::NotConfigured(format!("Failed to open model file: {e}")))?;
        let gguf = gguf_file::Content::read(&mut file)
            .map_err(|e| InferenceError::NotConfigured(format!("Failed to parse GGUF file: {e}")))?;
        let model = ModelWeights::from_gguf(gguf, &mut file, &device)
            .map_err(|e| InferenceError::NotConfigured(format!("Failed to load model weights: {e}")))?;

        let stop_tokens: Vec<u32> = ["<|im_end|>", "<|endoftext|>"]
            .iter()
            .filter_map(|t| tokenizer.token_to_id(t))
            .collect();

        info!(path = %model_path.display(), ?stop_tokens, "Local model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            stop_tokens,
        })
    }

    /// ChatML, the Qwen2 instruct template.
    fn format_prompt(messages: &[Message]) -> String {
        let mut prompt = String::new();
        for msg in messages {
            prompt.push_str("<|im_start|>");
            prompt.push_str(msg.role.as_str());
            prompt.push('\n');
            prompt.push_str(&msg.content);
            prompt.push_str("<|im_end|>\n");
        }
        prompt.push_str("<|im_start|>assistant\n");
        prompt
    }

    fn generate(&mut self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<(String, u32, u32), InferenceError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| InferenceError::MalformedResponse(format!("Tokenization failed: {e}")))?;
        let prompt_tokens = encoding.get_ids();
        let prompt_count = prompt_tokens.len() as u32;

        debug!(prompt_tokens = prompt_count, max_tokens, temperature, "Starting local generation");

        let mut logits_processor = if temperature <= 0.0 {
            LogitsProcessor::new(42, None, None)
        } else {
            LogitsProcessor::new(42, Some(f64::from(temperature)), None)
        };

        let mut input = Tensor::new(prompt_tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;
        let mut position = 0;
        let mut generated: Vec<u32> = Vec::new();

        for _ in 0..max_tokens {
            let step_len = input.dim(1).map_err(map_candle_err)?;
            // quantized_qwen2 already returns last-position logits: (1, vocab)
            let logits = self
                .model
                .forward(&input, position)
                .and_then(|l| l.squeeze(0))
                .map_err(map_candle_err)?;
            position += step_len;

            let next = logits_processor.sample(&logits).map_err(map_candle_err)?;
            if self.stop_tokens.contains(&next) {
                break;
            }
            generated.push(next);

            input = Tensor::new(&[next][..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(map_candle_err)?;
        }

        let output = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| InferenceError::MalformedResponse(format!("Detokenization failed: {e}")))?;

        debug!(completion_tokens = generated.len(), "Generation complete");
        Ok((output, prompt_count, generated.len() as u32))
    }
}

fn fetch_preset(model_name: &str) -> Result<(PathBuf, PathBuf), InferenceError> {
    let preset = resolve_preset(model_name).ok_or_else(|| {
        InferenceError::ModelNotFound(format!(
            "Unknown local model '{model_name}'. Available presets: qwen2:0.5b, qwen2:1.5b. \
             Or provide a path to a .gguf file."
        ))
    })?;

    info!(model = model_name, repo = preset.repo, file = preset.gguf_file, "Fetching local model");

    let api = Api::new()
        .map_err(|e| InferenceError::Network(format!("Failed to initialize HuggingFace Hub API: {e}")))?;
    let model_path = api
        .model(preset.repo.to_string())
        .get(preset.gguf_file)
        .map_err(|e| InferenceError::Network(format!("Failed to fetch '{}': {e}", preset.gguf_file)))?;
    let tokenizer_path = api
        .model(preset.tokenizer_repo.to_string())
        .get("tokenizer.json")
        .map_err(|e| InferenceError::Network(format!("Failed to fetch tokenizer from '{}': {e}", preset.tokenizer_repo)))?;

    Ok((model_path, tokenizer_path))
}

fn map_candle_err(e: candle_core::Error) -> InferenceError {
    InferenceError::ApiError {
        status_code: 500,
        message: format!("Candle inference error: {e}"),
    }
}

#[async_trait]
impl Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, InferenceError> {
        self.ensure_loaded().await?;

        let max_tokens = request.max_tokens.unwrap_or(512);
        let temperature = request.temperature;
        let prompt = LocalModelState::format_prompt(&request.messages);

        let inner = self.inner.clone();
        let (output, prompt_tokens, completion_tokens) = tokio::task::spawn_blocking(move || {
            let mut guard = inner.blocking_lock();
            let state = guard
                .as_mut()
                .ok_or_else(|| InferenceError::NotConfigured("local model is not loaded".into()))?;
            state.generate(&prompt, max_tokens, temperature)
        })
        .await
        .map_err(|e| InferenceError::ApiError {
            status_code: 500,
            message: format!("Inference task panicked: {e}"),
        })??;

        let clean = output.trim().trim_end_matches("<|im_end|>").trim();

        let mut metadata = serde_json::Map::new();
        metadata.insert("engine".into(), "candle".into());

        Ok(ProviderResponse {
            message: Message::assistant(clean),
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            model: format!("local/{}", request.model),
            metadata,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        Ok(vec!["qwen2:0.5b".into(), "qwen2:1.5b".into()])
    }
}
