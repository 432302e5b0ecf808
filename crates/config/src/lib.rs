//! Configuration loading, validation, and management for FieldRAG.
//!
//! Loads configuration from `~/.fieldrag/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use fieldrag_core::memory::{ArtifactLocation, DEFAULT_INDEX_FILE, DEFAULT_PAYLOAD_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The root configuration structure.
///
/// Maps directly to `~/.fieldrag/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model identifier passed to the inference backend
    #[serde(default = "default_model")]
    pub model: String,

    /// Knowledge-base source configuration
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,

    /// Memory artifact and retrieval configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Inference transport configuration
    #[serde(default)]
    pub inference: InferenceConfig,
}

fn default_model() -> String {
    "qwen2:0.5b".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Directory of `*.txt` documents (default: `~/.fieldrag/kb_files`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory holding the artifact pair (default: `~/.fieldrag/artifacts`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,

    #[serde(default = "default_payload_file")]
    pub payload_file: String,

    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Top-k chunks injected into each prompt
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,

    /// Chunks must score strictly above this to be returned
    #[serde(default)]
    pub min_score: f32,

    /// Target chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in bytes
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Width of the hashed embedding vectors
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
}

fn default_payload_file() -> String {
    DEFAULT_PAYLOAD_FILE.into()
}
fn default_index_file() -> String {
    DEFAULT_INDEX_FILE.into()
}
fn default_retrieval_k() -> usize {
    1
}
fn default_chunk_size() -> usize {
    1024
}
fn default_chunk_overlap() -> usize {
    32
}
fn default_embedding_dimensions() -> usize {
    512
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            artifact_dir: None,
            payload_file: default_payload_file(),
            index_file: default_index_file(),
            retrieval_k: default_retrieval_k(),
            min_score: 0.0,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding_dimensions: default_embedding_dimensions(),
        }
    }
}

/// Which inference transport to build at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// SDK when compiled in, HTTP otherwise
    #[default]
    Auto,
    /// In-process model
    Sdk,
    /// Ollama HTTP API
    Http,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "sdk" => Ok(Self::Sdk),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::ValidationError(format!(
                "transport must be one of auto, sdk, http (got '{other}')"
            ))),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Sdk => "sdk",
            Self::Http => "http",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub transport: TransportKind,

    /// Ollama server root; `/api/chat` and `/api/tags` are appended
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Generation cap for the in-process model
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    512
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.fieldrag/config.toml).
    ///
    /// Environment variables override file values:
    /// `FIELDRAG_MODEL`, `FIELDRAG_KB_DIR`, `FIELDRAG_ARTIFACT_DIR`,
    /// `FIELDRAG_RETRIEVAL_K`, `FIELDRAG_OLLAMA_URL`, `FIELDRAG_TRANSPORT`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::default_config_path())
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("FIELDRAG_MODEL") {
            self.model = model;
        }
        if let Some(dir) = lookup("FIELDRAG_KB_DIR") {
            self.knowledge_base.dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("FIELDRAG_ARTIFACT_DIR") {
            self.memory.artifact_dir = Some(PathBuf::from(dir));
        }
        if let Some(k) = lookup("FIELDRAG_RETRIEVAL_K") {
            self.memory.retrieval_k = k.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "FIELDRAG_RETRIEVAL_K must be a positive integer (got '{k}')"
                ))
            })?;
        }
        if let Some(url) = lookup("FIELDRAG_OLLAMA_URL") {
            self.inference.base_url = url;
        }
        if let Some(transport) = lookup("FIELDRAG_TRANSPORT") {
            self.inference.transport = transport.parse()?;
        }
        Ok(())
    }

    /// Get the data directory path (`~/.fieldrag`).
    pub fn data_dir() -> PathBuf {
        dirs_home().join(".fieldrag")
    }

    /// Default config file location.
    pub fn default_config_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Resolved knowledge-base directory.
    pub fn kb_dir(&self) -> PathBuf {
        self.knowledge_base
            .dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| Self::data_dir().join("kb_files"))
    }

    /// Resolved artifact directory.
    pub fn artifact_dir(&self) -> PathBuf {
        self.memory
            .artifact_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| Self::data_dir().join("artifacts"))
    }

    /// Resolved artifact location (directory + file names).
    pub fn artifact_location(&self) -> ArtifactLocation {
        ArtifactLocation::new(self.artifact_dir())
            .with_files(&self.memory.payload_file, &self.memory.index_file)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        if self.memory.retrieval_k == 0 {
            return Err(ConfigError::ValidationError(
                "memory.retrieval_k must be at least 1".into(),
            ));
        }

        if self.memory.chunk_size <= self.memory.chunk_overlap {
            return Err(ConfigError::ValidationError(
                "memory.chunk_size must be greater than memory.chunk_overlap".into(),
            ));
        }

        if self.memory.embedding_dimensions < 16 {
            return Err(ConfigError::ValidationError(
                "memory.embedding_dimensions must be at least 16".into(),
            ));
        }

        if self.memory.payload_file == self.memory.index_file {
            return Err(ConfigError::ValidationError(
                "memory.payload_file and memory.index_file must differ".into(),
            ));
        }

        if self.inference.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "inference.timeout_secs must be at least 1".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.inference.temperature) {
            return Err(ConfigError::ValidationError(
                "inference.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            knowledge_base: KnowledgeBaseConfig::default(),
            memory: MemoryConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs_home().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
