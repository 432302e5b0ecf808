//! Memory artifact contracts: documents, artifact locations, and retrieval.
//!
//! The pipeline never looks inside a memory artifact. It only needs:
//! - somewhere on disk where the artifact pair lives ([`ArtifactLocation`])
//! - a way to open it ([`SessionOpener`])
//! - a way to query it ([`RetrievalSession`])
//!
//! Retrieval backends answer with raw JSON because their result shape is not
//! under our control. [`RawRetrieval::from_json`] is the single adapter that
//! turns that JSON into a tagged variant the normalizer can match on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::error::MemoryError;

/// Default file name of the binary payload.
pub const DEFAULT_PAYLOAD_FILE: &str = "memory.bin";

/// Default file name of the index descriptor.
pub const DEFAULT_INDEX_FILE: &str = "memory_index.json";

/// A raw knowledge-base document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// The text content
    pub content: String,

    /// Where the document came from (file name), for diagnostics only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Where a memory artifact pair lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    /// Directory holding both files
    pub dir: PathBuf,

    /// File name of the binary payload
    pub payload_file: String,

    /// File name of the index descriptor
    pub index_file: String,
}

impl ArtifactLocation {
    /// A location in `dir` using the default file names.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            payload_file: DEFAULT_PAYLOAD_FILE.into(),
            index_file: DEFAULT_INDEX_FILE.into(),
        }
    }

    /// Override both file names.
    pub fn with_files(mut self, payload_file: impl Into<String>, index_file: impl Into<String>) -> Self {
        self.payload_file = payload_file.into();
        self.index_file = index_file.into();
        self
    }

    pub fn payload_path(&self) -> PathBuf {
        self.dir.join(&self.payload_file)
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(&self.index_file)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files of the pair that do not exist yet.
    pub fn missing_files(&self) -> Vec<PathBuf> {
        [self.payload_path(), self.index_path()]
            .into_iter()
            .filter(|p| !p.is_file())
            .collect()
    }

    /// Fail with [`MemoryError::ArtifactMissing`] unless both files exist.
    pub fn ensure_present(&self) -> Result<(), MemoryError> {
        let missing = self.missing_files();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MemoryError::ArtifactMissing { missing })
        }
    }
}

/// A single retrieved unit of context.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkVariant {
    /// Plain text (or a non-record value rendered as text)
    Plain(String),
    /// A structured record exposing text under one of several keys
    Record(serde_json::Map<String, serde_json::Value>),
}

/// A retrieval backend's result, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRetrieval {
    /// Nothing usable came back (`null`, `""`, `[]`, `{}`)
    Empty,
    /// A ready-made context string
    Text(String),
    /// A list of chunks
    Chunks(Vec<ChunkVariant>),
    /// Any other shape; carries the JSON kind for diagnostics
    Unsupported(String),
}

impl RawRetrieval {
    /// Classify a raw backend result.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Empty,
            Value::String(s) if s.is_empty() => Self::Empty,
            Value::String(s) => Self::Text(s),
            Value::Array(items) if items.is_empty() => Self::Empty,
            Value::Array(items) => Self::Chunks(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(map) => ChunkVariant::Record(map),
                        Value::String(s) => ChunkVariant::Plain(s),
                        other => ChunkVariant::Plain(other.to_string()),
                    })
                    .collect(),
            ),
            Value::Object(map) if map.is_empty() => Self::Empty,
            Value::Object(_) => Self::Unsupported("object".into()),
            Value::Bool(_) => Self::Unsupported("bool".into()),
            Value::Number(_) => Self::Unsupported("number".into()),
        }
    }
}

/// A live handle over one memory artifact.
///
/// Implementations: the file-backed session in `fieldrag-memory`, stubs in tests.
#[async_trait]
pub trait RetrievalSession: Send + Sync {
    /// The backend name (e.g., "file").
    fn name(&self) -> &str;

    /// Generation id of the artifact this session was opened against, if known.
    fn generation(&self) -> Option<&str> {
        None
    }

    /// Run a similarity query and return the backend's raw result.
    ///
    /// `k` is a result-count hint. Backends that cannot honour it return
    /// [`MemoryError::UnsupportedParameter`] so the caller can retry without it.
    async fn search_context(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> std::result::Result<serde_json::Value, MemoryError>;
}

/// Opens retrieval sessions against an artifact location.
pub trait SessionOpener: Send + Sync {
    fn open(&self, location: &ArtifactLocation) -> std::result::Result<Arc<dyn RetrievalSession>, MemoryError>;
}
