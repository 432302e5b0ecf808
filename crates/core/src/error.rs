//! Error types for the FieldRAG domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] aggregates them.
//!
//! Two contexts are *recoverable by design* and never reach the user as a
//! fault: [`RetrievalDegraded`] collapses to "no context", and
//! [`InferenceError`] collapses to an error-bearing answer string.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all FieldRAG operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Memory artifact errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Inference errors ---
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Caller input ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- I/O ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors raised while encoding, opening, or querying a memory artifact.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    /// One or both files of the artifact pair are absent.
    #[error("Missing memory artifacts: {}. Run `fieldrag encode` first", display_paths(.missing))]
    ArtifactMissing { missing: Vec<PathBuf> },

    /// Both files exist but do not describe the same encoding generation.
    #[error("Memory artifact is inconsistent: {0}")]
    ArtifactCorrupt(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// The backend does not accept a parameter of the request (e.g. `k`).
    #[error("Unsupported search parameter: {0}")]
    UnsupportedParameter(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a retrieval produced no usable context.
///
/// Never surfaced to the user: the normalizer logs it and yields an empty
/// context block instead.
#[derive(Debug, Clone, Error)]
pub enum RetrievalDegraded {
    #[error("retrieval backend failed: {0}")]
    Backend(#[from] MemoryError),

    #[error("retrieval backend returned an unsupported result shape: {0}")]
    UnsupportedShape(String),
}

/// Errors raised by an inference transport.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Inference backend not configured: {0}")]
    NotConfigured(String),
}
