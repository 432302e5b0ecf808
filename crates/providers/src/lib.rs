//! Inference transports for FieldRAG.
//!
//! [`InferenceClient`] owns exactly one [`Transport`]: the Ollama HTTP API
//! ([`OllamaHttpTransport`]) or an in-process [`fieldrag_core::Provider`]
//! such as [`LocalProvider`] (feature `local`).

pub mod inference;
#[cfg(feature = "local")]
pub mod local;
pub mod ollama;

pub use inference::{is_error_answer, InferenceClient, Transport, HTTP_ERROR_PREFIX, SDK_ERROR_PREFIX};
#[cfg(feature = "local")]
pub use local::LocalProvider;
pub use ollama::OllamaHttpTransport;
