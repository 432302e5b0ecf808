//! # FieldRAG Core
//!
//! Domain types, traits, and error definitions for the FieldRAG offline
//! retrieval-augmented assistant. This crate has **no I/O of its own**: it
//! defines the contracts that the memory, provider, and agent crates
//! implement against.
//!
//! ## Seams
//!
//! - [`RetrievalSession`] / [`SessionOpener`]: similarity search over a
//!   persisted memory artifact
//! - [`Provider`]: an in-process ("SDK") language-model backend
//!
//! Both are object-safe so the orchestrator can hold them as `Arc<dyn _>` and
//! tests can swap in stubs.

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, InferenceError, MemoryError, Result, RetrievalDegraded};
pub use memory::{
    ArtifactLocation, ChunkVariant, Document, RawRetrieval, RetrievalSession, SessionOpener,
};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
