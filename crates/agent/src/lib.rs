//! The FieldRAG answer pipeline.
//!
//! The pipeline follows a **Retrieve → Compose → Infer** flow:
//!
//! 1. **Retrieve** context chunks from the open memory session
//! 2. **Normalize** whatever shape the backend returned into one context block
//! 3. **Compose** a grounded prompt around the context and the question
//! 4. **Infer** through the configured transport and return the answer text
//!
//! Questions with no usable context are answered without calling the model.

pub mod normalizer;
pub mod pipeline;
pub mod prompt;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use normalizer::{normalize, retrieve_context, try_retrieve_context, CONTEXT_HEADER};
pub use pipeline::{
    encode_knowledge_base, encoder_from_config, AddDocumentReport, RagPipeline, RagPipelineBuilder, SessionHandle,
};
pub use prompt::{compose_prompt, NOT_FOUND_MESSAGE};
