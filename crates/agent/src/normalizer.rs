//! Context normalizer: turns whatever a retrieval backend returns into one
//! context string.
//!
//! Retrieval problems never reach the caller. Every degradation is logged
//! and collapses to an empty context, which the pipeline answers with its
//! not-found message.

use fieldrag_core::memory::{ChunkVariant, RawRetrieval, RetrievalSession};
use fieldrag_core::{MemoryError, RetrievalDegraded};
use tracing::{debug, warn};

/// Prepended to a joined chunk list.
pub const CONTEXT_HEADER: &str = "\n\n--- CONTEXT CHUNKS ---\n\n";

/// Record keys probed for chunk text, in priority order.
pub const RECORD_TEXT_KEYS: [&str; 2] = ["text", "content"];

const CHUNK_SEPARATOR: &str = "\n\n";

/// Retrieve and normalize context; empty on any failure.
pub async fn retrieve_context(session: &dyn RetrievalSession, query: &str, k: usize) -> String {
    match try_retrieve_context(session, query, k).await {
        Ok(context) => context,
        Err(e) => {
            warn!(session = session.name(), error = %e, "Retrieval degraded; continuing without context");
            String::new()
        }
    }
}

/// Retrieve and normalize context, reporting why it is unusable.
///
/// A backend that rejects the `k` hint is queried once more without it.
pub async fn try_retrieve_context(
    session: &dyn RetrievalSession,
    query: &str,
    k: usize,
) -> Result<String, RetrievalDegraded> {
    let raw = match session.search_context(query, Some(k)).await {
        Err(MemoryError::UnsupportedParameter(param)) => {
            warn!(
                session = session.name(),
                param = %param,
                "Retrieval backend rejected the result-count hint; retrying without it"
            );
            session.search_context(query, None).await?
        }
        other => other?,
    };

    let context = normalize(RawRetrieval::from_json(raw))?;
    debug!(session = session.name(), context_len = context.len(), "Context retrieved");
    Ok(context)
}

/// Collapse a classified retrieval result into context text.
pub fn normalize(raw: RawRetrieval) -> Result<String, RetrievalDegraded> {
    match raw {
        RawRetrieval::Empty => Ok(String::new()),
        RawRetrieval::Text(text) => Ok(text),
        RawRetrieval::Chunks(chunks) => {
            let body = chunks
                .into_iter()
                .map(chunk_text)
                .collect::<Vec<_>>()
                .join(CHUNK_SEPARATOR);
            Ok(format!("{CONTEXT_HEADER}{body}"))
        }
        RawRetrieval::Unsupported(kind) => Err(RetrievalDegraded::UnsupportedShape(kind)),
    }
}

fn chunk_text(chunk: ChunkVariant) -> String {
    match chunk {
        ChunkVariant::Plain(text) => text,
        ChunkVariant::Record(record) => RECORD_TEXT_KEYS
            .iter()
            .find_map(|key| record.get(*key).and_then(|v| v.as_str()).filter(|s| !s.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| serde_json::Value::Object(record).to_string()),
    }
}
