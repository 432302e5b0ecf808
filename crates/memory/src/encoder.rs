//! Memory encoder: documents in, artifact pair out.

use crate::artifact::{self, IndexDescriptor, IndexEntry, MemoryPayload, StoredChunk, FORMAT_VERSION};
use crate::chunker::TextChunker;
use crate::embedding::{Embedder, HashingEmbedder};
use chrono::Utc;
use fieldrag_core::memory::{ArtifactLocation, Document};
use fieldrag_core::MemoryError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Text encoded when the knowledge base has nothing to offer.
pub const PLACEHOLDER_TEXT: &str = "This is a demo document.";

/// Source label of the placeholder document.
pub const PLACEHOLDER_SOURCE: &str = "demo.txt";

/// Outcome of one encoding run.
#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub generation: String,
    /// Documents that contributed at least one chunk
    pub documents: usize,
    pub chunks: usize,
    /// True when the placeholder document was encoded instead of real input
    pub used_placeholder: bool,
    pub payload_path: PathBuf,
    pub index_path: PathBuf,
}

/// Chunks, embeds, and persists documents.
pub struct MemoryEncoder {
    location: ArtifactLocation,
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
}

impl MemoryEncoder {
    /// An encoder with the default chunker and hashing embedder.
    pub fn new(location: ArtifactLocation) -> Self {
        Self {
            location,
            chunker: TextChunker::default(),
            embedder: Arc::new(HashingEmbedder::default()),
        }
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn location(&self) -> &ArtifactLocation {
        &self.location
    }

    /// Encode `documents` into a fresh artifact generation.
    ///
    /// Blocking; run it off the async executor.
    pub fn encode(&self, documents: &[Document]) -> Result<EncodeReport, MemoryError> {
        let generation = Uuid::new_v4().to_string();

        let (mut chunks, mut documents_used) = self.chunk_all(documents);
        let used_placeholder = chunks.is_empty();
        if used_placeholder {
            warn!(
                supplied = documents.len(),
                "No document text to encode; falling back to the placeholder document"
            );
            let placeholder = [Document::new(PLACEHOLDER_TEXT).with_source(PLACEHOLDER_SOURCE)];
            (chunks, documents_used) = self.chunk_all(&placeholder);
        }

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .map(|chunk| IndexEntry {
                id: chunk.id.clone(),
                vector: self.embedder.embed(&chunk.text),
            })
            .collect();

        let payload = MemoryPayload {
            format_version: FORMAT_VERSION,
            generation: generation.clone(),
            chunks,
        };
        let payload_bytes = artifact::encode_payload(&payload)?;

        let descriptor = IndexDescriptor {
            format_version: FORMAT_VERSION,
            generation: generation.clone(),
            created_at: Utc::now(),
            payload_sha256: artifact::digest_hex(&payload_bytes),
            embedder: self.embedder.id().to_string(),
            dimensions: self.embedder.dimensions(),
            documents: documents_used,
            entries,
        };

        artifact::write_artifact(&self.location, &payload_bytes, &descriptor)?;

        let report = EncodeReport {
            generation,
            documents: documents_used,
            chunks: payload.chunks.len(),
            used_placeholder,
            payload_path: self.location.payload_path(),
            index_path: self.location.index_path(),
        };
        info!(
            generation = %report.generation,
            documents = report.documents,
            chunks = report.chunks,
            dir = %self.location.dir().display(),
            "Memory artifact encoded"
        );
        Ok(report)
    }

    fn chunk_all(&self, documents: &[Document]) -> (Vec<StoredChunk>, usize) {
        let mut stored = Vec::new();
        let mut used = 0;

        for (doc_index, doc) in documents.iter().enumerate() {
            let label = doc
                .source
                .clone()
                .unwrap_or_else(|| format!("document-{doc_index}"));
            let pieces = self.chunker.chunk(&doc.content);
            if pieces.is_empty() {
                continue;
            }
            used += 1;
            stored.extend(pieces.into_iter().map(|piece| StoredChunk {
                id: format!("{doc_index}:{}", piece.index),
                document: label.clone(),
                chunk_index: piece.index,
                text: piece.text,
            }));
        }
        (stored, used)
    }
}
