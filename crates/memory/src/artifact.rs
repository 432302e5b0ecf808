//! On-disk memory artifact: a MessagePack chunk payload plus a JSON index
//! descriptor.
//!
//! Both halves carry the same `generation` id and the descriptor records the
//! payload's SHA-256 digest, so a pair torn by an interrupted re-encode is
//! detected on open instead of being served.

use chrono::{DateTime, Utc};
use fieldrag_core::memory::ArtifactLocation;
use fieldrag_core::MemoryError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Version of the on-disk layout. Bumped on incompatible changes.
pub const FORMAT_VERSION: u32 = 1;

/// One encoded chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    /// Source label of the originating document
    pub document: String,
    pub chunk_index: usize,
    pub text: String,
}

/// The binary payload (`memory.bin`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPayload {
    pub format_version: u32,
    pub generation: String,
    pub chunks: Vec<StoredChunk>,
}

/// One vector of the index, keyed by chunk id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
}

/// The index descriptor (`memory_index.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub format_version: u32,
    pub generation: String,
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the payload file bytes
    pub payload_sha256: String,
    /// Embedder that produced the vectors
    pub embedder: String,
    pub dimensions: usize,
    /// Number of source documents
    pub documents: usize,
    pub entries: Vec<IndexEntry>,
}

/// Hex SHA-256 of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Serialize the payload to MessagePack.
pub fn encode_payload(payload: &MemoryPayload) -> Result<Vec<u8>, MemoryError> {
    rmp_serde::to_vec_named(payload)
        .map_err(|e| MemoryError::EncodingFailed(format!("payload serialization: {e}")))
}

/// Persist an artifact pair: payload first, then descriptor.
///
/// Each file is written to a temporary sibling and renamed into place.
pub fn write_artifact(
    location: &ArtifactLocation,
    payload_bytes: &[u8],
    descriptor: &IndexDescriptor,
) -> Result<(), MemoryError> {
    std::fs::create_dir_all(location.dir()).map_err(|e| {
        MemoryError::EncodingFailed(format!(
            "cannot create artifact directory {}: {e}",
            location.dir().display()
        ))
    })?;

    let index_bytes = serde_json::to_vec_pretty(descriptor)
        .map_err(|e| MemoryError::EncodingFailed(format!("index serialization: {e}")))?;

    write_atomic(location.dir(), &location.payload_path(), payload_bytes)?;
    write_atomic(location.dir(), &location.index_path(), &index_bytes)?;

    debug!(
        generation = %descriptor.generation,
        payload = %location.payload_path().display(),
        "Artifact pair written"
    );
    Ok(())
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), MemoryError> {
    let fail = |e: std::io::Error| {
        MemoryError::EncodingFailed(format!("cannot write {}: {e}", target.display()))
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.persist(target).map_err(|e| fail(e.error))?;
    Ok(())
}

/// Read and cross-check an artifact pair.
///
/// Missing files are reported before anything is read.
pub fn read_artifact(location: &ArtifactLocation) -> Result<(MemoryPayload, IndexDescriptor), MemoryError> {
    location.ensure_present()?;

    let payload_bytes = std::fs::read(location.payload_path())
        .map_err(|e| MemoryError::Storage(format!("cannot read payload: {e}")))?;
    let index_bytes = std::fs::read(location.index_path())
        .map_err(|e| MemoryError::Storage(format!("cannot read index descriptor: {e}")))?;

    let payload: MemoryPayload = rmp_serde::from_slice(&payload_bytes)
        .map_err(|e| MemoryError::ArtifactCorrupt(format!("payload does not decode: {e}")))?;
    let descriptor: IndexDescriptor = serde_json::from_slice(&index_bytes)
        .map_err(|e| MemoryError::ArtifactCorrupt(format!("index descriptor does not decode: {e}")))?;

    verify(&payload, &descriptor, &payload_bytes)?;
    Ok((payload, descriptor))
}

fn verify(payload: &MemoryPayload, descriptor: &IndexDescriptor, payload_bytes: &[u8]) -> Result<(), MemoryError> {
    let corrupt = |msg: String| Err(MemoryError::ArtifactCorrupt(msg));

    if payload.format_version != FORMAT_VERSION || descriptor.format_version != FORMAT_VERSION {
        return corrupt(format!(
            "unsupported format version (payload {}, index {}, expected {FORMAT_VERSION})",
            payload.format_version, descriptor.format_version
        ));
    }

    if payload.generation != descriptor.generation {
        return corrupt(format!(
            "generation mismatch: payload {} vs index {}",
            payload.generation, descriptor.generation
        ));
    }

    let actual = digest_hex(payload_bytes);
    if actual != descriptor.payload_sha256 {
        return corrupt(format!(
            "payload digest {actual} does not match index ({})",
            descriptor.payload_sha256
        ));
    }

    if payload.chunks.len() != descriptor.entries.len() {
        return corrupt(format!(
            "{} chunks but {} index entries",
            payload.chunks.len(),
            descriptor.entries.len()
        ));
    }

    for (chunk, entry) in payload.chunks.iter().zip(&descriptor.entries) {
        if chunk.id != entry.id {
            return corrupt(format!("index entry {} does not match chunk {}", entry.id, chunk.id));
        }
        if entry.vector.len() != descriptor.dimensions {
            return corrupt(format!(
                "vector for {} has {} dimensions, expected {}",
                entry.id,
                entry.vector.len(),
                descriptor.dimensions
            ));
        }
    }

    Ok(())
}
