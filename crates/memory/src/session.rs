//! File-backed retrieval session.
//!
//! Loads one artifact pair fully into memory on open and answers similarity
//! queries from that snapshot. It never re-reads the files; a newer
//! generation needs a new session.

use crate::artifact::{read_artifact, IndexDescriptor, StoredChunk};
use crate::embedding::{Embedder, HashingEmbedder};
use crate::vector::rank_by_similarity;
use async_trait::async_trait;
use fieldrag_core::memory::{ArtifactLocation, RetrievalSession, SessionOpener};
use fieldrag_core::MemoryError;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Results returned when the caller gives no `k`.
pub const DEFAULT_BREADTH: usize = 5;

/// An open, immutable view of one artifact generation.
pub struct FileSession {
    generation: String,
    chunks: Vec<StoredChunk>,
    vectors: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
    default_k: usize,
    min_score: f32,
}

impl FileSession {
    /// Open the artifact at `location`. Only hashing-embedded artifacts are readable.
    pub fn open(location: &ArtifactLocation) -> Result<Self, MemoryError> {
        Self::open_with_embedder(location, None)
    }

    /// Open the artifact at `location`, embedding queries with `embedder`
    /// when the descriptor names it.
    pub fn open_with_embedder(
        location: &ArtifactLocation,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self, MemoryError> {
        let (payload, descriptor) = read_artifact(location)?;
        let embedder = query_embedder(&descriptor, embedder)?;

        info!(
            generation = %descriptor.generation,
            chunks = payload.chunks.len(),
            embedder = embedder.id(),
            dir = %location.dir().display(),
            "Retrieval session opened"
        );

        Ok(Self {
            generation: descriptor.generation,
            chunks: payload.chunks,
            vectors: descriptor.entries.into_iter().map(|e| e.vector).collect(),
            embedder,
            default_k: DEFAULT_BREADTH,
            min_score: 0.0,
        })
    }

    /// Breadth used when a query carries no `k`.
    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k;
        self
    }

    /// Scores must be strictly above this to be returned.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Ranked `(chunk, score)` pairs for `query`.
    pub fn search(&self, query: &str, k: usize) -> Vec<(&StoredChunk, f32)> {
        let query_vector = self.embedder.embed(query);
        rank_by_similarity(self.vectors.iter().map(Vec::as_slice), &query_vector, k, self.min_score)
            .into_iter()
            .map(|(pos, score)| (&self.chunks[pos], score))
            .collect()
    }
}

#[async_trait]
impl RetrievalSession for FileSession {
    fn name(&self) -> &str {
        "file"
    }

    fn generation(&self) -> Option<&str> {
        Some(&self.generation)
    }

    async fn search_context(&self, query: &str, k: Option<usize>) -> Result<serde_json::Value, MemoryError> {
        let k = k.unwrap_or(self.default_k);
        let hits = self.search(query, k);
        debug!(query_len = query.len(), k, hits = hits.len(), "File session search");

        let records: Vec<serde_json::Value> = hits
            .into_iter()
            .map(|(chunk, score)| {
                json!({
                    "text": chunk.text,
                    "score": score,
                    "chunk_id": chunk.id,
                    "document": chunk.document,
                })
            })
            .collect();
        Ok(serde_json::Value::Array(records))
    }
}

/// The embedder that matches the one recorded in `descriptor`.
///
/// A supplied embedder wins when its id and width match. Hashing artifacts
/// are always readable since the hashing embedder is rebuilt from the width.
fn query_embedder(
    descriptor: &IndexDescriptor,
    supplied: Option<Arc<dyn Embedder>>,
) -> Result<Arc<dyn Embedder>, MemoryError> {
    if let Some(embedder) = supplied
        && embedder.id() == descriptor.embedder
    {
        if embedder.dimensions() != descriptor.dimensions {
            return Err(MemoryError::ArtifactCorrupt(format!(
                "artifact vectors are {} wide, embedder '{}' produces {}",
                descriptor.dimensions,
                embedder.id(),
                embedder.dimensions()
            )));
        }
        return Ok(embedder);
    }

    if descriptor.embedder == HashingEmbedder::ID {
        return Ok(Arc::new(HashingEmbedder::new(descriptor.dimensions)));
    }

    Err(MemoryError::ArtifactCorrupt(format!(
        "artifact was embedded with '{}', which this session cannot reproduce",
        descriptor.embedder
    )))
}

/// Opens [`FileSession`]s with fixed query settings.
#[derive(Clone)]
pub struct FileSessionOpener {
    default_k: usize,
    min_score: f32,
    embedder: Option<Arc<dyn Embedder>>,
}

impl FileSessionOpener {
    pub fn new(default_k: usize, min_score: f32) -> Self {
        Self {
            default_k,
            min_score,
            embedder: None,
        }
    }

    /// Embed queries with `embedder` for artifacts it produced.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

impl Default for FileSessionOpener {
    fn default() -> Self {
        Self::new(DEFAULT_BREADTH, 0.0)
    }
}

impl SessionOpener for FileSessionOpener {
    fn open(&self, location: &ArtifactLocation) -> Result<Arc<dyn RetrievalSession>, MemoryError> {
        let session = FileSession::open_with_embedder(location, self.embedder.clone())?
            .with_default_k(self.default_k)
            .with_min_score(self.min_score);
        Ok(Arc::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::MemoryEncoder;
    use fieldrag_core::memory::Document;

    fn encoded(docs: &[&str]) -> (tempfile::TempDir, ArtifactLocation) {
        let tmp = tempfile::tempdir().unwrap();
        let location = ArtifactLocation::new(tmp.path());
        let documents: Vec<Document> = docs.iter().map(|d| Document::new(*d)).collect();
        MemoryEncoder::new(location.clone()).encode(&documents).unwrap();
        (tmp, location)
    }

    #[tokio::test]
    async fn returns_ranked_records() {
        let (_tmp, location) = encoded(&[
            "Prime the pump before startup.",
            "The sky is blue.",
        ]);
        let session = FileSession::open(&location).unwrap();

        let value = session.search_context("what color is the sky", Some(1)).await.unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["text"], "The sky is blue.");
        assert!(records[0]["score"].as_f64().unwrap() > 0.0);
        assert!(records[0]["chunk_id"].is_string());
    }

    #[tokio::test]
    async fn unrelated_query_returns_nothing() {
        let (_tmp, location) = encoded(&["The sky is blue."]);
        let session = FileSession::open(&location).unwrap();
        let value = session.search_context("hydraulic", Some(3)).await.unwrap();
        assert_eq!(value, serde_json::json!([]));
    }

    #[tokio::test]
    async fn none_k_uses_default_breadth() {
        let docs: Vec<String> = (0..8).map(|i| format!("valve {i} inspected.")).collect();
        let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
        let (_tmp, location) = encoded(&refs);

        let session = FileSession::open(&location).unwrap().with_default_k(2);
        let value = session.search_context("valve inspected", None).await.unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn missing_artifact_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = FileSession::open(&ArtifactLocation::new(tmp.path())).err().unwrap();
        assert!(matches!(err, MemoryError::ArtifactMissing { ref missing } if missing.len() == 2));
    }

    /// Hashing with a different id, as a stand-in for a model embedder.
    struct RenamedEmbedder(HashingEmbedder);

    impl Embedder for RenamedEmbedder {
        fn id(&self) -> &str {
            "renamed-hashing"
        }

        fn dimensions(&self) -> usize {
            self.0.dimensions()
        }

        fn embed(&self, text: &str) -> Vec<f32> {
            self.0.embed(text)
        }
    }

    fn encoded_with(embedder: Arc<dyn Embedder>) -> (tempfile::TempDir, ArtifactLocation) {
        let tmp = tempfile::tempdir().unwrap();
        let location = ArtifactLocation::new(tmp.path());
        MemoryEncoder::new(location.clone())
            .with_embedder(embedder)
            .encode(&[Document::new("The sky is blue.")])
            .unwrap();
        (tmp, location)
    }

    #[tokio::test]
    async fn custom_embedder_artifact_opens_with_matching_opener() {
        let embedder: Arc<dyn Embedder> = Arc::new(RenamedEmbedder(HashingEmbedder::new(64)));
        let (_tmp, location) = encoded_with(embedder.clone());

        let session = FileSessionOpener::new(1, 0.0)
            .with_embedder(embedder)
            .open(&location)
            .unwrap();
        let value = session.search_context("sky", None).await.unwrap();
        assert_eq!(value[0]["text"], "The sky is blue.");
    }

    #[test]
    fn unknown_embedder_is_corrupt() {
        let (_tmp, location) = encoded_with(Arc::new(RenamedEmbedder(HashingEmbedder::new(64))));
        assert!(matches!(
            FileSessionOpener::default().open(&location).err(),
            Some(MemoryError::ArtifactCorrupt(_))
        ));
    }

    #[test]
    fn embedder_width_mismatch_is_corrupt() {
        let (_tmp, location) = encoded_with(Arc::new(RenamedEmbedder(HashingEmbedder::new(64))));
        let narrower = Arc::new(RenamedEmbedder(HashingEmbedder::new(32)));
        assert!(matches!(
            FileSessionOpener::default().with_embedder(narrower).open(&location).err(),
            Some(MemoryError::ArtifactCorrupt(_))
        ));
    }

    #[test]
    fn hashing_artifact_ignores_unrelated_embedder() {
        let (_tmp, location) = encoded(&["The sky is blue."]);
        let other = Arc::new(RenamedEmbedder(HashingEmbedder::new(8)));
        assert!(FileSessionOpener::default().with_embedder(other).open(&location).is_ok());
    }

    #[test]
    fn opener_exposes_generation() {
        let (_tmp, location) = encoded(&["The sky is blue."]);
        let session = FileSessionOpener::default().open(&location).unwrap();
        assert_eq!(session.name(), "file");
        assert!(session.generation().is_some());
    }
}
