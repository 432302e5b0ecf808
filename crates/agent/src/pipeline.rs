//! The RAG pipeline: retrieve, compose, infer.
//!
//! # Flow
//!
//! 1. Ensure a retrieval session is open (lazily, on first use)
//! 2. Retrieve and normalize context for the question
//! 3. Short-circuit with [`NOT_FOUND_MESSAGE`] when there is no context
//! 4. Compose the grounded prompt and run inference
//!
//! Re-encoding rebuilds the artifact from the knowledge base and swaps the
//! session for one opened on the new generation.

use crate::normalizer::retrieve_context;
use crate::prompt::{compose_prompt, NOT_FOUND_MESSAGE};
use fieldrag_config::AppConfig;
use fieldrag_core::memory::{ArtifactLocation, RetrievalSession, SessionOpener};
use fieldrag_core::{Error, MemoryError, Result};
use fieldrag_memory::{EncodeReport, Embedder, FileSessionOpener, HashingEmbedder, KnowledgeBase, MemoryEncoder, TextChunker};
use fieldrag_providers::InferenceClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Shortest accepted document, in characters after trimming.
pub const MIN_DOCUMENT_CHARS: usize = 6;

// ── Session handle ───────────────────────────────────────────────────────

/// Owns the live retrieval session.
///
/// Readers clone the `Arc` under a read lock. A reload opens the new session
/// first and only then swaps it in, so an in-flight query finishes on the
/// generation it started with.
pub struct SessionHandle {
    location: ArtifactLocation,
    opener: Arc<dyn SessionOpener>,
    current: RwLock<Option<Arc<dyn RetrievalSession>>>,
}

impl SessionHandle {
    pub fn new(location: ArtifactLocation, opener: Arc<dyn SessionOpener>) -> Self {
        Self {
            location,
            opener,
            current: RwLock::new(None),
        }
    }

    /// A handle that starts with `session` already open.
    pub fn preloaded(location: ArtifactLocation, opener: Arc<dyn SessionOpener>, session: Arc<dyn RetrievalSession>) -> Self {
        Self {
            location,
            opener,
            current: RwLock::new(Some(session)),
        }
    }

    pub fn location(&self) -> &ArtifactLocation {
        &self.location
    }

    /// The open session, if any. Never opens one.
    pub async fn current(&self) -> Option<Arc<dyn RetrievalSession>> {
        self.current.read().await.clone()
    }

    /// The open session, opening it on first use.
    pub async fn get(&self) -> std::result::Result<Arc<dyn RetrievalSession>, MemoryError> {
        if let Some(session) = self.current.read().await.as_ref() {
            return Ok(session.clone());
        }

        let mut slot = self.current.write().await;
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }
        let session = self.open().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Replace the session with one opened on the artifact as it is now.
    ///
    /// On failure the old session is dropped too; it is never served stale.
    pub async fn reload(&self) -> std::result::Result<Arc<dyn RetrievalSession>, MemoryError> {
        match self.open().await {
            Ok(session) => {
                *self.current.write().await = Some(session.clone());
                info!(generation = session.generation().unwrap_or("unknown"), "Retrieval session reloaded");
                Ok(session)
            }
            Err(e) => {
                *self.current.write().await = None;
                warn!(error = %e, "Session reload failed; previous session discarded");
                Err(e)
            }
        }
    }

    async fn open(&self) -> std::result::Result<Arc<dyn RetrievalSession>, MemoryError> {
        let opener = self.opener.clone();
        let location = self.location.clone();
        tokio::task::spawn_blocking(move || opener.open(&location))
            .await
            .map_err(|e| MemoryError::Storage(format!("session open task failed: {e}")))?
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Encoder for the artifact described by `config`.
pub fn encoder_from_config(config: &AppConfig) -> MemoryEncoder {
    let memory = &config.memory;
    MemoryEncoder::new(config.artifact_location())
        .with_chunker(TextChunker::new(memory.chunk_size, memory.chunk_overlap))
        .with_embedder(Arc::new(HashingEmbedder::new(memory.embedding_dimensions)))
}

/// Encode every document in `knowledge_base` on the blocking pool.
///
/// Needs no inference backend and opens no session.
pub async fn encode_knowledge_base(knowledge_base: KnowledgeBase, encoder: Arc<MemoryEncoder>) -> Result<EncodeReport> {
    tokio::task::spawn_blocking(move || {
        let documents = knowledge_base.load_documents()?;
        encoder.encode(&documents)
    })
    .await
    .map_err(|e| Error::Internal(format!("encoding task failed: {e}")))?
    .map_err(Error::from)
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// Result of ingesting one document.
#[derive(Debug, Clone)]
pub struct AddDocumentReport {
    /// Where the document was written
    pub path: PathBuf,
    /// The re-encode it triggered
    pub encode: EncodeReport,
}

/// Answers questions from the offline knowledge base.
///
/// `Send + Sync`; share it as `Arc<RagPipeline>`.
pub struct RagPipeline {
    session: SessionHandle,
    inference: InferenceClient,
    encoder: Arc<MemoryEncoder>,
    knowledge_base: Option<KnowledgeBase>,
    retrieval_k: usize,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Wire the file-backed stack described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let inference = InferenceClient::from_config(config)?;
        let memory = &config.memory;
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(memory.embedding_dimensions));

        Self::builder()
            .artifact_location(config.artifact_location())
            .knowledge_base(KnowledgeBase::new(config.kb_dir()))
            .inference(inference)
            .with_opener(Arc::new(
                FileSessionOpener::new(memory.retrieval_k, memory.min_score).with_embedder(embedder.clone()),
            ))
            .chunker(TextChunker::new(memory.chunk_size, memory.chunk_overlap))
            .embedder(embedder)
            .retrieval_k(memory.retrieval_k)
            .build()
    }

    pub fn inference(&self) -> &InferenceClient {
        &self.inference
    }

    pub fn artifact_location(&self) -> &ArtifactLocation {
        self.session.location()
    }

    pub fn knowledge_base(&self) -> Option<&KnowledgeBase> {
        self.knowledge_base.as_ref()
    }

    pub fn retrieval_k(&self) -> usize {
        self.retrieval_k
    }

    /// Answer `query` from the knowledge base.
    ///
    /// Fails only when no session can be opened (missing or corrupt
    /// artifact). Retrieval and inference problems come back as answer text.
    pub async fn answer(&self, query: &str) -> Result<String> {
        let session = self.session.get().await?;

        let context = retrieve_context(session.as_ref(), query, self.retrieval_k).await;
        if context.trim().is_empty() {
            info!(query_len = query.len(), "No relevant context; skipping inference");
            return Ok(NOT_FOUND_MESSAGE.to_string());
        }

        let prompt = compose_prompt(&context, query);
        debug!(context_len = context.len(), prompt_len = prompt.len(), "Prompt composed");
        Ok(self.inference.infer(&prompt).await)
    }

    /// Open the session now instead of on the first question.
    pub async fn ensure_session(&self) -> Result<()> {
        self.session.get().await?;
        Ok(())
    }

    /// Reopen the session on the current artifact. Returns its generation.
    pub async fn reload_session(&self) -> Result<Option<String>> {
        let session = self.session.reload().await?;
        Ok(session.generation().map(String::from))
    }

    /// Generation of the open session, if one is open.
    pub async fn session_generation(&self) -> Option<String> {
        self.session
            .current()
            .await
            .and_then(|s| s.generation().map(String::from))
    }

    /// Encode the whole knowledge base, then reload the session.
    pub async fn reencode(&self) -> Result<EncodeReport> {
        let knowledge_base = self.require_knowledge_base()?.clone();
        let report = encode_knowledge_base(knowledge_base, self.encoder.clone()).await?;

        self.session.reload().await?;
        Ok(report)
    }

    /// Store `content` as a new knowledge-base document and re-encode.
    pub async fn add_document(&self, content: &str) -> Result<AddDocumentReport> {
        if content.trim().chars().count() < MIN_DOCUMENT_CHARS {
            return Err(Error::InvalidInput(format!(
                "document must contain at least {MIN_DOCUMENT_CHARS} characters"
            )));
        }

        let path = self.require_knowledge_base()?.write_document(content)?;
        info!(file = %path.display(), "Document added to knowledge base");

        let encode = self.reencode().await?;
        Ok(AddDocumentReport { path, encode })
    }

    fn require_knowledge_base(&self) -> Result<&KnowledgeBase> {
        self.knowledge_base.as_ref().ok_or_else(|| Error::Config {
            message: "no knowledge-base directory configured".into(),
        })
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Assembles a [`RagPipeline`]. `artifact_location` and `inference` are required.
#[derive(Default)]
pub struct RagPipelineBuilder {
    location: Option<ArtifactLocation>,
    knowledge_base: Option<KnowledgeBase>,
    inference: Option<InferenceClient>,
    opener: Option<Arc<dyn SessionOpener>>,
    session: Option<Arc<dyn RetrievalSession>>,
    chunker: Option<TextChunker>,
    embedder: Option<Arc<dyn Embedder>>,
    retrieval_k: Option<usize>,
}

impl RagPipelineBuilder {
    pub fn artifact_location(mut self, location: ArtifactLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn knowledge_base(mut self, knowledge_base: KnowledgeBase) -> Self {
        self.knowledge_base = Some(knowledge_base);
        self
    }

    pub fn inference(mut self, inference: InferenceClient) -> Self {
        self.inference = Some(inference);
        self
    }

    /// How sessions are opened (default: [`FileSessionOpener`]).
    pub fn with_opener(mut self, opener: Arc<dyn SessionOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Start with an already-open session instead of opening lazily.
    pub fn with_session(mut self, session: Arc<dyn RetrievalSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Embedder for encoding. The default opener also embeds queries with it;
    /// a custom opener set through [`with_opener`](Self::with_opener) must do
    /// the same.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Chunks requested per question (default 1).
    pub fn retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = Some(k);
        self
    }

    pub fn build(self) -> Result<RagPipeline> {
        let location = self.location.ok_or_else(|| Error::Config {
            message: "pipeline needs an artifact location".into(),
        })?;
        let inference = self.inference.ok_or_else(|| Error::Config {
            message: "pipeline needs an inference client".into(),
        })?;
        let retrieval_k = self.retrieval_k.unwrap_or(1);
        if retrieval_k == 0 {
            return Err(Error::Config {
                message: "retrieval_k must be at least 1".into(),
            });
        }

        let opener: Arc<dyn SessionOpener> = match self.opener {
            Some(opener) => opener,
            None => {
                let mut opener = FileSessionOpener::new(retrieval_k, 0.0);
                if let Some(embedder) = &self.embedder {
                    opener = opener.with_embedder(embedder.clone());
                }
                Arc::new(opener)
            }
        };

        let mut encoder = MemoryEncoder::new(location.clone());
        if let Some(chunker) = self.chunker {
            encoder = encoder.with_chunker(chunker);
        }
        if let Some(embedder) = self.embedder {
            encoder = encoder.with_embedder(embedder);
        }

        let session = match self.session {
            Some(session) => SessionHandle::preloaded(location, opener, session),
            None => SessionHandle::new(location, opener),
        };

        Ok(RagPipeline {
            session,
            inference,
            encoder: Arc::new(encoder),
            knowledge_base: self.knowledge_base,
            retrieval_k,
        })
    }
}
