//! End-to-end integration tests for the FieldRAG pipeline.
//!
//! These tests exercise the full path from knowledge-base files on disk,
//! through encoding and retrieval, to the answer text, with the model
//! replaced by an echo provider or a stub Ollama server.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::routing::post;
use axum::{Json, Router};
use fieldrag_agent::{RagPipeline, CONTEXT_HEADER, NOT_FOUND_MESSAGE};
use fieldrag_config::{AppConfig, TransportKind};
use fieldrag_core::memory::{ArtifactLocation, RetrievalSession, SessionOpener};
use fieldrag_core::message::Message;
use fieldrag_core::provider::{Provider, ProviderRequest, ProviderResponse};
use fieldrag_core::memory::Document;
use fieldrag_core::{Error, InferenceError, MemoryError};
use fieldrag_memory::encoder::PLACEHOLDER_TEXT;
use fieldrag_memory::{FileSessionOpener, KnowledgeBase, MemoryEncoder};
use fieldrag_providers::{is_error_answer, InferenceClient, OllamaHttpTransport, Transport};

// ── Echo Provider ────────────────────────────────────────────────────────

/// Answers with the prompt it was given, so tests can see the context.
#[derive(Default)]
struct EchoProvider {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "e2e_echo"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderResponse {
            message: Message::assistant(request.messages[0].content.clone()),
            usage: None,
            model: request.model,
            metadata: serde_json::Map::new(),
        })
    }
}

fn write_doc(kb_dir: &Path, name: &str, text: &str) {
    std::fs::create_dir_all(kb_dir).unwrap();
    std::fs::write(kb_dir.join(name), text).unwrap();
}

fn echo_pipeline(root: &Path, k: usize) -> (RagPipeline, Arc<EchoProvider>) {
    let provider = Arc::new(EchoProvider::default());
    let pipeline = RagPipeline::builder()
        .artifact_location(ArtifactLocation::new(root.join("artifacts")))
        .knowledge_base(KnowledgeBase::new(root.join("kb")))
        .inference(InferenceClient::new(Transport::Sdk(provider.clone()), "e2e"))
        .with_opener(Arc::new(FileSessionOpener::new(k, 0.0)))
        .retrieval_k(k)
        .build()
        .unwrap();
    (pipeline, provider)
}

// ── Scenario A: single document, grounded answer ─────────────────────────

#[tokio::test]
async fn e2e_single_document_is_injected_into_prompt() {
    let tmp = tempfile::tempdir().unwrap();
    write_doc(&tmp.path().join("kb"), "sky.txt", "The sky is blue.");
    let (pipeline, provider) = echo_pipeline(tmp.path(), 1);

    let report = pipeline.reencode().await.unwrap();
    assert_eq!(report.documents, 1);
    assert!(!report.used_placeholder);

    let answer = pipeline.answer("What color is the sky?").await.unwrap();
    assert!(answer.contains(CONTEXT_HEADER.trim()));
    assert!(answer.contains("The sky is blue."));
    assert!(answer.contains("USER QUESTION: What color is the sky?"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

// ── Scenario B: empty knowledge base ─────────────────────────────────────

#[tokio::test]
async fn e2e_empty_knowledge_base_encodes_placeholder() {
    let tmp = tempfile::tempdir().unwrap();
    let (pipeline, _provider) = echo_pipeline(tmp.path(), 1);

    let report = pipeline.reencode().await.unwrap();
    assert!(report.used_placeholder);
    assert_eq!(report.chunks, 1);
    assert!(report.payload_path.is_file());
    assert!(report.index_path.is_file());

    let answer = pipeline.answer("Tell me about the demo document").await.unwrap();
    assert!(answer.contains(PLACEHOLDER_TEXT) || answer == NOT_FOUND_MESSAGE);

    let unrelated = pipeline.answer("hydraulic pressure").await.unwrap();
    assert_eq!(unrelated, NOT_FOUND_MESSAGE);
}

// ── Scenario C: re-encode makes new documents visible ────────────────────

#[tokio::test]
async fn e2e_reencode_and_reload_sees_new_document() {
    let tmp = tempfile::tempdir().unwrap();
    let kb_dir = tmp.path().join("kb");
    write_doc(&kb_dir, "sky.txt", "The sky is blue.");
    let (pipeline, _provider) = echo_pipeline(tmp.path(), 5);

    let first = pipeline.reencode().await.unwrap();
    let old_session = FileSessionOpener::new(5, 0.0)
        .open(pipeline.artifact_location())
        .unwrap();
    assert_eq!(old_session.generation(), Some(first.generation.as_str()));

    write_doc(&kb_dir, "grass.txt", "Grass is green.");
    let second = pipeline.reencode().await.unwrap();
    assert_ne!(first.generation, second.generation);
    assert_eq!(pipeline.session_generation().await, Some(second.generation));

    let answer = pipeline.answer("What color is the grass?").await.unwrap();
    assert!(answer.contains("Grass is green."));

    // A session opened before the re-encode keeps its own snapshot
    let stale = old_session.search_context("grass", Some(5)).await.unwrap();
    assert_eq!(stale, serde_json::json!([]));
}

#[tokio::test]
async fn e2e_external_encode_is_invisible_until_reload() {
    let tmp = tempfile::tempdir().unwrap();
    let (pipeline, _provider) = echo_pipeline(tmp.path(), 5);
    let encoder = MemoryEncoder::new(pipeline.artifact_location().clone());

    let sky = Document::new("The sky is blue.").with_source("sky.txt");
    let first = encoder.encode(std::slice::from_ref(&sky)).unwrap();

    // First question opens the session lazily
    let answer = pipeline.answer("sky color").await.unwrap();
    assert!(answer.contains("The sky is blue."));
    assert_eq!(pipeline.session_generation().await, Some(first.generation.clone()));

    let grass = Document::new("Grass is green.").with_source("grass.txt");
    let second = encoder.encode(&[sky, grass]).unwrap();

    // The open session still serves the old generation
    assert_eq!(pipeline.answer("grass green").await.unwrap(), NOT_FOUND_MESSAGE);
    assert_eq!(pipeline.session_generation().await, Some(first.generation));

    let reloaded = pipeline.reload_session().await.unwrap();
    assert_eq!(reloaded, Some(second.generation));

    let answer = pipeline.answer("grass green").await.unwrap();
    assert!(answer.contains("Grass is green."));
}

#[tokio::test]
async fn e2e_add_document_then_answer() {
    let tmp = tempfile::tempdir().unwrap();
    let (pipeline, _provider) = echo_pipeline(tmp.path(), 3);

    assert!(matches!(pipeline.add_document("tiny").await, Err(Error::InvalidInput(_))));

    let added = pipeline
        .add_document("Pump P-101 requires priming before every cold start.")
        .await
        .unwrap();
    assert!(added.path.is_file());

    let answer = pipeline.answer("How do I start pump P-101?").await.unwrap();
    assert!(answer.contains("priming"));
}

// ── Failure paths ────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_missing_artifact_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let (pipeline, provider) = echo_pipeline(tmp.path(), 1);

    let err = pipeline.answer("anything").await.unwrap_err();
    match err {
        Error::Memory(MemoryError::ArtifactMissing { missing }) => assert_eq!(missing.len(), 2),
        other => panic!("expected ArtifactMissing, got {other:?}"),
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn e2e_partial_artifact_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let (pipeline, _provider) = echo_pipeline(tmp.path(), 1);
    pipeline.reencode().await.unwrap();
    std::fs::remove_file(pipeline.artifact_location().index_path()).unwrap();

    let (fresh, _) = echo_pipeline(tmp.path(), 1);
    let err = fresh.answer("anything").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Memory(MemoryError::ArtifactMissing { ref missing }) if missing.len() == 1
    ));
}

// ── HTTP transport against a stub Ollama ─────────────────────────────────

async fn stub_ollama() -> String {
    let router = Router::new().route(
        "/api/chat",
        post(|Json(body): Json<serde_json::Value>| async move {
            let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
            let grounded = prompt.contains("The sky is blue.");
            Json(serde_json::json!({
                "model": body["model"],
                "message": {
                    "role": "assistant",
                    "content": if grounded { "The sky is blue." } else { "no idea" }
                },
                "done": true
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn e2e_from_config_over_http() {
    let tmp = tempfile::tempdir().unwrap();
    write_doc(&tmp.path().join("kb"), "sky.txt", "The sky is blue.");

    let mut config = AppConfig::default();
    config.knowledge_base.dir = Some(tmp.path().join("kb"));
    config.memory.artifact_dir = Some(tmp.path().join("artifacts"));
    config.inference.transport = TransportKind::Http;
    config.inference.base_url = stub_ollama().await;

    let pipeline = RagPipeline::from_config(&config).unwrap();
    pipeline.reencode().await.unwrap();

    let answer = pipeline.answer("What color is the sky?").await.unwrap();
    assert_eq!(answer, "The sky is blue.");
}

#[tokio::test]
async fn e2e_unreachable_ollama_degrades_to_error_answer() {
    let tmp = tempfile::tempdir().unwrap();
    write_doc(&tmp.path().join("kb"), "sky.txt", "The sky is blue.");

    let transport = OllamaHttpTransport::new("http://127.0.0.1:1", "qwen2:0.5b", Duration::from_secs(2)).unwrap();
    let pipeline = RagPipeline::builder()
        .artifact_location(ArtifactLocation::new(tmp.path().join("artifacts")))
        .knowledge_base(KnowledgeBase::new(tmp.path().join("kb")))
        .inference(InferenceClient::new(Transport::Http(transport), "qwen2:0.5b"))
        .build()
        .unwrap();
    pipeline.reencode().await.unwrap();

    let answer = pipeline.answer("What color is the sky?").await.unwrap();
    assert!(is_error_answer(&answer), "unexpected answer: {answer}");
}
