//! Shared stubs for pipeline and normalizer tests.

use async_trait::async_trait;
use fieldrag_core::memory::{ArtifactLocation, RetrievalSession, SessionOpener};
use fieldrag_core::message::Message;
use fieldrag_core::provider::{Provider, ProviderRequest, ProviderResponse};
use fieldrag_core::{InferenceError, MemoryError};
use fieldrag_providers::{InferenceClient, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Echoes the prompt back and counts calls.
#[derive(Default)]
pub struct EchoProvider {
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl EchoProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request.messages[0].content.clone();
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());
        Ok(ProviderResponse {
            message: Message::assistant(prompt),
            usage: None,
            model: request.model,
            metadata: serde_json::Map::new(),
        })
    }
}

pub fn echo_client() -> (InferenceClient, Arc<EchoProvider>) {
    let provider = Arc::new(EchoProvider::default());
    let client = InferenceClient::new(Transport::Sdk(provider.clone()), "stub");
    (client, provider)
}

/// Returns a fixed raw result for every query.
pub struct FixedSession {
    pub result: serde_json::Value,
    pub generation: Option<String>,
    seen_k: Mutex<Vec<Option<usize>>>,
}

impl FixedSession {
    pub fn new(result: serde_json::Value) -> Self {
        Self {
            result,
            generation: None,
            seen_k: Mutex::new(Vec::new()),
        }
    }

    pub fn with_generation(mut self, generation: &str) -> Self {
        self.generation = Some(generation.into());
        self
    }

    pub fn seen_k(&self) -> Vec<Option<usize>> {
        self.seen_k.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalSession for FixedSession {
    fn name(&self) -> &str {
        "fixed"
    }

    fn generation(&self) -> Option<&str> {
        self.generation.as_deref()
    }

    async fn search_context(&self, _query: &str, k: Option<usize>) -> Result<serde_json::Value, MemoryError> {
        self.seen_k.lock().unwrap().push(k);
        Ok(self.result.clone())
    }
}

/// Rejects any `k` hint; answers only when called without one.
pub struct NoKSession {
    pub result: serde_json::Value,
    seen_k: Mutex<Vec<Option<usize>>>,
}

impl NoKSession {
    pub fn new(result: serde_json::Value) -> Self {
        Self {
            result,
            seen_k: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_k(&self) -> Vec<Option<usize>> {
        self.seen_k.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalSession for NoKSession {
    fn name(&self) -> &str {
        "no-k"
    }

    async fn search_context(&self, _query: &str, k: Option<usize>) -> Result<serde_json::Value, MemoryError> {
        self.seen_k.lock().unwrap().push(k);
        match k {
            Some(_) => Err(MemoryError::UnsupportedParameter("k".into())),
            None => Ok(self.result.clone()),
        }
    }
}

/// Fails every query.
pub struct FailingSession;

#[async_trait]
impl RetrievalSession for FailingSession {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search_context(&self, _query: &str, _k: Option<usize>) -> Result<serde_json::Value, MemoryError> {
        Err(MemoryError::QueryFailed("index offline".into()))
    }
}

/// Hands out pre-built sessions in order; counts opens.
pub struct ScriptedOpener {
    sessions: Mutex<Vec<Result<Arc<dyn RetrievalSession>, MemoryError>>>,
    opens: AtomicUsize,
}

impl ScriptedOpener {
    pub fn new(sessions: Vec<Result<Arc<dyn RetrievalSession>, MemoryError>>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl SessionOpener for ScriptedOpener {
    fn open(&self, _location: &ArtifactLocation) -> Result<Arc<dyn RetrievalSession>, MemoryError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.is_empty() {
            panic!("ScriptedOpener exhausted after {} opens", self.opens());
        }
        sessions.remove(0)
    }
}
