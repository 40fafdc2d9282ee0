use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::json;

use super::error::{RerankError, RerankResult};
use super::provider::{CompletionProvider, CompletionRequest};

/// Scripted reply of a [`MockCompleter`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Error(String),
}

/// Completion provider replaying scripted replies in order.
///
/// When the script runs out, the fallback reply (if any) is repeated; otherwise an error is
/// returned.
pub struct MockCompleter {
    model: String,
    script: Mutex<VecDeque<MockReply>>,
    fallback: Option<MockReply>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompleter {
    pub fn new() -> Self {
        Self {
            model: "mock-rerank".to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self::new().with_fallback(MockReply::Text(text.into()))
    }

    /// Always fails.
    pub fn failing() -> Self {
        Self::new().with_fallback(MockReply::Error("mock provider down".to_string()))
    }

    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.script.lock().push_back(MockReply::Text(text.into()));
    }

    pub fn push_error(&self, reason: impl Into<String>) {
        self.script.lock().push_back(MockReply::Error(reason.into()));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

impl Default for MockCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionProvider for MockCompleter {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> RerankResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let reply = self.script.lock().pop_front().or_else(|| self.fallback.clone());
        match reply {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Error(reason)) => Err(RerankError::Completion { reason }),
            None => Err(RerankError::Completion {
                reason: "mock script exhausted".to_string(),
            }),
        }
    }
}

/// Builds a well-formed ranking completion.
pub fn ranking_json(query_id: &str, results: &[(&str, f64)]) -> String {
    json!({
        "query_id": query_id,
        "results": results
            .iter()
            .map(|(id, score)| json!({"id": id, "score": score}))
            .collect::<Vec<_>>(),
    })
    .to_string()
}
