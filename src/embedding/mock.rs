use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::error::{EmbeddingError, EmbeddingResult};
use super::provider::EmbeddingProvider;

/// Deterministic embedder for tests.
///
/// Vectors are derived from a blake3 digest of the text, so equal texts embed equally.
pub struct MockEmbedder {
    model: String,
    dim: usize,
    delay: Option<Duration>,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
    fail: AtomicBool,
    drop_last: AtomicBool,
}

impl MockEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            model: "mock-embedding".to_string(),
            dim,
            delay: None,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            drop_last: AtomicBool::new(false),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sleeps before answering, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Makes every batch return one vector fewer than requested.
    pub fn set_drop_last(&self, drop_last: bool) {
        self.drop_last.store(drop_last, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text embedded so far, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut reader = blake3::Hasher::new().update(text.as_bytes()).finalize_xof();
        let mut bytes = vec![0u8; self.dim];
        reader.fill(&mut bytes);
        bytes
            .into_iter()
            .map(|b| f32::from(b) / 255.0 - 0.5)
            .collect()
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(8)
    }
}

impl EmbeddingProvider for MockEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::RequestFailed {
                reason: "mock failure".to_string(),
            });
        }

        self.texts.lock().extend(texts.iter().cloned());
        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vector_for(t)).collect();
        if self.drop_last.load(Ordering::SeqCst) {
            vectors.pop();
        }
        Ok(vectors)
    }
}
