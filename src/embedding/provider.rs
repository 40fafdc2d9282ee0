use std::future::Future;

use super::error::EmbeddingResult;

/// Batch text embedding.
///
/// Implementations return exactly one vector per input, in input order, and fail with
/// [`EmbeddingError::CountMismatch`](super::EmbeddingError::CountMismatch) otherwise.
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier; part of every vector cache key.
    fn model_id(&self) -> &str;

    fn embed(&self, texts: &[String]) -> impl Future<Output = EmbeddingResult<Vec<Vec<f32>>>> + Send;
}
