//! Embedding provider capability and the embedding cache manager.
//!
//! - [`EmbeddingProvider`] is implemented by [`OpenAiEmbedder`] (and a deterministic mock).
//! - [`EmbeddingManager`] runs the cache → store → provider waterfall and the batch backfill.

mod error;
pub mod manager;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod openai;
pub mod provider;


pub use error::{EmbeddingError, EmbeddingResult};
pub use manager::{
    BatchEmbedOptions, BatchEmbedStats, EmbeddingManager, VectorizeOptions, VectorizeStats,
};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbedder;
pub use openai::{OpenAiEmbedder, parse_embedding_response};
pub use provider::EmbeddingProvider;
