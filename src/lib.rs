//! Reco library crate (used by the server and integration tests).
//!
//! # Public API Surface
//!
//! ## Pipeline
//! - [`Recommender`] - similar/complementary, cross-sell and best-seller recommendations
//! - [`ServiceContext`] - production wiring from [`Config`]
//! - [`EmbeddingManager`] - embedding waterfall and batch backfill
//! - [`RetrievalAdapter`], [`RerankValidator`] - candidate generation and model reranking
//!
//! ## Capabilities
//! - [`CatalogStore`] ([`QdrantCatalog`]), [`CacheStore`] ([`MemoryCacheStore`])
//! - [`EmbeddingProvider`] ([`OpenAiEmbedder`]), [`CompletionProvider`] ([`GenaiCompleter`])
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod gateway;
pub mod hashing;
pub mod kinds;
pub mod recommend;
pub mod rerank;
pub mod retrieval;

#[cfg(any(test, feature = "mock"))]
pub use cache::UnavailableCacheStore;
pub use cache::{
    CacheError, CacheLock, CacheStore, MemoryCacheStore, RECO_STATUS_HEADER, ResultCacheRepo,
    ResultSource, VectorCacheRepo,
};
#[cfg(any(test, feature = "mock"))]
pub use catalog::MockCatalog;
pub use catalog::{
    CatalogError, CatalogStore, Clause, FilterSet, Interaction, Product, QdrantCatalog,
};
pub use config::{Config, ConfigError};
#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEmbedder;
pub use embedding::{
    BatchEmbedOptions, BatchEmbedStats, EmbeddingError, EmbeddingManager, EmbeddingProvider,
    OpenAiEmbedder, VectorizeOptions, VectorizeStats,
};
pub use gateway::{GatewayError, HandlerState, create_router_with_state};
pub use hashing::{fingerprint, hash_to_u64, model_tag, product_point_id};
pub use kinds::{KindRegistry, KindSpec};
pub use recommend::{
    ApiVersion, CrossSellRequest, LastSeenRequest, LastSeenResult, RecommendError,
    RecommendRequest, RecommendationItem, RecommendationResult, Recommender, RecommenderSettings,
    RerankMode, ServiceContext, TopSalesRequest, TopSalesResult,
};
#[cfg(any(test, feature = "mock"))]
pub use rerank::{MockCompleter, ranking_json};
pub use rerank::{CompletionProvider, GenaiCompleter, RerankError, RerankValidator};
pub use retrieval::{RetrievalAdapter, RetrievalPath, RetrievalRequest, Retrieved};
