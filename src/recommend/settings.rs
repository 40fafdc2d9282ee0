use std::time::Duration;

use crate::config::Config;
use crate::constants::{
    DEFAULT_LOCK_TTL_SECS, DEFAULT_NEGATIVE_CACHE_TTL_SECS, DEFAULT_RERANK_ALPHA,
    DEFAULT_RESULT_CACHE_TTL_SECS, DEFAULT_RETRIEVAL_K, DEFAULT_TOP_SALES_CACHE_TTL_SECS,
    DEFAULT_VECTOR_CACHE_TTL_SECS, DEFAULT_XSELL_CACHE_TTL_SECS, LOCK_POLL_INTERVAL_MS,
};

/// Tunables of the [`Recommender`](super::Recommender) pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommenderSettings {
    pub vector_ttl: Duration,
    pub result_ttl: Duration,
    pub negative_ttl: Duration,
    pub xsell_ttl: Duration,
    pub top_sales_ttl: Duration,
    pub lock_ttl: Duration,
    pub lock_poll_interval: Duration,
    pub embedding_wait_timeout: Duration,
    pub retrieval_k: usize,
    pub rerank_alpha: f32,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            vector_ttl: Duration::from_secs(DEFAULT_VECTOR_CACHE_TTL_SECS),
            result_ttl: Duration::from_secs(DEFAULT_RESULT_CACHE_TTL_SECS),
            negative_ttl: Duration::from_secs(DEFAULT_NEGATIVE_CACHE_TTL_SECS),
            xsell_ttl: Duration::from_secs(DEFAULT_XSELL_CACHE_TTL_SECS),
            top_sales_ttl: Duration::from_secs(DEFAULT_TOP_SALES_CACHE_TTL_SECS),
            lock_ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECS),
            lock_poll_interval: Duration::from_millis(LOCK_POLL_INTERVAL_MS),
            embedding_wait_timeout: Duration::from_secs(DEFAULT_LOCK_TTL_SECS + 5),
            retrieval_k: DEFAULT_RETRIEVAL_K,
            rerank_alpha: DEFAULT_RERANK_ALPHA,
        }
    }
}

impl RecommenderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            vector_ttl: config.vector_cache_ttl,
            result_ttl: config.result_cache_ttl,
            negative_ttl: config.negative_cache_ttl,
            xsell_ttl: config.xsell_cache_ttl,
            top_sales_ttl: config.top_sales_cache_ttl,
            lock_ttl: config.lock_ttl,
            embedding_wait_timeout: config.embedding_wait_timeout,
            retrieval_k: config.retrieval_k,
            rerank_alpha: config.rerank_alpha,
            ..Self::default()
        }
    }

    pub fn with_lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    pub fn with_embedding_wait_timeout(mut self, timeout: Duration) -> Self {
        self.embedding_wait_timeout = timeout;
        self
    }

    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }
}
