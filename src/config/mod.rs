//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `RECO_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_EMBEDDING_DIM_U64, DEFAULT_EMBEDDING_MODEL, DEFAULT_FINAL_K, DEFAULT_LOCK_TTL_SECS,
    DEFAULT_NEGATIVE_CACHE_TTL_SECS, DEFAULT_RERANK_ALPHA, DEFAULT_RERANK_MODEL,
    DEFAULT_RESULT_CACHE_TTL_SECS, DEFAULT_RETRIEVAL_K, DEFAULT_TOP_SALES_CACHE_TTL_SECS,
    DEFAULT_VECTOR_CACHE_TTL_SECS, DEFAULT_XSELL_CACHE_TTL_SECS,
};

/// Service configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `RECO_*` overrides on top of defaults.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Qdrant endpoint URL. Default: `http://localhost:6334`.
    pub qdrant_url: String,

    /// Collection holding product points (payload + one named vector per kind).
    pub products_collection: String,

    /// Collection holding interaction events (views, carts, purchases).
    pub events_collection: String,

    /// Max entries in the in-process cache store. Default: `100_000`.
    pub cache_capacity: u64,

    /// Base URL of the OpenAI-compatible embeddings API.
    pub embedding_api_base: String,

    /// API key for the embeddings API (`RECO_EMBEDDING_API_KEY`, then `OPENAI_API_KEY`).
    pub embedding_api_key: Option<String>,

    /// Embedding model id; part of every vector cache key.
    pub embedding_model: String,

    /// Embedding vector dimension used when creating collections.
    pub embedding_dim: u64,

    /// Chat model used for reranking.
    pub rerank_model: String,

    /// Weight of the model score in the blended score, in `[0, 1]`.
    pub rerank_alpha: f32,

    /// Timeout applied to embedding and completion provider calls.
    pub provider_timeout: Duration,

    pub vector_cache_ttl: Duration,
    pub result_cache_ttl: Duration,
    pub negative_cache_ttl: Duration,
    pub xsell_cache_ttl: Duration,
    pub top_sales_cache_ttl: Duration,

    /// TTL of the embedding computation lock (also bounds lock waiters).
    pub lock_ttl: Duration,

    /// Upper bound on embedding acquisition inside a recommendation request.
    pub embedding_wait_timeout: Duration,

    /// Retrieval pool size before rerank/truncation.
    pub retrieval_k: usize,

    /// Default number of returned items.
    pub final_k: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("bind_addr", &self.bind_addr)
            .field("qdrant_url", &self.qdrant_url)
            .field("products_collection", &self.products_collection)
            .field("events_collection", &self.events_collection)
            .field("cache_capacity", &self.cache_capacity)
            .field("embedding_api_base", &self.embedding_api_base)
            .field("embedding_api_key_set", &self.embedding_api_key.is_some())
            .field("embedding_model", &self.embedding_model)
            .field("rerank_model", &self.rerank_model)
            .field("rerank_alpha", &self.rerank_alpha)
            .field("retrieval_k", &self.retrieval_k)
            .field("final_k", &self.final_k)
            .finish_non_exhaustive()
    }
}

/// Default Qdrant URL used when `RECO_QDRANT_URL` is not set.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
/// Default embeddings API base URL.
pub const DEFAULT_EMBEDDING_API_BASE: &str = "https://api.openai.com/v1";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            products_collection: "products".to_string(),
            events_collection: "events".to_string(),
            cache_capacity: 100_000,
            embedding_api_base: DEFAULT_EMBEDDING_API_BASE.to_string(),
            embedding_api_key: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM_U64,
            rerank_model: DEFAULT_RERANK_MODEL.to_string(),
            rerank_alpha: DEFAULT_RERANK_ALPHA,
            provider_timeout: Duration::from_secs(30),
            vector_cache_ttl: Duration::from_secs(DEFAULT_VECTOR_CACHE_TTL_SECS),
            result_cache_ttl: Duration::from_secs(DEFAULT_RESULT_CACHE_TTL_SECS),
            negative_cache_ttl: Duration::from_secs(DEFAULT_NEGATIVE_CACHE_TTL_SECS),
            xsell_cache_ttl: Duration::from_secs(DEFAULT_XSELL_CACHE_TTL_SECS),
            top_sales_cache_ttl: Duration::from_secs(DEFAULT_TOP_SALES_CACHE_TTL_SECS),
            lock_ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECS),
            embedding_wait_timeout: Duration::from_secs(DEFAULT_LOCK_TTL_SECS + 5),
            retrieval_k: DEFAULT_RETRIEVAL_K,
            final_k: DEFAULT_FINAL_K,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "RECO_PORT";
    const ENV_BIND_ADDR: &'static str = "RECO_BIND_ADDR";
    const ENV_QDRANT_URL: &'static str = "RECO_QDRANT_URL";
    const ENV_PRODUCTS_COLLECTION: &'static str = "RECO_PRODUCTS_COLLECTION";
    const ENV_EVENTS_COLLECTION: &'static str = "RECO_EVENTS_COLLECTION";
    const ENV_CACHE_CAPACITY: &'static str = "RECO_CACHE_CAPACITY";
    const ENV_EMBEDDING_API_BASE: &'static str = "RECO_EMBEDDING_API_BASE";
    const ENV_EMBEDDING_API_KEY: &'static str = "RECO_EMBEDDING_API_KEY";
    const ENV_OPENAI_API_KEY: &'static str = "OPENAI_API_KEY";
    const ENV_EMBEDDING_MODEL: &'static str = "RECO_EMBEDDING_MODEL";
    const ENV_EMBEDDING_DIM: &'static str = "RECO_EMBEDDING_DIM";
    const ENV_RERANK_MODEL: &'static str = "RECO_RERANK_MODEL";
    const ENV_RERANK_ALPHA: &'static str = "RECO_RERANK_ALPHA";
    const ENV_PROVIDER_TIMEOUT_SECS: &'static str = "RECO_PROVIDER_TIMEOUT_SECS";
    const ENV_VECTOR_CACHE_TTL_SECS: &'static str = "RECO_VECTOR_CACHE_TTL_SECS";
    const ENV_RESULT_CACHE_TTL_SECS: &'static str = "RECO_RESULT_CACHE_TTL_SECS";
    const ENV_NEGATIVE_CACHE_TTL_SECS: &'static str = "RECO_NEGATIVE_CACHE_TTL_SECS";
    const ENV_XSELL_CACHE_TTL_SECS: &'static str = "RECO_XSELL_CACHE_TTL_SECS";
    const ENV_TOP_SALES_CACHE_TTL_SECS: &'static str = "RECO_TOP_SALES_CACHE_TTL_SECS";
    const ENV_LOCK_TTL_SECS: &'static str = "RECO_LOCK_TTL_SECS";
    const ENV_EMBEDDING_WAIT_TIMEOUT_MS: &'static str = "RECO_EMBEDDING_WAIT_TIMEOUT_MS";
    const ENV_RETRIEVAL_K: &'static str = "RECO_RETRIEVAL_K";
    const ENV_FINAL_K: &'static str = "RECO_FINAL_K";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let rerank_alpha = Self::parse_alpha_from_env(defaults.rerank_alpha)?;

        let embedding_api_key = Self::parse_optional_string_from_env(Self::ENV_EMBEDDING_API_KEY)
            .or_else(|| Self::parse_optional_string_from_env(Self::ENV_OPENAI_API_KEY));

        Ok(Self {
            port,
            bind_addr,
            qdrant_url: Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url),
            products_collection: Self::parse_string_from_env(
                Self::ENV_PRODUCTS_COLLECTION,
                defaults.products_collection,
            ),
            events_collection: Self::parse_string_from_env(
                Self::ENV_EVENTS_COLLECTION,
                defaults.events_collection,
            ),
            cache_capacity: Self::parse_u64_from_env(
                Self::ENV_CACHE_CAPACITY,
                defaults.cache_capacity,
            ),
            embedding_api_base: Self::parse_string_from_env(
                Self::ENV_EMBEDDING_API_BASE,
                defaults.embedding_api_base,
            ),
            embedding_api_key,
            embedding_model: Self::parse_string_from_env(
                Self::ENV_EMBEDDING_MODEL,
                defaults.embedding_model,
            ),
            embedding_dim: Self::parse_u64_from_env(Self::ENV_EMBEDDING_DIM, defaults.embedding_dim),
            rerank_model: Self::parse_string_from_env(Self::ENV_RERANK_MODEL, defaults.rerank_model),
            rerank_alpha,
            provider_timeout: Self::parse_secs_from_env(
                Self::ENV_PROVIDER_TIMEOUT_SECS,
                defaults.provider_timeout,
            ),
            vector_cache_ttl: Self::parse_secs_from_env(
                Self::ENV_VECTOR_CACHE_TTL_SECS,
                defaults.vector_cache_ttl,
            ),
            result_cache_ttl: Self::parse_secs_from_env(
                Self::ENV_RESULT_CACHE_TTL_SECS,
                defaults.result_cache_ttl,
            ),
            negative_cache_ttl: Self::parse_secs_from_env(
                Self::ENV_NEGATIVE_CACHE_TTL_SECS,
                defaults.negative_cache_ttl,
            ),
            xsell_cache_ttl: Self::parse_secs_from_env(
                Self::ENV_XSELL_CACHE_TTL_SECS,
                defaults.xsell_cache_ttl,
            ),
            top_sales_cache_ttl: Self::parse_secs_from_env(
                Self::ENV_TOP_SALES_CACHE_TTL_SECS,
                defaults.top_sales_cache_ttl,
            ),
            lock_ttl: Self::parse_secs_from_env(Self::ENV_LOCK_TTL_SECS, defaults.lock_ttl),
            embedding_wait_timeout: Self::parse_millis_from_env(
                Self::ENV_EMBEDDING_WAIT_TIMEOUT_MS,
                defaults.embedding_wait_timeout,
            ),
            retrieval_k: Self::parse_usize_from_env(Self::ENV_RETRIEVAL_K, defaults.retrieval_k),
            final_k: Self::parse_usize_from_env(Self::ENV_FINAL_K, defaults.final_k),
        })
    }

    /// Validates basic invariants (does not contact any backend).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.rerank_alpha) {
            return Err(ConfigError::InvalidAlpha {
                value: self.rerank_alpha,
            });
        }

        if self.retrieval_k == 0 || self.final_k == 0 || self.final_k > self.retrieval_k {
            return Err(ConfigError::InvalidPoolSizes {
                retrieval_k: self.retrieval_k,
                final_k: self.final_k,
            });
        }

        let ttls = [
            ("vector_cache_ttl", self.vector_cache_ttl),
            ("result_cache_ttl", self.result_cache_ttl),
            ("negative_cache_ttl", self.negative_cache_ttl),
            ("xsell_cache_ttl", self.xsell_cache_ttl),
            ("top_sales_cache_ttl", self.top_sales_cache_ttl),
            ("lock_ttl", self.lock_ttl),
        ];
        for (name, ttl) in ttls {
            if ttl.is_zero() {
                return Err(ConfigError::ZeroDuration { name });
            }
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::EmptyValue {
                name: Self::ENV_EMBEDDING_MODEL,
            });
        }
        if self.rerank_model.trim().is_empty() {
            return Err(ConfigError::EmptyValue {
                name: Self::ENV_RERANK_MODEL,
            });
        }
        if self.embedding_dim == 0 {
            return Err(ConfigError::EmptyValue {
                name: Self::ENV_EMBEDDING_DIM,
            });
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_alpha_from_env(default: f32) -> Result<f32, ConfigError> {
        match env::var(Self::ENV_RERANK_ALPHA) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e| ConfigError::AlphaParseError { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_usize_from_env(var_name: &str, default: usize) -> usize {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_secs_from_env(var_name: &str, default: Duration) -> Duration {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(default)
    }

    fn parse_millis_from_env(var_name: &str, default: Duration) -> Duration {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(default)
    }
}
