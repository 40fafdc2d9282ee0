//! Serialized results in the cache store.
//!
//! Recommendation keys are `{version}:{kind}:{product_id}:{fingerprint}` where the fingerprint
//! covers every parameter that changes the response (filters, model, limit, rerank mode).

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::store::CacheStore;
use crate::hashing::fingerprint;

/// Components of a recommendation result key.
#[derive(Debug, Clone)]
pub struct ResultKey<'a> {
    pub version: &'a str,
    pub kind: &'a str,
    pub product_id: &'a str,
    /// Every response-shaping parameter, as JSON.
    pub params: serde_json::Value,
}

impl ResultKey<'_> {
    pub fn render(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.version,
            self.kind,
            self.product_id,
            fingerprint(&self.params)
        )
    }
}

/// Typed JSON access to cached results. Store failures degrade to miss/no-op.
pub struct ResultCacheRepo<C: CacheStore> {
    store: Arc<C>,
}

impl<C: CacheStore> std::fmt::Debug for ResultCacheRepo<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCacheRepo").finish_non_exhaustive()
    }
}

impl<C: CacheStore> ResultCacheRepo<C> {
    pub fn new(store: Arc<C>) -> Self {
        Self { store }
    }

    /// Key for an arbitrary prefix and parameter set (e.g. `xsell`, `top_sales`).
    pub fn prefixed_key(prefix: &str, params: &serde_json::Value) -> String {
        format!("{prefix}:{}", fingerprint(params))
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %key, error = %e, "result cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = %key, "result cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "discarding undecodable cached result");
                None
            }
        }
    }

    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %key, error = %e, "result encode failed");
                return;
            }
        };

        if let Err(e) = self.store.set(key, encoded, ttl).await {
            warn!(key = %key, error = %e, "result cache write failed");
        }
    }
}
