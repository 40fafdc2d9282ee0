//! Embedding vectors in the cache store, keyed by model, product and kind.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::store::CacheStore;
use crate::constants::VECTOR_CACHE_PREFIX;
use crate::hashing::model_tag;

/// Typed access to cached embedding vectors.
///
/// Store failures degrade: reads become misses and writes become no-ops.
pub struct VectorCacheRepo<C: CacheStore> {
    store: Arc<C>,
    model_tag: String,
    ttl: Duration,
}

impl<C: CacheStore> std::fmt::Debug for VectorCacheRepo<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorCacheRepo")
            .field("model_tag", &self.model_tag)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<C: CacheStore> VectorCacheRepo<C> {
    pub fn new(store: Arc<C>, model: &str, ttl: Duration) -> Self {
        Self {
            store,
            model_tag: model_tag(model),
            ttl,
        }
    }

    /// `vec:{model_tag}:{product_id}:{kind}`
    pub fn key(&self, product_id: &str, kind: &str) -> String {
        format!(
            "{VECTOR_CACHE_PREFIX}:{}:{product_id}:{kind}",
            self.model_tag
        )
    }

    pub async fn get(&self, product_id: &str, kind: &str) -> Option<Vec<f32>> {
        let key = self.key(product_id, kind);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %key, error = %e, "vector cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<Vec<f32>>(&raw) {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "discarding undecodable cached vector");
                None
            }
        }
    }

    pub async fn set(&self, product_id: &str, kind: &str, vector: &[f32]) {
        let key = self.key(product_id, kind);
        let encoded = match serde_json::to_string(vector) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %key, error = %e, "vector encode failed");
                return;
            }
        };

        if let Err(e) = self.store.set(&key, encoded, self.ttl).await {
            warn!(key = %key, error = %e, "vector cache write failed");
        }
    }
}
