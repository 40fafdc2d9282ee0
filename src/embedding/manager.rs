//! Per-(product, kind) embedding acquisition with dogpile protection, and bulk backfill.
//!
//! Lookup order is cache store, then the product's stored vector slot, then the provider.
//! Provider calls for one key are serialized through a [`CacheLock`]; waiters poll until the
//! holder releases and then read the cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::error::EmbeddingError;
use super::provider::EmbeddingProvider;
use crate::cache::{CacheLock, CacheStore, LockAcquisition, VectorCacheRepo};
use crate::catalog::{CatalogStore, EmbeddingSlot, Product};
use crate::constants::{DEFAULT_PROVIDER_BATCH_SIZE, DEFAULT_SCAN_BATCH_SIZE};
use crate::kinds::KindRegistry;

/// Options for [`EmbeddingManager::batch_get_or_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchEmbedOptions {
    /// Recompute even when a cached or stored vector exists.
    pub force: bool,
    /// Persist new vectors on the product.
    pub write_back: bool,
    /// Copy stored vectors found during the scan into the cache.
    pub hydrate_cache: bool,
    pub provider_batch_size: usize,
    pub scan_batch_size: usize,
}

impl Default for BatchEmbedOptions {
    fn default() -> Self {
        Self {
            force: false,
            write_back: true,
            hydrate_cache: true,
            provider_batch_size: DEFAULT_PROVIDER_BATCH_SIZE,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }
}

/// Options for [`EmbeddingManager::vectorize_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorizeOptions {
    /// Applied to every scanned page; `scan_batch_size` is also the page size.
    pub batch: BatchEmbedOptions,
    /// Stop after this many scanned products.
    pub limit: Option<usize>,
}

/// Outcome of a catalog-wide embedding run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorizeStats {
    /// Product ids read from the catalog.
    pub seen: usize,
    /// Totals per kind, in request order.
    pub kinds: Vec<BatchEmbedStats>,
    /// Scan failures; the run stops at the first one.
    pub errors: Vec<String>,
}

/// Outcome of a bulk embedding job for one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEmbedStats {
    pub kind: String,
    pub total_requested: usize,
    pub unique_ids: usize,
    pub cache_hits: usize,
    pub db_hits: usize,
    pub embedded: usize,
    /// Ids with no product, or whose product yields no text.
    pub missing: Vec<String>,
    /// One entry per failed chunk.
    pub errors: Vec<String>,
}

impl BatchEmbedStats {
    fn absorb(&mut self, other: BatchEmbedStats) {
        self.total_requested += other.total_requested;
        self.unique_ids += other.unique_ids;
        self.cache_hits += other.cache_hits;
        self.db_hits += other.db_hits;
        self.embedded += other.embedded;
        self.missing.extend(other.missing);
        self.errors.extend(other.errors);
    }
}

/// Embedding cache, store fallback and provider, coordinated per key.
pub struct EmbeddingManager<S, C, E>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
{
    catalog: Arc<S>,
    vectors: VectorCacheRepo<C>,
    lock: CacheLock<C>,
    provider: Arc<E>,
    kinds: Arc<KindRegistry>,
    write_back: bool,
}

impl<S, C, E> std::fmt::Debug for EmbeddingManager<S, C, E>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingManager")
            .field("model", &self.provider.model_id())
            .field("vectors", &self.vectors)
            .field("lock", &self.lock)
            .field("write_back", &self.write_back)
            .finish_non_exhaustive()
    }
}

impl<S, C, E> EmbeddingManager<S, C, E>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
{
    pub fn new(
        catalog: Arc<S>,
        cache: Arc<C>,
        provider: Arc<E>,
        kinds: Arc<KindRegistry>,
        vector_ttl: Duration,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            vectors: VectorCacheRepo::new(Arc::clone(&cache), provider.model_id(), vector_ttl),
            lock: CacheLock::new(cache, lock_ttl),
            catalog,
            provider,
            kinds,
            write_back: true,
        }
    }

    /// Interval between cache polls while another worker computes.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.lock = self.lock.with_poll_interval(interval);
        self
    }

    /// Whether single computations persist their vector on the product.
    pub fn with_write_back(mut self, write_back: bool) -> Self {
        self.write_back = write_back;
        self
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn vector_cache(&self) -> &VectorCacheRepo<C> {
        &self.vectors
    }

    /// Returns the vector for `(product_id, kind)`, computing it at most once across workers.
    ///
    /// `None` means no vector could be obtained (missing product, empty text, provider
    /// failure, or a lock holder that never produced one).
    #[instrument(skip(self), fields(model = %self.provider.model_id()))]
    pub async fn get_or_create(&self, product_id: &str, kind: &str) -> Option<Vec<f32>> {
        if let Some(vector) = self.vectors.get(product_id, kind).await {
            debug!("vector cache hit");
            return Some(vector);
        }

        if let Some(vector) = self.stored_vector(product_id, kind).await {
            debug!("stored vector hit");
            self.vectors.set(product_id, kind, &vector).await;
            return Some(vector);
        }

        let resource = self.vectors.key(product_id, kind);
        match self.lock.try_acquire(&resource).await {
            LockAcquisition::Acquired(guard) => {
                let vector = self.compute(product_id, kind).await;
                self.lock.release(guard).await;
                vector
            }
            LockAcquisition::Unavailable => self.compute(product_id, kind).await,
            LockAcquisition::Contended => {
                debug!(lock = %resource, "waiting for concurrent embedding");
                if !self.lock.wait_released(&resource).await {
                    warn!(lock = %resource, "embedding lock wait timed out");
                }
                self.vectors.get(product_id, kind).await
            }
        }
    }

    async fn stored_vector(&self, product_id: &str, kind: &str) -> Option<Vec<f32>> {
        let ids = [product_id.to_string()];
        match self.catalog.find_embeddings(&ids, kind).await {
            Ok(mut found) => found.remove(product_id).filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(error = %e, "stored vector lookup failed");
                None
            }
        }
    }

    async fn compute(&self, product_id: &str, kind: &str) -> Option<Vec<f32>> {
        if let Some(vector) = self.vectors.get(product_id, kind).await {
            return Some(vector);
        }

        let product = match self.catalog.find_product(product_id).await {
            Ok(Some(product)) => product,
            Ok(None) => {
                debug!("product not found, nothing to embed");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "product lookup failed");
                return None;
            }
        };

        let text = self.kinds.text_for(kind, &product);
        if text.trim().is_empty() {
            debug!("empty embedding text");
            return None;
        }

        let vector = match self.provider.embed(std::slice::from_ref(&text)).await {
            Ok(mut vectors) if vectors.len() == 1 => vectors.pop().filter(|v| !v.is_empty())?,
            Ok(vectors) => {
                let e = EmbeddingError::CountMismatch {
                    expected: 1,
                    actual: vectors.len(),
                };
                warn!(error = %e, "embedding provider misbehaved");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "embedding failed");
                return None;
            }
        };

        self.vectors.set(product_id, kind, &vector).await;
        if self.write_back {
            self.persist(product_id, kind, &vector).await;
        }
        Some(vector)
    }

    async fn persist(&self, product_id: &str, kind: &str, vector: &[f32]) {
        let slot = EmbeddingSlot::new(self.provider.model_id(), vector.to_vec());
        if let Err(e) = self.catalog.store_embedding(product_id, kind, slot).await {
            warn!(product_id, kind, error = %e, "embedding write-back failed");
        }
    }

    /// Ensures every id has a vector of `kind`, in bounded sequential chunks.
    ///
    /// Failures are recorded per chunk in the returned stats; the job itself never fails.
    #[instrument(skip(self, product_ids), fields(requested = product_ids.len()))]
    pub async fn batch_get_or_create(
        &self,
        product_ids: &[String],
        kind: &str,
        options: BatchEmbedOptions,
    ) -> BatchEmbedStats {
        let scan_batch = options.scan_batch_size.max(1);
        let provider_batch = options.provider_batch_size.max(1);

        let mut seen = HashSet::new();
        let unique: Vec<String> = product_ids
            .iter()
            .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut stats = BatchEmbedStats {
            kind: kind.to_string(),
            total_requested: product_ids.len(),
            unique_ids: unique.len(),
            ..Default::default()
        };

        let mut pending = unique;
        if !options.force {
            pending = self.cache_pass(pending, kind, &mut stats).await;
            pending = self
                .store_pass(pending, kind, scan_batch, options.hydrate_cache, &mut stats)
                .await;
        }

        for chunk in pending.chunks(scan_batch) {
            let products = match self.catalog.find_products(chunk).await {
                Ok(products) => products,
                Err(e) => {
                    stats.errors.push(format!("product load failed: {e}"));
                    continue;
                }
            };
            let by_id: HashMap<&str, &Product> =
                products.iter().map(|p| (p.product_id.as_str(), p)).collect();

            let mut work: Vec<(&str, String)> = Vec::with_capacity(chunk.len());
            for id in chunk {
                let Some(product) = by_id.get(id.as_str()) else {
                    stats.missing.push(id.clone());
                    continue;
                };
                let text = self.kinds.text_for(kind, product);
                if text.trim().is_empty() {
                    stats.missing.push(id.clone());
                    continue;
                }
                work.push((id.as_str(), text));
            }

            for batch in work.chunks(provider_batch) {
                let texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
                let vectors = match self.provider.embed(&texts).await {
                    Ok(vectors) if vectors.len() == texts.len() => vectors,
                    Ok(vectors) => {
                        let e = EmbeddingError::CountMismatch {
                            expected: texts.len(),
                            actual: vectors.len(),
                        };
                        warn!(error = %e, "skipping embedding chunk");
                        stats.errors.push(e.to_string());
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "embedding chunk failed");
                        stats.errors.push(e.to_string());
                        continue;
                    }
                };

                for ((id, _), vector) in batch.iter().zip(vectors) {
                    self.vectors.set(id, kind, &vector).await;
                    if options.write_back {
                        self.persist(id, kind, &vector).await;
                    }
                    stats.embedded += 1;
                }
            }
        }

        info!(
            kind,
            unique = stats.unique_ids,
            cache_hits = stats.cache_hits,
            db_hits = stats.db_hits,
            embedded = stats.embedded,
            missing = stats.missing.len(),
            errors = stats.errors.len(),
            "batch embedding complete"
        );
        stats
    }

    /// Scans the whole catalog page by page and backfills every kind for each page.
    #[instrument(
        skip(self, kinds, options),
        fields(kinds = kinds.len(), limit = ?options.limit)
    )]
    pub async fn vectorize_catalog(
        &self,
        kinds: &[String],
        options: VectorizeOptions,
    ) -> VectorizeStats {
        let page_size = options.batch.scan_batch_size.max(1);
        let mut stats = VectorizeStats {
            kinds: kinds
                .iter()
                .map(|kind| BatchEmbedStats {
                    kind: kind.clone(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let mut cursor = None;
        loop {
            let remaining = options.limit.map(|l| l.saturating_sub(stats.seen));
            if remaining == Some(0) {
                break;
            }
            let size = remaining.map_or(page_size, |r| r.min(page_size));

            let page = match self.catalog.scan_product_ids(cursor, size).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, seen = stats.seen, "catalog scan failed");
                    stats.errors.push(format!("catalog scan failed: {e}"));
                    break;
                }
            };

            let mut ids = page.product_ids;
            if let Some(r) = remaining {
                ids.truncate(r);
            }
            stats.seen += ids.len();
            if !ids.is_empty() {
                for total in &mut stats.kinds {
                    let kind = total.kind.clone();
                    total.absorb(self.batch_get_or_create(&ids, &kind, options.batch).await);
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            seen = stats.seen,
            embedded = stats.kinds.iter().map(|k| k.embedded).sum::<usize>(),
            errors = stats.errors.len(),
            "catalog vectorization complete"
        );
        stats
    }

    async fn cache_pass(
        &self,
        ids: Vec<String>,
        kind: &str,
        stats: &mut BatchEmbedStats,
    ) -> Vec<String> {
        let mut remaining = Vec::with_capacity(ids.len());
        for id in ids {
            if self.vectors.get(&id, kind).await.is_some() {
                stats.cache_hits += 1;
            } else {
                remaining.push(id);
            }
        }
        remaining
    }

    async fn store_pass(
        &self,
        ids: Vec<String>,
        kind: &str,
        scan_batch: usize,
        hydrate_cache: bool,
        stats: &mut BatchEmbedStats,
    ) -> Vec<String> {
        let mut remaining = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(scan_batch) {
            let found = match self.catalog.find_embeddings(chunk, kind).await {
                Ok(found) => found,
                Err(e) => {
                    stats.errors.push(format!("stored vector scan failed: {e}"));
                    remaining.extend_from_slice(chunk);
                    continue;
                }
            };

            for id in chunk {
                match found.get(id).filter(|v| !v.is_empty()) {
                    Some(vector) => {
                        stats.db_hits += 1;
                        if hydrate_cache {
                            self.vectors.set(id, kind, vector).await;
                        }
                    }
                    None => remaining.push(id.clone()),
                }
            }
        }
        remaining
    }
}
