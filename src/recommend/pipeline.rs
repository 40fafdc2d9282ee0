//! Similarity-style recommendation pipeline.
//!
//! `CheckResultCache → LoadSource → GetEmbedding → DeriveFilters → Retrieve → [Rerank] →
//! TruncateAndCache`. Only malformed input is an error; every other failure degrades.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::error::{RecommendError, RecommendResult};
use super::settings::RecommenderSettings;
use super::types::{
    ApiVersion, RecommendRequest, RecommendationItem, RecommendationResult, RerankMode,
};
use crate::cache::{CacheStore, ResultCacheRepo, ResultKey, ResultSource};
use crate::catalog::{CatalogStore, Clause, Product};
use crate::constants::MAX_LIMIT;
use crate::embedding::{EmbeddingManager, EmbeddingProvider};
use crate::kinds::KindRegistry;
use crate::rerank::{CompletionProvider, RerankValidator};
use crate::retrieval::{RetrievalAdapter, RetrievalRequest};

const NEGATIVE_KIND: &str = "missing";

/// Recommendation orchestrator over injected store, cache and providers.
pub struct Recommender<S, C, E, P>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
    P: CompletionProvider,
{
    pub(super) catalog: Arc<S>,
    pub(super) cache: Arc<C>,
    pub(super) results: ResultCacheRepo<C>,
    pub(super) embeddings: EmbeddingManager<S, C, E>,
    pub(super) retrieval: RetrievalAdapter<S>,
    pub(super) reranker: RerankValidator<P>,
    pub(super) kinds: Arc<KindRegistry>,
    pub(super) settings: RecommenderSettings,
}

impl<S, C, E, P> std::fmt::Debug for Recommender<S, C, E, P>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
    P: CompletionProvider,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("embeddings", &self.embeddings)
            .field("reranker", &self.reranker)
            .field("kinds", &self.kinds.names())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S, C, E, P> Recommender<S, C, E, P>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
    P: CompletionProvider,
{
    pub fn new(
        catalog: Arc<S>,
        cache: Arc<C>,
        embedder: Arc<E>,
        completer: Arc<P>,
        kinds: Arc<KindRegistry>,
        settings: RecommenderSettings,
    ) -> Self {
        let embeddings = EmbeddingManager::new(
            Arc::clone(&catalog),
            Arc::clone(&cache),
            embedder,
            Arc::clone(&kinds),
            settings.vector_ttl,
            settings.lock_ttl,
        )
        .with_poll_interval(settings.lock_poll_interval);

        Self {
            results: ResultCacheRepo::new(Arc::clone(&cache)),
            retrieval: RetrievalAdapter::new(Arc::clone(&catalog), Arc::clone(&kinds)),
            reranker: RerankValidator::new(completer, Arc::clone(&kinds))
                .with_alpha(settings.rerank_alpha),
            embeddings,
            catalog,
            cache,
            kinds,
            settings,
        }
    }

    pub fn catalog(&self) -> &Arc<S> {
        &self.catalog
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    pub fn embeddings(&self) -> &EmbeddingManager<S, C, E> {
        &self.embeddings
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    pub fn settings(&self) -> &RecommenderSettings {
        &self.settings
    }

    pub async fn recommend(
        &self,
        request: &RecommendRequest,
    ) -> RecommendResult<RecommendationResult> {
        self.recommend_traced(request)
            .await
            .map(|(result, _)| result)
    }

    /// Like [`Self::recommend`], also reporting where the result came from.
    #[instrument(skip_all, fields(product_id = %request.product_id, kind = %request.kind, limit = request.limit, rerank = request.rerank.as_str()))]
    pub async fn recommend_traced(
        &self,
        request: &RecommendRequest,
    ) -> RecommendResult<(RecommendationResult, ResultSource)> {
        validate_product_id(&request.product_id)?;
        validate_limit(request.limit)?;
        let spec = self
            .kinds
            .get(&request.kind)
            .ok_or_else(|| RecommendError::UnknownKind {
                kind: request.kind.clone(),
            })?;

        let requested_key = self.result_key(request, request.rerank);
        if let Some(cached) = self.results.get::<RecommendationResult>(&requested_key).await {
            return Ok((cached, ResultSource::CacheHit));
        }

        let negative_key = negative_key(request.api_version, &request.product_id);
        if let Some(cached) = self.results.get::<RecommendationResult>(&negative_key).await {
            debug!("negative cache hit");
            return Ok((cached, ResultSource::NegativeHit));
        }

        let source = match self.catalog.find_product(&request.product_id).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                info!("source product not found");
                let empty = RecommendationResult::empty(&request.product_id);
                self.results
                    .set(&negative_key, &empty, self.settings.negative_ttl)
                    .await;
                return Ok((empty, ResultSource::Computed));
            }
            Err(e) => {
                warn!(error = %e, "source lookup failed");
                return Ok((
                    RecommendationResult::empty(&request.product_id),
                    ResultSource::Computed,
                ));
            }
        };

        let vector = self.acquire_embedding(&request.product_id, &request.kind).await;

        let mut filters = request
            .filters
            .clone()
            .unwrap_or_else(|| spec.default_filters(&source));
        filters.push(Clause::equals("product_id", source.product_id.as_str()).negate());

        let fallback_text = if request.use_text_fallback {
            spec.fallback_query(&source)
        } else {
            String::new()
        };

        let pool = self.settings.retrieval_k.max(request.limit);
        let retrieved = self
            .retrieval
            .retrieve(RetrievalRequest {
                kind: &request.kind,
                vector: vector.as_deref(),
                fallback_text: &fallback_text,
                filters: Some(&filters),
                k: pool,
            })
            .await;
        debug!(candidates = retrieved.candidates.len(), path = ?retrieved.path, "retrieved");

        let mut items: Vec<RecommendationItem> = retrieved
            .candidates
            .into_iter()
            .filter(|c| c.product_id != source.product_id)
            .map(|c| RecommendationItem::new(c.product_id, c.score))
            .collect();

        let mut applied = RerankMode::Off;
        if request.rerank.is_enabled() {
            let docs = self.candidate_docs(&items).await;
            let outcome = self
                .reranker
                .rerank(
                    &request.kind,
                    &source,
                    &items,
                    &docs,
                    request.rerank.includes_rationale(),
                )
                .await;
            if outcome.applied {
                applied = request.rerank;
                items = outcome.items;
            } else {
                let off_key = self.result_key(request, RerankMode::Off);
                if let Some(cached) = self.results.get::<RecommendationResult>(&off_key).await {
                    debug!("rerank unavailable, serving cached non-reranked result");
                    return Ok((cached, ResultSource::FallbackHit));
                }
            }
        }

        sort_by_score(&mut items);
        items.truncate(request.limit);
        let result = RecommendationResult::new(&request.product_id, items);

        let key = self.result_key(request, applied);
        self.results
            .set(&key, &result, self.settings.result_ttl)
            .await;
        info!(count = result.count(), applied = applied.as_str(), "recommendation computed");

        Ok((result, ResultSource::Computed))
    }

    /// Embedding for the source, bounded by the wait timeout. Failure yields `None`.
    async fn acquire_embedding(&self, product_id: &str, kind: &str) -> Option<Vec<f32>> {
        match tokio::time::timeout(
            self.settings.embedding_wait_timeout,
            self.embeddings.get_or_create(product_id, kind),
        )
        .await
        {
            Ok(vector) => vector,
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.embedding_wait_timeout.as_millis() as u64,
                    "embedding acquisition timed out"
                );
                None
            }
        }
    }

    pub(super) async fn candidate_docs(&self, items: &[RecommendationItem]) -> Vec<Product> {
        if items.is_empty() {
            return Vec::new();
        }
        let ids: Vec<String> = items.iter().map(|i| i.product_id.clone()).collect();
        match self.catalog.find_products(&ids).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "candidate lookup failed");
                Vec::new()
            }
        }
    }

    fn result_key(&self, request: &RecommendRequest, mode: RerankMode) -> String {
        let mut params = json!({
            "filters": request.filters,
            "model": self.embeddings.model_id(),
            "limit": request.limit,
            "rerank": mode.as_str(),
            "text_fallback": request.use_text_fallback,
        });
        if mode.is_enabled() {
            params["rerank_model"] = json!(self.reranker.model_id());
            params["alpha"] = json!(self.reranker.alpha());
        }

        ResultKey {
            version: request.api_version.as_str(),
            kind: &request.kind,
            product_id: &request.product_id,
            params,
        }
        .render()
    }
}

fn negative_key(version: ApiVersion, product_id: &str) -> String {
    ResultKey {
        version: version.as_str(),
        kind: NEGATIVE_KIND,
        product_id,
        params: serde_json::Value::Null,
    }
    .render()
}

pub(super) fn validate_product_id(product_id: &str) -> RecommendResult<()> {
    if product_id.trim().is_empty() {
        return Err(RecommendError::invalid("product_id must not be empty"));
    }
    Ok(())
}

pub(super) fn validate_limit(limit: usize) -> RecommendResult<()> {
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(RecommendError::invalid(format!(
            "limit must be within 1..={MAX_LIMIT}, got {limit}"
        )));
    }
    Ok(())
}

/// Stable descending sort; ties keep their order.
pub(super) fn sort_by_score(items: &mut [RecommendationItem]) {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
}
