//! Co-purchase ("bought together") recommendations.

use std::collections::{HashMap, HashSet};

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::error::RecommendResult;
use super::pipeline::{Recommender, sort_by_score, validate_limit, validate_product_id};
use super::types::{CrossSellRequest, RecommendationItem, RecommendationResult};
use crate::cache::{CacheStore, ResultCacheRepo, ResultSource};
use crate::catalog::{CatalogStore, CoPurchaseCount, CoPurchaseQuery, EventType, Product};
use crate::constants::XSELL_CACHE_PREFIX;
use crate::embedding::EmbeddingProvider;
use crate::kinds::KIND_XSELL;
use crate::rerank::CompletionProvider;

/// Co-purchase candidates mined per requested item.
const MINING_FACTOR: usize = 4;

impl<S, C, E, P> Recommender<S, C, E, P>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
    P: CompletionProvider,
{
    pub async fn cross_sell(
        &self,
        request: &CrossSellRequest,
    ) -> RecommendResult<RecommendationResult> {
        self.cross_sell_traced(request)
            .await
            .map(|(result, _)| result)
    }

    #[instrument(skip_all, fields(product_id = %request.product_id, user_id = ?request.user_id, limit = request.limit))]
    pub async fn cross_sell_traced(
        &self,
        request: &CrossSellRequest,
    ) -> RecommendResult<(RecommendationResult, ResultSource)> {
        validate_product_id(&request.product_id)?;
        validate_limit(request.limit)?;

        let key = ResultCacheRepo::<C>::prefixed_key(
            XSELL_CACHE_PREFIX,
            &json!({
                "version": request.api_version.as_str(),
                "product_id": request.product_id,
                "user_id": request.user_id,
                "limit": request.limit,
                "rerank": request.rerank.as_str(),
                "brands": request.brands,
                "category_ids": request.category_ids,
                "exclude_purchased": request.exclude_purchased,
                "exclude_in_cart": request.exclude_in_cart,
            }),
        );
        if let Some(cached) = self.results.get::<RecommendationResult>(&key).await {
            return Ok((cached, ResultSource::CacheHit));
        }

        let mined = self.mine_co_purchases(request).await;
        let excluded = self.exclusions(request).await;
        let mut counts: Vec<CoPurchaseCount> = mined
            .into_iter()
            .filter(|c| !excluded.contains(&c.product_id))
            .collect();
        debug!(candidates = counts.len(), excluded = excluded.len(), "co-purchases mined");

        let needs_docs = request.rerank.is_enabled()
            || !request.brands.is_empty()
            || !request.category_ids.is_empty();
        let docs = if needs_docs && !counts.is_empty() {
            let ids: Vec<String> = counts.iter().map(|c| c.product_id.clone()).collect();
            match self.catalog.find_products(&ids).await {
                Ok(docs) => docs,
                Err(e) => {
                    warn!(error = %e, "candidate lookup failed");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        if !request.brands.is_empty() || !request.category_ids.is_empty() {
            let by_id: HashMap<&str, &Product> =
                docs.iter().map(|p| (p.product_id.as_str(), p)).collect();
            counts.retain(|c| {
                by_id
                    .get(c.product_id.as_str())
                    .is_some_and(|p| matches_attributes(p, &request.brands, &request.category_ids))
            });
        }

        let mut items = normalize_counts(&counts);

        if request.rerank.is_enabled() && !items.is_empty() {
            match self.catalog.find_product(&request.product_id).await {
                Ok(Some(source)) => {
                    let outcome = self
                        .reranker
                        .rerank(
                            KIND_XSELL,
                            &source,
                            &items,
                            &docs,
                            request.rerank.includes_rationale(),
                        )
                        .await;
                    items = outcome.items;
                }
                Ok(None) => debug!("source product not found, skipping rerank"),
                Err(e) => warn!(error = %e, "source lookup failed, skipping rerank"),
            }
        }

        sort_by_score(&mut items);
        items.truncate(request.limit);
        let result = RecommendationResult::new(&request.product_id, items);

        self.results
            .set(&key, &result, self.settings.xsell_ttl)
            .await;
        info!(count = result.count(), "cross-sell computed");

        Ok((result, ResultSource::Computed))
    }

    async fn mine_co_purchases(&self, request: &CrossSellRequest) -> Vec<CoPurchaseCount> {
        let query = CoPurchaseQuery {
            product_id: &request.product_id,
            user_id: request.user_id.as_deref(),
            limit: request.limit.saturating_mul(MINING_FACTOR),
        };
        match self.catalog.co_purchases(query).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "co-purchase mining failed");
                Vec::new()
            }
        }
    }

    /// The target plus, for a known user, the products they bought or carted.
    async fn exclusions(&self, request: &CrossSellRequest) -> HashSet<String> {
        let mut excluded = HashSet::from([request.product_id.clone()]);
        let Some(user_id) = request.user_id.as_deref() else {
            return excluded;
        };

        let (purchased, carted) = tokio::join!(
            self.user_history(user_id, EventType::Purchase, request.exclude_purchased),
            self.user_history(user_id, EventType::AddToCart, request.exclude_in_cart),
        );
        excluded.extend(purchased);
        excluded.extend(carted);
        excluded
    }

    async fn user_history(
        &self,
        user_id: &str,
        event_type: EventType,
        enabled: bool,
    ) -> HashSet<String> {
        if !enabled {
            return HashSet::new();
        }
        match self.catalog.user_product_ids(user_id, event_type).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, event = event_type.as_str(), "user history lookup failed");
                HashSet::new()
            }
        }
    }
}

fn matches_attributes(product: &Product, brands: &[String], category_ids: &[String]) -> bool {
    let brand_ok = brands.is_empty()
        || product
            .brand
            .as_ref()
            .is_some_and(|b| brands.iter().any(|wanted| wanted == b));
    let category_ok = category_ids.is_empty()
        || product
            .category_id
            .as_ref()
            .is_some_and(|c| category_ids.iter().any(|wanted| wanted == c));
    brand_ok && category_ok
}

/// Scales co-occurrence counts by the largest count, keeping mining order.
pub fn normalize_counts(counts: &[CoPurchaseCount]) -> Vec<RecommendationItem> {
    let max = counts.iter().map(|c| c.count).max().unwrap_or(0);
    counts
        .iter()
        .map(|c| {
            let score = if max == 0 {
                0.0
            } else {
                c.count as f32 / max as f32
            };
            RecommendationItem::new(c.product_id.clone(), score)
        })
        .collect()
}
