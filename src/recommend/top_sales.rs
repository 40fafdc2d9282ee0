//! Best-seller listing over purchase events.

use serde_json::json;
use tracing::{info, instrument, warn};

use super::error::RecommendResult;
use super::pipeline::{Recommender, validate_limit};
use super::types::{TopSalesItem, TopSalesRequest, TopSalesResult};
use crate::cache::{CacheStore, ResultCacheRepo, ResultSource};
use crate::catalog::{CatalogStore, SalesQuery};
use crate::constants::TOP_SALES_CACHE_PREFIX;
use crate::embedding::EmbeddingProvider;
use crate::rerank::CompletionProvider;

impl<S, C, E, P> Recommender<S, C, E, P>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
    P: CompletionProvider,
{
    pub async fn top_sales(&self, request: &TopSalesRequest) -> RecommendResult<TopSalesResult> {
        self.top_sales_traced(request)
            .await
            .map(|(result, _)| result)
    }

    /// Store failures return an empty, uncached listing.
    #[instrument(skip_all, fields(limit = request.limit))]
    pub async fn top_sales_traced(
        &self,
        request: &TopSalesRequest,
    ) -> RecommendResult<(TopSalesResult, ResultSource)> {
        validate_limit(request.limit)?;

        let key = ResultCacheRepo::<C>::prefixed_key(
            TOP_SALES_CACHE_PREFIX,
            &json!({
                "version": request.api_version.as_str(),
                "limit": request.limit,
                "brands": request.brands,
                "category_ids": request.category_ids,
            }),
        );
        if let Some(cached) = self.results.get::<TopSalesResult>(&key).await {
            return Ok((cached, ResultSource::CacheHit));
        }

        let query = SalesQuery {
            limit: request.limit,
            brands: &request.brands,
            category_ids: &request.category_ids,
        };
        let counts = match self.catalog.sales_ranking(query).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "sales ranking failed");
                return Ok((TopSalesResult::new(Vec::new()), ResultSource::Computed));
            }
        };

        let items = counts
            .into_iter()
            .take(request.limit)
            .map(|c| TopSalesItem {
                product_id: c.product_id,
                units: c.units,
                orders: c.orders,
            })
            .collect();
        let result = TopSalesResult::new(items);

        self.results
            .set(&key, &result, self.settings.top_sales_ttl)
            .await;
        info!(count = result.count(), "top sales computed");

        Ok((result, ResultSource::Computed))
    }
}
