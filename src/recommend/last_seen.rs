//! Recently viewed products of a user, read straight from the event store.

use tracing::{info, instrument};

use super::error::{RecommendError, RecommendResult};
use super::pipeline::Recommender;
use super::types::{LastSeenItem, LastSeenRequest, LastSeenResult};
use crate::cache::CacheStore;
use crate::catalog::CatalogStore;
use crate::constants::MAX_LAST_SEEN_LIMIT;
use crate::embedding::EmbeddingProvider;
use crate::rerank::CompletionProvider;

impl<S, C, E, P> Recommender<S, C, E, P>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
    P: CompletionProvider,
{
    /// Uncached. An empty result means the user has no view events.
    #[instrument(skip_all, fields(user_id = %request.user_id, limit = request.limit))]
    pub async fn last_seen(&self, request: &LastSeenRequest) -> RecommendResult<LastSeenResult> {
        if request.user_id.trim().is_empty() {
            return Err(RecommendError::invalid("user_id must not be empty"));
        }
        if !(1..=MAX_LAST_SEEN_LIMIT).contains(&request.limit) {
            return Err(RecommendError::invalid(format!(
                "limit must be within 1..={MAX_LAST_SEEN_LIMIT}, got {}",
                request.limit
            )));
        }

        let ids = self
            .catalog
            .last_seen_products(&request.user_id, request.limit)
            .await
            .map_err(|e| RecommendError::StoreUnavailable {
                reason: e.to_string(),
            })?;

        let result = LastSeenResult::new(
            ids.into_iter()
                .map(|product_id| LastSeenItem { product_id })
                .collect(),
        );
        info!(count = result.count(), "last seen computed");
        Ok(result)
    }
}
