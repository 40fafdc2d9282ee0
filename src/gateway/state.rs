use std::sync::Arc;

use crate::cache::CacheStore;
use crate::catalog::CatalogStore;
use crate::embedding::EmbeddingProvider;
use crate::recommend::Recommender;
use crate::rerank::CompletionProvider;

/// Shared handler state; cloning is a reference-count bump.
pub struct HandlerState<S, C, E, P>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
    P: CompletionProvider,
{
    pub recommender: Arc<Recommender<S, C, E, P>>,
}

impl<S, C, E, P> HandlerState<S, C, E, P>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
    P: CompletionProvider,
{
    pub fn new(recommender: Arc<Recommender<S, C, E, P>>) -> Self {
        Self { recommender }
    }
}

impl<S, C, E, P> Clone for HandlerState<S, C, E, P>
where
    S: CatalogStore,
    C: CacheStore,
    E: EmbeddingProvider,
    P: CompletionProvider,
{
    fn clone(&self) -> Self {
        Self {
            recommender: Arc::clone(&self.recommender),
        }
    }
}
