//! Production wiring: concrete clients built from [`Config`] and injected into a [`Recommender`].

use std::sync::Arc;

use tracing::info;

use super::error::ContextError;
use super::pipeline::Recommender;
use super::settings::RecommenderSettings;
use crate::cache::MemoryCacheStore;
use crate::catalog::{CatalogResult, QdrantCatalog};
use crate::config::Config;
use crate::embedding::OpenAiEmbedder;
use crate::kinds::KindRegistry;
use crate::rerank::GenaiCompleter;

pub type ServiceRecommender =
    Recommender<QdrantCatalog, MemoryCacheStore, OpenAiEmbedder, GenaiCompleter>;

/// Everything a server process shares across requests.
#[derive(Clone)]
pub struct ServiceContext {
    pub config: Config,
    pub recommender: Arc<ServiceRecommender>,
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("recommender", &self.recommender)
            .finish_non_exhaustive()
    }
}

impl ServiceContext {
    pub fn from_config(config: Config) -> Result<Self, ContextError> {
        let catalog = QdrantCatalog::new(
            &config.qdrant_url,
            &config.products_collection,
            &config.events_collection,
        )?;
        let cache = MemoryCacheStore::with_capacity(config.cache_capacity);
        let embedder = OpenAiEmbedder::from_config(&config)?;
        let completer = GenaiCompleter::new(config.rerank_model.clone(), config.provider_timeout);

        let recommender = Recommender::new(
            Arc::new(catalog),
            Arc::new(cache),
            Arc::new(embedder),
            Arc::new(completer),
            Arc::new(KindRegistry::with_defaults()),
            RecommenderSettings::from_config(&config),
        );

        Ok(Self {
            config,
            recommender: Arc::new(recommender),
        })
    }

    /// Creates the products collection with one named vector per registered kind.
    pub async fn ensure_collections(&self) -> CatalogResult<()> {
        let kinds = self.recommender.kinds().names();
        self.recommender
            .catalog()
            .ensure_products_collection(&kinds, self.config.embedding_dim)
            .await?;
        info!(
            collection = %self.config.products_collection,
            kinds = kinds.len(),
            "collections ready"
        );
        Ok(())
    }
}
