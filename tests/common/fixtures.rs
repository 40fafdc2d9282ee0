//! Shared catalog fixtures and recommender wiring over the mock capabilities.

use std::sync::Arc;
use std::time::Duration;

use reco::cache::CacheStore;
use reco::catalog::{Interaction, MockCatalog, Product};
use reco::embedding::MockEmbedder;
use reco::kinds::KindRegistry;
use reco::recommend::{Recommender, RecommenderSettings};
use reco::rerank::MockCompleter;

pub const MOCK_MODEL: &str = "mock-embedding";
pub const EMBEDDING_DIM: usize = 4;

pub type MockRecommender<C> = Recommender<MockCatalog, C, MockEmbedder, MockCompleter>;

pub struct Fixture<C: CacheStore> {
    pub catalog: Arc<MockCatalog>,
    pub cache: Arc<C>,
    pub embedder: Arc<MockEmbedder>,
    pub completer: Arc<MockCompleter>,
    pub recommender: Arc<MockRecommender<C>>,
}

/// Belts around a source `p0`, one out of stock, one scarf in another category.
pub fn products() -> Vec<Product> {
    vec![
        Product::new("p0", "Leather Belt")
            .with_brand("Acme")
            .with_category("belts")
            .with_description("Full grain leather belt")
            .with_tags(["leather", "belt"])
            .with_stock(5)
            .with_vector("sim", MOCK_MODEL, vec![1.0, 0.0, 0.0, 0.0]),
        Product::new("p1", "Brown Belt")
            .with_brand("Acme")
            .with_category("belts")
            .with_stock(3)
            .with_vector("sim", MOCK_MODEL, vec![0.9, 0.1, 0.0, 0.0]),
        Product::new("p2", "Black Belt")
            .with_brand("Other")
            .with_category("belts")
            .with_stock(3)
            .with_vector("sim", MOCK_MODEL, vec![0.6, 0.8, 0.0, 0.0]),
        Product::new("p3", "Wide Belt")
            .with_category("belts")
            .with_stock(0)
            .with_vector("sim", MOCK_MODEL, vec![1.0, 0.0, 0.0, 0.0]),
        Product::new("p4", "Wool Scarf")
            .with_brand("Knit")
            .with_category("scarves")
            .with_tags(["leather"])
            .with_stock(2)
            .with_vector("sim", MOCK_MODEL, vec![1.0, 0.0, 0.0, 0.0]),
    ]
}

pub fn catalog() -> MockCatalog {
    let catalog = MockCatalog::with_products(products());
    catalog.insert_event(Interaction::purchase("p0", "o1"));
    catalog.insert_event(Interaction::purchase("p1", "o1"));
    catalog.insert_event(Interaction::purchase("p0", "o2"));
    catalog.insert_event(Interaction::purchase("p1", "o2"));
    catalog.insert_event(Interaction::purchase("p0", "o3"));
    catalog.insert_event(Interaction::purchase("p4", "o3").with_quantity(4));
    catalog
}

pub fn fixture<C: CacheStore>(
    catalog: MockCatalog,
    cache: C,
    embedder: MockEmbedder,
    completer: MockCompleter,
) -> Fixture<C> {
    let catalog = Arc::new(catalog);
    let cache = Arc::new(cache);
    let embedder = Arc::new(embedder);
    let completer = Arc::new(completer);
    let recommender = Recommender::new(
        Arc::clone(&catalog),
        Arc::clone(&cache),
        Arc::clone(&embedder),
        Arc::clone(&completer),
        Arc::new(KindRegistry::with_defaults()),
        RecommenderSettings::default().with_lock_poll_interval(Duration::from_millis(5)),
    );
    Fixture {
        catalog,
        cache,
        embedder,
        completer,
        recommender: Arc::new(recommender),
    }
}
