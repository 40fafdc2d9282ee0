use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::cache::{CacheLock, CacheStore, MemoryCacheStore, ResultSource, UnavailableCacheStore};
use crate::catalog::{Clause, FilterSet, Interaction, MockCatalog, Product};
use crate::embedding::MockEmbedder;
use crate::kinds::KindRegistry;
use crate::rerank::{MockCompleter, ranking_json};

type TestRecommender<C> = Recommender<MockCatalog, C, MockEmbedder, MockCompleter>;

struct Harness<C: crate::cache::CacheStore> {
    catalog: Arc<MockCatalog>,
    embedder: Arc<MockEmbedder>,
    completer: Arc<MockCompleter>,
    recommender: TestRecommender<C>,
}

fn products() -> Vec<Product> {
    vec![
        Product::new("p0", "Leather Belt")
            .with_brand("Acme")
            .with_category("belts")
            .with_stock(5)
            .with_vector("sim", "mock-embedding", vec![1.0, 0.0, 0.0, 0.0]),
        Product::new("p1", "Brown Belt")
            .with_brand("Acme")
            .with_category("belts")
            .with_stock(3)
            .with_vector("sim", "mock-embedding", vec![0.9, 0.1, 0.0, 0.0]),
        Product::new("p2", "Black Belt")
            .with_brand("Other")
            .with_category("belts")
            .with_stock(3)
            .with_vector("sim", "mock-embedding", vec![0.6, 0.8, 0.0, 0.0]),
        Product::new("p3", "Wide Belt")
            .with_category("belts")
            .with_stock(0)
            .with_vector("sim", "mock-embedding", vec![1.0, 0.0, 0.0, 0.0]),
        Product::new("p4", "Wool Scarf")
            .with_brand("Knit")
            .with_category("scarves")
            .with_stock(2)
            .with_vector("sim", "mock-embedding", vec![1.0, 0.0, 0.0, 0.0]),
    ]
}

fn catalog() -> MockCatalog {
    let catalog = MockCatalog::with_products(products());
    for (product, order) in [
        ("p0", "o1"),
        ("p1", "o1"),
        ("p2", "o1"),
        ("p0", "o2"),
        ("p1", "o2"),
    ] {
        catalog.insert_event(Interaction::purchase(product, order).with_user("u1"));
    }
    catalog.insert_event(Interaction::purchase("p0", "o3").with_user("u2"));
    catalog.insert_event(Interaction::purchase("p4", "o3").with_user("u2"));
    catalog.insert_event(Interaction::cart_add("p1", "u1"));
    catalog
}

fn harness_with<C: crate::cache::CacheStore>(
    catalog: MockCatalog,
    cache: C,
    completer: MockCompleter,
) -> Harness<C> {
    harness_with_settings(
        catalog,
        cache,
        completer,
        RecommenderSettings::default().with_lock_poll_interval(Duration::from_millis(5)),
    )
}

fn harness_with_settings<C: crate::cache::CacheStore>(
    catalog: MockCatalog,
    cache: C,
    completer: MockCompleter,
    settings: RecommenderSettings,
) -> Harness<C> {
    let catalog = Arc::new(catalog);
    let embedder = Arc::new(MockEmbedder::new(4));
    let completer = Arc::new(completer);
    let recommender = Recommender::new(
        Arc::clone(&catalog),
        Arc::new(cache),
        Arc::clone(&embedder),
        Arc::clone(&completer),
        Arc::new(KindRegistry::with_defaults()),
        settings,
    );
    Harness {
        catalog,
        embedder,
        completer,
        recommender,
    }
}

fn harness(completer: MockCompleter) -> Harness<MemoryCacheStore> {
    harness_with(catalog(), MemoryCacheStore::new(), completer)
}

fn ids(result: &RecommendationResult) -> Vec<&str> {
    result
        .items()
        .iter()
        .map(|i| i.product_id.as_str())
        .collect()
}

fn assert_sorted(result: &RecommendationResult) {
    assert_eq!(result.count(), result.items().len());
    assert!(
        result
            .items()
            .windows(2)
            .all(|w| w[0].score >= w[1].score),
        "items not sorted: {:?}",
        result.items()
    );
}

#[tokio::test]
async fn test_recommend_similar_uses_default_filters() {
    let h = harness(MockCompleter::new());
    let (result, source) = h
        .recommender
        .recommend_traced(&RecommendRequest::new("p0", "sim"))
        .await
        .unwrap();

    assert_eq!(source, ResultSource::Computed);
    assert_eq!(result.source_product_id(), "p0");
    assert_eq!(ids(&result), vec!["p1", "p2"]);
    assert_sorted(&result);
    assert_eq!(h.embedder.call_count(), 0);
}

#[tokio::test]
async fn test_second_identical_call_is_served_from_cache() {
    let h = harness(MockCompleter::new());
    let request = RecommendRequest::new("p0", "sim");

    let first = h.recommender.recommend(&request).await.unwrap();
    let (second, source) = h.recommender.recommend_traced(&request).await.unwrap();

    assert_eq!(source, ResultSource::CacheHit);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(h.catalog.vector_search_calls(), 1);
    assert_eq!(h.catalog.find_product_calls(), 1);
}

#[tokio::test]
async fn test_invalid_input_is_rejected() {
    let h = harness(MockCompleter::new());

    let err = h
        .recommender
        .recommend(&RecommendRequest::new("p0", "nope"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RecommendError::UnknownKind {
            kind: "nope".to_string()
        }
    );

    for limit in [0, 201] {
        let err = h
            .recommender
            .recommend(&RecommendRequest::new("p0", "sim").with_limit(limit))
            .await
            .unwrap_err();
        assert!(matches!(err, RecommendError::InvalidInput { .. }));
    }

    let err = h
        .recommender
        .recommend(&RecommendRequest::new("  ", "sim"))
        .await
        .unwrap_err();
    assert!(matches!(err, RecommendError::InvalidInput { .. }));
    assert_eq!(h.catalog.find_product_calls(), 0);
}

#[tokio::test]
async fn test_missing_source_is_negatively_cached() {
    let h = harness(MockCompleter::new());

    let (first, first_source) = h
        .recommender
        .recommend_traced(&RecommendRequest::new("ghost", "sim"))
        .await
        .unwrap();
    let (second, second_source) = h
        .recommender
        .recommend_traced(&RecommendRequest::new("ghost", "sim").with_limit(3))
        .await
        .unwrap();

    assert!(first.is_empty());
    assert!(second.is_empty());
    assert_eq!(first_source, ResultSource::Computed);
    assert_eq!(second_source, ResultSource::NegativeHit);
    assert_eq!(h.catalog.find_product_calls(), 1);
}

#[tokio::test]
async fn test_failed_embedding_falls_back_to_text_search() {
    let mut catalog_products = products();
    catalog_products[0].vectors.clear();
    let h = harness_with(
        MockCatalog::with_products(catalog_products),
        MemoryCacheStore::new(),
        MockCompleter::new(),
    );
    h.embedder.set_fail(true);

    let result = h
        .recommender
        .recommend(&RecommendRequest::new("p0", "sim"))
        .await
        .unwrap();

    assert_eq!(h.catalog.vector_search_calls(), 0);
    assert_eq!(h.catalog.text_search_calls(), 1);
    assert!(!result.is_empty());
    assert!(!ids(&result).contains(&"p0"));
    assert!(!ids(&result).contains(&"p3"));
    assert!(!ids(&result).contains(&"p4"));
    assert_sorted(&result);
}

#[tokio::test]
async fn test_stuck_embedding_lock_times_out_to_text_search() {
    let mut catalog_products = products();
    catalog_products[0].vectors.clear();
    let cache = MemoryCacheStore::new();
    let h = harness_with_settings(
        MockCatalog::with_products(catalog_products),
        cache.clone(),
        MockCompleter::new(),
        RecommenderSettings::default()
            .with_lock_poll_interval(Duration::from_millis(5))
            .with_embedding_wait_timeout(Duration::from_millis(150)),
    );

    let vector_key = h.recommender.embeddings().vector_cache().key("p0", "sim");
    let lock_key = CacheLock::<MemoryCacheStore>::key_for(&vector_key);
    assert!(
        cache
            .set_if_absent(&lock_key, "stuck".to_string(), Duration::from_secs(60))
            .await
            .unwrap()
    );

    let started = std::time::Instant::now();
    let result = h
        .recommender
        .recommend(&RecommendRequest::new("p0", "sim"))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(h.embedder.call_count(), 0);
    assert_eq!(h.catalog.vector_search_calls(), 0);
    assert_eq!(h.catalog.text_search_calls(), 1);
    assert!(!result.is_empty());
    assert!(!ids(&result).contains(&"p0"));
    assert_sorted(&result);
}

#[tokio::test]
async fn test_no_vector_and_no_fallback_yields_empty() {
    let mut catalog_products = products();
    catalog_products[0].vectors.clear();
    let h = harness_with(
        MockCatalog::with_products(catalog_products),
        MemoryCacheStore::new(),
        MockCompleter::new(),
    );
    h.embedder.set_fail(true);

    let result = h
        .recommender
        .recommend(&RecommendRequest::new("p0", "sim").with_text_fallback(false))
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.count(), 0);
    assert_eq!(h.catalog.text_search_calls(), 0);
}

#[tokio::test]
async fn test_request_filters_replace_defaults() {
    let h = harness(MockCompleter::new());
    let filters = FilterSet::new().with(Clause::equals("category_id", "scarves"));

    let result = h
        .recommender
        .recommend(&RecommendRequest::new("p0", "sim").with_filters(filters))
        .await
        .unwrap();

    assert_eq!(ids(&result), vec!["p4"]);
}

#[tokio::test]
async fn test_limit_truncates_output() {
    let h = harness(MockCompleter::new());
    let result = h
        .recommender
        .recommend(&RecommendRequest::new("p0", "sim").with_limit(1))
        .await
        .unwrap();
    assert_eq!(ids(&result), vec!["p1"]);
    assert_eq!(result.count(), 1);
}

#[tokio::test]
async fn test_rerank_blends_and_caches_under_scored_key() {
    let h = harness(MockCompleter::always(ranking_json(
        "p0",
        &[("p2", 0.9), ("p1", 0.6)],
    )));
    let request = RecommendRequest::new("p0", "sim").with_rerank(RerankMode::Scored);

    let result = h.recommender.recommend(&request).await.unwrap();
    assert_eq!(ids(&result), vec!["p2", "p1"]);
    assert!((result.items()[0].score - 0.875).abs() < 1e-4);
    assert!(result.items().iter().all(|i| i.rationale.is_none()));
    assert_sorted(&result);

    let (_, source) = h.recommender.recommend_traced(&request).await.unwrap();
    assert_eq!(source, ResultSource::CacheHit);
    assert_eq!(h.completer.call_count(), 1);
}

#[tokio::test]
async fn test_rerank_threshold_drops_low_scores() {
    let h = harness(MockCompleter::always(ranking_json(
        "p0",
        &[("p2", 0.9), ("p1", 0.0)],
    )));
    let result = h
        .recommender
        .recommend(&RecommendRequest::new("p0", "sim").with_rerank(RerankMode::Scored))
        .await
        .unwrap();

    assert_eq!(ids(&result), vec!["p2"]);
}

#[tokio::test]
async fn test_failed_rerank_writes_non_reranked_key_then_serves_it() {
    let h = harness(MockCompleter::failing());
    let scored = RecommendRequest::new("p0", "sim").with_rerank(RerankMode::Scored);

    let (first, source) = h.recommender.recommend_traced(&scored).await.unwrap();
    assert_eq!(source, ResultSource::Computed);
    assert_eq!(ids(&first), vec!["p1", "p2"]);

    let (plain, source) = h
        .recommender
        .recommend_traced(&RecommendRequest::new("p0", "sim"))
        .await
        .unwrap();
    assert_eq!(source, ResultSource::CacheHit);
    assert_eq!(plain, first);

    let (again, source) = h.recommender.recommend_traced(&scored).await.unwrap();
    assert_eq!(source, ResultSource::FallbackHit);
    assert_eq!(again, first);
    assert_eq!(h.catalog.vector_search_calls(), 2);
}

#[tokio::test]
async fn test_unavailable_cache_still_serves_results() {
    let h = harness_with(catalog(), UnavailableCacheStore::new(), MockCompleter::new());
    let request = RecommendRequest::new("p0", "sim");

    let first = h.recommender.recommend(&request).await.unwrap();
    let (second, source) = h.recommender.recommend_traced(&request).await.unwrap();

    assert_eq!(ids(&first), vec!["p1", "p2"]);
    assert_eq!(second, first);
    assert_eq!(source, ResultSource::Computed);
    assert_eq!(h.catalog.vector_search_calls(), 2);
}

#[test]
fn test_normalize_counts() {
    let counts = vec![
        crate::catalog::CoPurchaseCount {
            product_id: "a".into(),
            count: 4,
        },
        crate::catalog::CoPurchaseCount {
            product_id: "b".into(),
            count: 1,
        },
    ];
    let items = normalize_counts(&counts);
    assert_eq!(items[0].score, 1.0);
    assert_eq!(items[1].score, 0.25);
    assert!(normalize_counts(&[]).is_empty());
}

#[tokio::test]
async fn test_cross_sell_mines_co_purchases() {
    let h = harness(MockCompleter::new());
    let (result, source) = h
        .recommender
        .cross_sell_traced(&CrossSellRequest::new("p0"))
        .await
        .unwrap();

    assert_eq!(source, ResultSource::Computed);
    assert_eq!(result.items()[0].product_id, "p1");
    assert_eq!(result.items()[0].score, 1.0);
    assert_eq!(result.count(), 3);
    assert!(!ids(&result).contains(&"p0"));
    assert_sorted(&result);

    let (_, source) = h
        .recommender
        .cross_sell_traced(&CrossSellRequest::new("p0"))
        .await
        .unwrap();
    assert_eq!(source, ResultSource::CacheHit);
    assert_eq!(h.catalog.co_purchases_calls(), 1);
}

#[tokio::test]
async fn test_cross_sell_user_exclusions() {
    let h = harness(MockCompleter::new());

    let all_excluded = h
        .recommender
        .cross_sell(&CrossSellRequest::new("p0").with_user("u1"))
        .await
        .unwrap();
    assert!(all_excluded.is_empty());

    let cart_only = h
        .recommender
        .cross_sell(
            &CrossSellRequest::new("p0")
                .with_user("u1")
                .with_exclusions(false, true),
        )
        .await
        .unwrap();
    assert_eq!(ids(&cart_only), vec!["p2"]);

    let none = h
        .recommender
        .cross_sell(
            &CrossSellRequest::new("p0")
                .with_user("u1")
                .with_exclusions(false, false),
        )
        .await
        .unwrap();
    assert_eq!(ids(&none), vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_cross_sell_brand_filter() {
    let h = harness(MockCompleter::new());
    let result = h
        .recommender
        .cross_sell(&CrossSellRequest::new("p0").with_brand("Acme"))
        .await
        .unwrap();
    assert_eq!(ids(&result), vec!["p1"]);
}

#[tokio::test]
async fn test_cross_sell_rerank_reorders() {
    let h = harness(MockCompleter::always(ranking_json(
        "p0",
        &[("p2", 1.0), ("p1", 0.0), ("p4", 0.2)],
    )));
    let result = h
        .recommender
        .cross_sell(&CrossSellRequest::new("p0").with_rerank(RerankMode::Scored))
        .await
        .unwrap();

    assert_eq!(ids(&result), vec!["p2", "p4", "p1"]);
    assert!((result.items()[0].score - 0.875).abs() < 1e-6);
    assert_eq!(h.completer.call_count(), 1);
}

#[tokio::test]
async fn test_cross_sell_rerank_failure_keeps_count_order() {
    let h = harness(MockCompleter::failing());
    let result = h
        .recommender
        .cross_sell(&CrossSellRequest::new("p0").with_rerank(RerankMode::Scored))
        .await
        .unwrap();
    assert_eq!(result.items()[0].product_id, "p1");
    assert_eq!(result.count(), 3);
}

#[tokio::test]
async fn test_top_sales_ranks_by_units() {
    let h = harness(MockCompleter::new());

    let result = h.recommender.top_sales(&TopSalesRequest::new(2)).await.unwrap();
    let top: Vec<(&str, u64)> = result
        .items()
        .iter()
        .map(|i| (i.product_id.as_str(), i.units))
        .collect();
    assert_eq!(top, vec![("p0", 3), ("p1", 2)]);
    assert_eq!(result.count(), 2);

    let knit = h
        .recommender
        .top_sales(&TopSalesRequest::default().with_brands(vec!["Knit".to_string()]))
        .await
        .unwrap();
    assert_eq!(knit.items()[0].product_id, "p4");

    let (_, source) = h
        .recommender
        .top_sales_traced(&TopSalesRequest::new(2))
        .await
        .unwrap();
    assert_eq!(source, ResultSource::CacheHit);

    assert!(
        h.recommender
            .top_sales(&TopSalesRequest::new(0))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_last_seen_lists_recent_views() {
    let catalog = catalog();
    catalog.insert_event(Interaction::view("p2", "u1").with_timestamp(10));
    catalog.insert_event(Interaction::view("p0", "u1").with_timestamp(30));
    catalog.insert_event(Interaction::view("p2", "u1").with_timestamp(40));
    let h = harness_with(catalog, MemoryCacheStore::new(), MockCompleter::new());

    let result = h
        .recommender
        .last_seen(&LastSeenRequest::new("u1"))
        .await
        .unwrap();
    let seen: Vec<&str> = result.items().iter().map(|i| i.product_id.as_str()).collect();
    assert_eq!(seen, vec!["p2", "p0"]);
    assert_eq!(result.count(), 2);

    // Purchases and cart adds are not views.
    let none = h
        .recommender
        .last_seen(&LastSeenRequest::new("u2"))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_last_seen_rejects_bad_input_and_surfaces_store_errors() {
    let h = harness(MockCompleter::new());

    for request in [
        LastSeenRequest::new(" "),
        LastSeenRequest::new("u1").with_limit(0),
        LastSeenRequest::new("u1").with_limit(101),
    ] {
        let err = h.recommender.last_seen(&request).await.unwrap_err();
        assert!(matches!(err, RecommendError::InvalidInput { .. }), "{err}");
    }

    h.catalog.set_fail_lookups(true);
    let err = h
        .recommender
        .last_seen(&LastSeenRequest::new("u1"))
        .await
        .unwrap_err();
    assert!(matches!(err, RecommendError::StoreUnavailable { .. }));
}
