use std::sync::Arc;

use super::*;
use crate::catalog::{Clause, MockCatalog, Product};

fn adapter(catalog: Arc<MockCatalog>) -> RetrievalAdapter<MockCatalog> {
    RetrievalAdapter::new(catalog, Arc::new(KindRegistry::with_defaults()))
}

fn catalog() -> Arc<MockCatalog> {
    Arc::new(MockCatalog::with_products([
        Product::new("a", "Leather Belt")
            .with_stock(2)
            .with_vector("sim", "m", vec![1.0, 0.0]),
        Product::new("b", "Canvas Belt")
            .with_stock(2)
            .with_vector("sim", "m", vec![0.0, 1.0]),
        Product::new("c", "Wool Scarf").with_stock(0),
    ]))
}

fn request<'a>(vector: Option<&'a [f32]>, text: &'a str) -> RetrievalRequest<'a> {
    RetrievalRequest {
        kind: "sim",
        vector,
        fallback_text: text,
        filters: None,
        k: 10,
    }
}

#[test]
fn test_num_candidates() {
    assert_eq!(num_candidates(5), 200);
    assert_eq!(num_candidates(30), 300);
}

#[test]
fn test_normalize_relevance() {
    let mut hits = vec![
        ScoredProduct {
            product_id: "a".into(),
            score: 4.0,
        },
        ScoredProduct {
            product_id: "b".into(),
            score: 1.0,
        },
    ];
    normalize_relevance(&mut hits);
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(hits[1].score, 0.25);
}

#[tokio::test]
async fn test_vector_hits_skip_text_search() {
    let catalog = catalog();
    let retrieved = adapter(catalog.clone())
        .retrieve(request(Some(&[1.0, 0.0][..]), "belt"))
        .await;

    assert_eq!(retrieved.path, RetrievalPath::Vector);
    assert_eq!(retrieved.candidates[0].product_id, "a");
    assert_eq!(catalog.text_search_calls(), 0);
}

#[tokio::test]
async fn test_empty_vector_result_falls_back_to_text_once() {
    let catalog = catalog();
    let filters = FilterSet::new().with(Clause::equals("product_id", "nothing"));
    let text_filters = FilterSet::new();
    let adapter = adapter(catalog.clone());

    let retrieved = adapter
        .retrieve(RetrievalRequest {
            filters: Some(&filters),
            ..request(Some(&[1.0, 0.0][..]), "belt")
        })
        .await;
    assert_eq!(retrieved.path, RetrievalPath::Empty);
    assert_eq!(catalog.vector_search_calls(), 1);
    assert_eq!(catalog.text_search_calls(), 1);

    let retrieved = adapter
        .retrieve(RetrievalRequest {
            filters: Some(&text_filters),
            ..request(None, "leather belt")
        })
        .await;
    assert_eq!(retrieved.path, RetrievalPath::Text);
    assert_eq!(retrieved.candidates[0].product_id, "a");
    assert_eq!(retrieved.candidates[0].score, 1.0);
    assert!(retrieved.candidates.iter().all(|c| c.score <= 1.0));
    assert_eq!(catalog.text_search_calls(), 2);
}

#[tokio::test]
async fn test_vector_error_counts_as_zero_results() {
    let catalog = catalog();
    catalog.set_fail_vector_search(true);

    let retrieved = adapter(catalog.clone())
        .retrieve(request(Some(&[1.0, 0.0][..]), "scarf"))
        .await;
    assert_eq!(retrieved.path, RetrievalPath::Text);
    assert_eq!(retrieved.candidates[0].product_id, "c");
}

#[tokio::test]
async fn test_neither_path_yields_empty() {
    let catalog = catalog();
    let retrieved = adapter(catalog.clone()).retrieve(request(None, "  ")).await;
    assert_eq!(retrieved, Retrieved::empty());
    assert_eq!(catalog.vector_search_calls(), 0);
    assert_eq!(catalog.text_search_calls(), 0);
}

#[tokio::test]
async fn test_filters_apply_to_both_paths() {
    let catalog = catalog();
    let in_stock = FilterSet::new().with(Clause::gt("stock", 0.0));
    let retrieved = adapter(catalog)
        .retrieve(RetrievalRequest {
            filters: Some(&in_stock),
            ..request(None, "scarf")
        })
        .await;
    assert_eq!(retrieved.path, RetrievalPath::Empty);
}

#[tokio::test]
async fn test_k_bounds_output() {
    let catalog = catalog();
    let retrieved = adapter(catalog)
        .retrieve(RetrievalRequest {
            k: 1,
            ..request(Some(&[1.0, 0.0][..]), "")
        })
        .await;
    assert_eq!(retrieved.candidates.len(), 1);
}

#[tokio::test]
async fn test_vector_hits_are_sorted_before_truncation() {
    let catalog = Arc::new(MockCatalog::with_products([
        Product::new("a", "Leather Belt").with_vector("sim", "m", vec![1.0, 0.0]),
        Product::new("b", "Canvas Belt").with_vector("sim", "m", vec![0.6, 0.8]),
        Product::new("c", "Rope Belt").with_vector("sim", "m", vec![0.0, 1.0]),
    ]));
    catalog.set_reverse_vector_hits(true);

    let retrieved = adapter(catalog)
        .retrieve(RetrievalRequest {
            k: 2,
            ..request(Some(&[1.0, 0.0][..]), "")
        })
        .await;

    let ids: Vec<&str> = retrieved
        .candidates
        .iter()
        .map(|c| c.product_id.as_str())
        .collect();
    assert_eq!(retrieved.path, RetrievalPath::Vector);
    assert_eq!(ids, vec!["a", "b"]);
}
