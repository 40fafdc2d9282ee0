mod common;

use common::fixtures::{EMBEDDING_DIM, catalog, fixture};
use reco::cache::MemoryCacheStore;
use reco::embedding::{BatchEmbedOptions, MockEmbedder};
use reco::rerank::MockCompleter;

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn setup() -> common::fixtures::Fixture<MemoryCacheStore> {
    fixture(
        catalog(),
        MemoryCacheStore::new(),
        MockEmbedder::new(EMBEDDING_DIM),
        MockCompleter::new(),
    )
}

#[tokio::test]
async fn test_batch_embeds_missing_vectors_and_reports_stats() {
    let f = setup();
    let stats = f
        .recommender
        .embeddings()
        .batch_get_or_create(
            &ids(&["p0", "p1", "ghost", "p1", ""]),
            "comp",
            BatchEmbedOptions::default(),
        )
        .await;

    assert_eq!(stats.kind, "comp");
    assert_eq!(stats.total_requested, 5);
    assert_eq!(stats.unique_ids, 3);
    assert_eq!(stats.cache_hits, 0);
    assert_eq!(stats.db_hits, 0);
    assert_eq!(stats.embedded, 2);
    assert_eq!(stats.missing, vec!["ghost".to_string()]);
    assert!(stats.errors.is_empty());

    let stored = f.catalog.product("p1").unwrap();
    assert_eq!(stored.vector("comp").map(<[f32]>::len), Some(EMBEDDING_DIM));
}

#[tokio::test]
async fn test_batch_second_run_hits_cache() {
    let f = setup();
    let embeddings = f.recommender.embeddings();
    let wanted = ids(&["p0", "p1"]);

    embeddings
        .batch_get_or_create(&wanted, "comp", BatchEmbedOptions::default())
        .await;
    let calls = f.embedder.call_count();

    let stats = embeddings
        .batch_get_or_create(&wanted, "comp", BatchEmbedOptions::default())
        .await;
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.embedded, 0);
    assert_eq!(f.embedder.call_count(), calls);
}

#[tokio::test]
async fn test_batch_uses_stored_vectors() {
    let f = setup();
    let stats = f
        .recommender
        .embeddings()
        .batch_get_or_create(
            &ids(&["p0", "p1", "p2"]),
            "sim",
            BatchEmbedOptions::default(),
        )
        .await;

    assert_eq!(stats.db_hits, 3);
    assert_eq!(stats.embedded, 0);
    assert_eq!(f.embedder.call_count(), 0);
}

#[tokio::test]
async fn test_batch_force_recomputes() {
    let f = setup();
    let options = BatchEmbedOptions {
        force: true,
        ..BatchEmbedOptions::default()
    };
    let stats = f
        .recommender
        .embeddings()
        .batch_get_or_create(&ids(&["p0", "p1"]), "sim", options)
        .await;

    assert_eq!(stats.db_hits, 0);
    assert_eq!(stats.embedded, 2);
}

#[tokio::test]
async fn test_batch_without_write_back_leaves_catalog_untouched() {
    let f = setup();
    let options = BatchEmbedOptions {
        write_back: false,
        ..BatchEmbedOptions::default()
    };
    let stats = f
        .recommender
        .embeddings()
        .batch_get_or_create(&ids(&["p1"]), "comp", options)
        .await;

    assert_eq!(stats.embedded, 1);
    assert_eq!(f.catalog.store_embedding_calls(), 0);
    assert!(f.catalog.product("p1").unwrap().vector("comp").is_none());
}

#[tokio::test]
async fn test_batch_count_mismatch_skips_chunk() {
    let f = setup();
    f.embedder.set_drop_last(true);

    let stats = f
        .recommender
        .embeddings()
        .batch_get_or_create(&ids(&["p0", "p1", "p2"]), "comp", BatchEmbedOptions::default())
        .await;

    assert_eq!(stats.embedded, 0);
    assert_eq!(stats.errors.len(), 1);
    assert_eq!(f.catalog.store_embedding_calls(), 0);
}
