use super::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_memory_store_set_get_delete() {
    let store = MemoryCacheStore::new();

    store
        .set("k", "v".to_string(), Duration::from_secs(60))
        .await
        .expect("set should succeed");
    assert_eq!(store.get("k").await.expect("get"), Some("v".to_string()));
    assert!(store.exists("k").await.expect("exists"));

    store.delete("k").await.expect("delete");
    assert_eq!(store.get("k").await.expect("get"), None);
    assert!(!store.exists("k").await.expect("exists"));
}

#[tokio::test]
async fn test_memory_store_entry_expires() {
    let store = MemoryCacheStore::new();

    store
        .set("short", "v".to_string(), Duration::from_millis(50))
        .await
        .expect("set");
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(store.get("short").await.expect("get"), None);
}

#[tokio::test]
async fn test_set_if_absent_is_exclusive() {
    let store = MemoryCacheStore::new();

    let first = store
        .set_if_absent("lock:a", "t1".to_string(), Duration::from_secs(5))
        .await
        .expect("first");
    let second = store
        .set_if_absent("lock:a", "t2".to_string(), Duration::from_secs(5))
        .await
        .expect("second");

    assert!(first);
    assert!(!second);
    assert_eq!(store.get("lock:a").await.expect("get"), Some("t1".to_string()));
}

#[tokio::test]
async fn test_set_if_absent_stays_exclusive_when_full() {
    let store = MemoryCacheStore::with_capacity(4);
    let ttl = Duration::from_secs(60);
    for i in 0..4 {
        store.set(&format!("hot:{i}"), "v".to_string(), ttl).await.expect("set");
    }
    for _ in 0..20 {
        for i in 0..4 {
            store.get(&format!("hot:{i}")).await.expect("get");
        }
    }

    for n in 0..50 {
        let key = format!("lock:vec:{n}");
        assert!(store.set_if_absent(&key, "t1".to_string(), ttl).await.expect("first"));
        assert!(
            !store.set_if_absent(&key, "t2".to_string(), ttl).await.expect("second"),
            "{key} acquired twice"
        );
        assert!(store.exists(&key).await.expect("exists"));
    }

    store.delete("lock:vec:0").await.expect("delete");
    assert!(!store.exists("lock:vec:0").await.expect("exists"));
}

#[tokio::test]
async fn test_set_if_absent_after_expiry() {
    let store = MemoryCacheStore::new();

    assert!(
        store
            .set_if_absent("lock:b", "t1".to_string(), Duration::from_millis(30))
            .await
            .expect("first")
    );
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(
        store
            .set_if_absent("lock:b", "t2".to_string(), Duration::from_secs(5))
            .await
            .expect("after expiry")
    );
}

#[tokio::test]
async fn test_lock_acquire_contend_release() {
    let store = Arc::new(MemoryCacheStore::new());
    let lock = CacheLock::new(store.clone(), Duration::from_secs(5));

    let guard = match lock.try_acquire("vec:x").await {
        LockAcquisition::Acquired(guard) => guard,
        other => panic!("expected acquisition, got {other:?}"),
    };
    assert_eq!(guard.key(), "lock:vec:x");
    assert!(!guard.token().is_empty());

    assert!(matches!(
        lock.try_acquire("vec:x").await,
        LockAcquisition::Contended
    ));

    lock.release(guard).await;
    assert!(matches!(
        lock.try_acquire("vec:x").await,
        LockAcquisition::Acquired(_)
    ));
}

#[tokio::test]
async fn test_lock_unavailable_store() {
    let store = Arc::new(UnavailableCacheStore::new());
    let lock = CacheLock::new(store, Duration::from_secs(5));

    assert!(matches!(
        lock.try_acquire("vec:x").await,
        LockAcquisition::Unavailable
    ));
    assert!(lock.wait_released("vec:x").await);
}

#[tokio::test]
async fn test_wait_released_observes_release() {
    let store = Arc::new(MemoryCacheStore::new());
    let lock = Arc::new(
        CacheLock::new(store.clone(), Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(10)),
    );

    let guard = match lock.try_acquire("r").await {
        LockAcquisition::Acquired(guard) => guard,
        other => panic!("expected acquisition, got {other:?}"),
    };

    let releaser = {
        let lock = lock.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            lock.release(guard).await;
        })
    };

    assert!(lock.wait_released("r").await);
    releaser.await.expect("releaser should finish");
}

#[tokio::test]
async fn test_wait_released_times_out_at_ttl() {
    let store = Arc::new(MemoryCacheStore::new());
    let holder = CacheLock::new(store.clone(), Duration::from_secs(60));
    let waiter =
        CacheLock::new(store, Duration::from_millis(80)).with_poll_interval(Duration::from_millis(10));

    let _guard = holder.try_acquire("r").await;

    let started = std::time::Instant::now();
    assert!(!waiter.wait_released("r").await);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_vector_cache_key_and_roundtrip() {
    let store = Arc::new(MemoryCacheStore::new());
    let repo = VectorCacheRepo::new(store, "text-embedding-3-small", Duration::from_secs(60));

    let key = repo.key("p1", "sim");
    assert!(key.starts_with("vec:"));
    assert!(key.ends_with(":p1:sim"));

    assert!(repo.get("p1", "sim").await.is_none());
    repo.set("p1", "sim", &[0.25, 0.5]).await;
    assert_eq!(repo.get("p1", "sim").await, Some(vec![0.25, 0.5]));
    assert!(repo.get("p1", "comp").await.is_none());
}

#[tokio::test]
async fn test_vector_cache_keys_differ_by_model() {
    let store = Arc::new(MemoryCacheStore::new());
    let small = VectorCacheRepo::new(store.clone(), "small", Duration::from_secs(60));
    let large = VectorCacheRepo::new(store, "large", Duration::from_secs(60));

    small.set("p1", "sim", &[1.0]).await;

    assert!(large.get("p1", "sim").await.is_none());
    assert_ne!(small.key("p1", "sim"), large.key("p1", "sim"));
}

#[tokio::test]
async fn test_vector_cache_degrades_when_unavailable() {
    let store = Arc::new(UnavailableCacheStore::new());
    let repo = VectorCacheRepo::new(store.clone(), "m", Duration::from_secs(60));

    repo.set("p1", "sim", &[1.0]).await;
    assert!(repo.get("p1", "sim").await.is_none());
    assert_eq!(store.call_count(), 2);
}

#[tokio::test]
async fn test_vector_cache_discards_garbage() {
    let store = Arc::new(MemoryCacheStore::new());
    let repo = VectorCacheRepo::new(store.clone(), "m", Duration::from_secs(60));

    store
        .set(&repo.key("p1", "sim"), "not json".to_string(), Duration::from_secs(60))
        .await
        .expect("set");

    assert!(repo.get("p1", "sim").await.is_none());
}

#[test]
fn test_result_key_deterministic_and_sensitive() {
    let key = |filters: serde_json::Value, mode: &str| {
        ResultKey {
            version: "v1",
            kind: "sim",
            product_id: "p1",
            params: json!({"f": filters, "m": "gpt-4o-mini", "k": 10, "r": mode}),
        }
        .render()
    };

    let a = key(json!({"brand": "acme"}), "scored");
    let b = key(json!({"brand": "acme"}), "scored");
    let c = key(json!({"brand": "other"}), "scored");
    let d = key(json!({"brand": "acme"}), "off");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert!(a.starts_with("v1:sim:p1:"));
}

#[tokio::test]
async fn test_result_repo_roundtrip() {
    let store = Arc::new(MemoryCacheStore::new());
    let repo = ResultCacheRepo::new(store);

    repo.set("k", &vec!["a".to_string()], Duration::from_secs(60))
        .await;
    let cached: Option<Vec<String>> = repo.get("k").await;

    assert_eq!(cached, Some(vec!["a".to_string()]));
}

#[test]
fn test_prefixed_key() {
    let key = ResultCacheRepo::<MemoryCacheStore>::prefixed_key("xsell", &json!({"pid": "p1"}));
    assert!(key.starts_with("xsell:"));
}

#[test]
fn test_result_source_header_values() {
    assert_eq!(ResultSource::CacheHit.as_header_value(), "HIT");
    assert_eq!(ResultSource::Computed.to_string(), "MISS");
    assert!(ResultSource::NegativeHit.is_hit());
    assert!(!ResultSource::Computed.is_hit());
}
