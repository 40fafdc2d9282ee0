use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::error::{CacheError, CacheResult};
use super::store::CacheStore;

/// A [`CacheStore`] whose every operation fails, for degradation tests.
#[derive(Debug, Default)]
pub struct UnavailableCacheStore {
    calls: AtomicUsize,
}

impl UnavailableCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations attempted against the store.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> CacheResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable {
            reason: "connection refused".to_string(),
        })
    }
}

impl CacheStore for UnavailableCacheStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> CacheResult<()> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        self.fail()
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        self.fail()
    }

    async fn set_if_absent(&self, _key: &str, _value: String, _ttl: Duration) -> CacheResult<bool> {
        self.fail()
    }
}
