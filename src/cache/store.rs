//! Cache store capability and the in-process implementation.
//!
//! Values are opaque strings with a per-entry TTL. [`CacheStore::set_if_absent`] must be atomic;
//! it is the lock primitive used for dogpile protection.

use moka::Expiry;
use moka::sync::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::CacheResult;
use crate::constants::LOCK_PREFIX;

/// Key-value store with expiry.
pub trait CacheStore: Send + Sync {
    /// Returns the value under `key`, if present and unexpired.
    fn get(&self, key: &str) -> impl Future<Output = CacheResult<Option<String>>> + Send;

    /// Stores `value` under `key` for `ttl`, replacing any previous value.
    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    /// Removes `key` (no-op if absent).
    fn delete(&self, key: &str) -> impl Future<Output = CacheResult<()>> + Send;

    /// Returns `true` if `key` holds an unexpired value.
    fn exists(&self, key: &str) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Atomically stores `value` only if `key` is absent. Returns `true` if it was stored.
    fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> impl Future<Output = CacheResult<bool>> + Send;
}

#[derive(Clone)]
struct CachedValue {
    value: Arc<str>,
    ttl: Duration,
}

struct PerEntryExpiry;

impl Expiry<String, CachedValue> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process [`CacheStore`] backed by `moka` with per-entry expiry.
///
/// `lock:` keys live in their own unbounded tier: a bounded cache may refuse admission of a
/// fresh entry, which would let every caller believe it acquired the same lock.
#[derive(Clone)]
pub struct MemoryCacheStore {
    entries: Cache<String, CachedValue>,
    locks: Cache<String, CachedValue>,
}

impl MemoryCacheStore {
    const DEFAULT_CAPACITY: u64 = 100_000;

    /// Creates a store with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a store with a max entry capacity.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .expire_after(PerEntryExpiry)
                .build(),
            locks: Cache::builder().expire_after(PerEntryExpiry).build(),
        }
    }

    /// Returns the approximate number of live entries, locks excluded.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tier(&self, key: &str) -> &Cache<String, CachedValue> {
        match key.strip_prefix(LOCK_PREFIX) {
            Some(rest) if rest.starts_with(':') => &self.locks,
            _ => &self.entries,
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        self.tier(key)
            .get(key)
            .map(|cached| cached.value.to_string())
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheStore")
            .field("entries", &self.entries.entry_count())
            .field("locks", &self.locks.entry_count())
            .finish()
    }
}

impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.read(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.tier(key).insert(
            key.to_string(),
            CachedValue {
                value: Arc::from(value),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.tier(key).invalidate(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.tier(key).get(key).is_some())
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> CacheResult<bool> {
        let entry = self
            .tier(key)
            .entry(key.to_string())
            .or_insert_with(|| CachedValue {
                value: Arc::from(value),
                ttl,
            });
        Ok(entry.is_fresh())
    }
}
