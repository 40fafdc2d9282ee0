//! Cache-backed mutual exclusion for expensive recomputation.
//!
//! A lock is a single `set_if_absent` of a random token under `lock:{resource}` with a TTL.
//! Release is a best-effort delete without an ownership check: if the TTL already elapsed and
//! another worker re-acquired, that worker's lock is dropped early. The only consequence is a
//! redundant recomputation.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use uuid::Uuid;

use super::store::CacheStore;
use crate::constants::{LOCK_POLL_INTERVAL_MS, LOCK_PREFIX};

/// Proof of lock ownership returned by [`CacheLock::try_acquire`].
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    token: String,
}

impl LockGuard {
    /// The lock key (`lock:{resource}`).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Random token written on acquisition.
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Outcome of a lock acquisition attempt.
#[derive(Debug)]
pub enum LockAcquisition {
    /// This caller owns the lock until release or TTL expiry.
    Acquired(LockGuard),
    /// Another worker holds the lock.
    Contended,
    /// The cache store failed; callers proceed without coordination.
    Unavailable,
}

/// Lock manager over a [`CacheStore`].
pub struct CacheLock<C: CacheStore> {
    store: Arc<C>,
    ttl: Duration,
    poll_interval: Duration,
}

impl<C: CacheStore> std::fmt::Debug for CacheLock<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLock")
            .field("ttl", &self.ttl)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl<C: CacheStore> CacheLock<C> {
    /// Creates a lock manager with the given TTL and the default poll interval.
    pub fn new(store: Arc<C>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            poll_interval: Duration::from_millis(LOCK_POLL_INTERVAL_MS),
        }
    }

    /// Overrides the interval between polls while waiting.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Lock key guarding `resource`.
    pub fn key_for(resource: &str) -> String {
        format!("{LOCK_PREFIX}:{resource}")
    }

    /// Attempts a single atomic acquisition.
    pub async fn try_acquire(&self, resource: &str) -> LockAcquisition {
        let key = Self::key_for(resource);
        let token = Uuid::new_v4().to_string();

        match self.store.set_if_absent(&key, token.clone(), self.ttl).await {
            Ok(true) => {
                debug!(lock = %key, "lock acquired");
                LockAcquisition::Acquired(LockGuard { key, token })
            }
            Ok(false) => LockAcquisition::Contended,
            Err(e) => {
                warn!(lock = %key, error = %e, "lock acquisition failed, continuing uncoordinated");
                LockAcquisition::Unavailable
            }
        }
    }

    /// Releases a lock (best-effort, not token-checked).
    pub async fn release(&self, guard: LockGuard) {
        if let Err(e) = self.store.delete(&guard.key).await {
            warn!(lock = %guard.key, token = %guard.token, error = %e, "lock release failed");
        } else {
            debug!(lock = %guard.key, "lock released");
        }
    }

    /// Polls until the lock on `resource` disappears or the TTL elapses.
    ///
    /// Returns `true` if the lock was observed released. A store error ends the wait early
    /// (treated as released) so callers never block on a broken cache.
    pub async fn wait_released(&self, resource: &str) -> bool {
        let key = Self::key_for(resource);
        let deadline = Instant::now() + self.ttl;

        loop {
            match self.store.exists(&key).await {
                Ok(false) => return true,
                Ok(true) => {}
                Err(e) => {
                    warn!(lock = %key, error = %e, "lock poll failed, giving up wait");
                    return true;
                }
            }

            if Instant::now() + self.poll_interval > deadline {
                debug!(lock = %key, "lock wait timed out");
                return false;
            }
            sleep(self.poll_interval).await;
        }
    }
}
