//! Cache store capability, dogpile lock, and the vector/result repositories built on it.

pub mod error;
pub mod lock;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod results;
pub mod store;
pub mod types;
pub mod vectors;

#[cfg(test)]
mod tests;

pub use error::{CacheError, CacheResult};
pub use lock::{CacheLock, LockAcquisition, LockGuard};
#[cfg(any(test, feature = "mock"))]
pub use mock::UnavailableCacheStore;
pub use results::{ResultCacheRepo, ResultKey};
pub use store::{CacheStore, MemoryCacheStore};
pub use types::{
    RECO_STATUS_ERROR, RECO_STATUS_HEADER, RECO_STATUS_HEALTHY, RECO_STATUS_NOT_READY,
    RECO_STATUS_READY, ResultSource,
};
pub use vectors::VectorCacheRepo;
