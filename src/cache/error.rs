use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by cache store operations.
pub enum CacheError {
    /// The backing store could not be reached or rejected the operation.
    #[error("cache store unavailable: {reason}")]
    Unavailable {
        /// Error message.
        reason: String,
    },

    /// A cached value could not be encoded or decoded.
    #[error("cache value codec error for '{key}': {reason}")]
    Codec {
        /// Cache key.
        key: String,
        /// Error message.
        reason: String,
    },
}

/// Convenience result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
