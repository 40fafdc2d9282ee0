//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort { value: String },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// Rerank alpha string could not be parsed.
    #[error("failed to parse rerank alpha '{value}': {source}")]
    AlphaParseError {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    /// Rerank alpha is outside `[0, 1]`.
    #[error("invalid rerank alpha {value}: must be within [0, 1]")]
    InvalidAlpha { value: f32 },

    /// Retrieval pool must be non-empty and at least as large as the final size.
    #[error("invalid pool sizes: retrieval_k={retrieval_k}, final_k={final_k}")]
    InvalidPoolSizes { retrieval_k: usize, final_k: usize },

    /// A TTL or timeout was configured as zero.
    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    /// A required value was empty.
    #[error("{name} must not be empty")]
    EmptyValue { name: &'static str },
}
