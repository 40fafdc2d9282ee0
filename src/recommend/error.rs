use thiserror::Error;

/// Malformed recommendation input, or a store failure on a listing that cannot degrade.
///
/// Recommendation pipelines never surface store failures; they degrade to empty results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecommendError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("unknown recommendation kind '{kind}'")]
    UnknownKind { kind: String },

    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },
}

pub type RecommendResult<T> = Result<T, RecommendError>;

impl RecommendError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// Failure wiring production clients from configuration.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("catalog setup failed: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),

    #[error("embedding provider setup failed: {0}")]
    Embedding(#[from] crate::embedding::EmbeddingError),
}
