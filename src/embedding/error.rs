use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The HTTP request could not be sent or completed.
    #[error("embedding request failed: {reason}")]
    RequestFailed { reason: String },

    /// The provider answered with a non-success status.
    #[error("embedding provider returned {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("invalid embedding response: {reason}")]
    InvalidResponse { reason: String },

    /// The provider returned a different number of vectors than inputs.
    #[error("embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("invalid embedding configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::RequestFailed {
            reason: err.to_string(),
        }
    }
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
