use thiserror::Error;

#[derive(Debug, Error)]
pub enum RerankError {
    /// The completion provider failed (not retried).
    #[error("completion failed: {reason}")]
    Completion { reason: String },

    /// The completion did not finish within the configured timeout.
    #[error("completion timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Every attempt produced output violating the ranking schema.
    #[error("invalid ranking after {attempts} attempts: {reason}")]
    SchemaViolation { attempts: usize, reason: String },
}

pub type RerankResult<T> = Result<T, RerankError>;
