pub const RECO_STATUS_HEADER: &str = "X-Reco-Status";
pub const RECO_STATUS_HEALTHY: &str = "healthy";
pub const RECO_STATUS_READY: &str = "ready";
pub const RECO_STATUS_NOT_READY: &str = "not_ready";
pub const RECO_STATUS_ERROR: &str = "error";

/// Where a recommendation response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultSource {
    /// Served from the result cache.
    CacheHit,
    /// Served from the negative cache (source product missing).
    NegativeHit,
    /// Rerank failed; served a previously cached non-reranked result.
    FallbackHit,
    /// Computed by the pipeline.
    Computed,
}

impl ResultSource {
    #[inline]
    pub fn as_header_value(&self) -> &'static str {
        match self {
            ResultSource::CacheHit => "HIT",
            ResultSource::NegativeHit => "HIT_NEGATIVE",
            ResultSource::FallbackHit => "HIT_FALLBACK",
            ResultSource::Computed => "MISS",
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        !matches!(self, ResultSource::Computed)
    }
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_header_value())
    }
}
