//! Cross-cutting, shared constants.
//!
//! Runtime overrides live in [`crate::config::Config`]; these are the defaults it falls back to.

/// Candidate pool size requested from retrieval before rerank/truncation.
pub const DEFAULT_RETRIEVAL_K: usize = 30;
/// Final number of items returned when the caller does not ask for a specific limit.
pub const DEFAULT_FINAL_K: usize = 10;
/// Largest `limit` accepted by the orchestrator.
pub const MAX_LIMIT: usize = 200;

/// Lower bound for `num_candidates` on vector queries.
pub const MIN_NUM_CANDIDATES: usize = 200;
/// `num_candidates` multiplier applied to `k`.
pub const NUM_CANDIDATES_FACTOR: usize = 10;

/// Weight of the model score in the blended rerank score.
pub const DEFAULT_RERANK_ALPHA: f32 = 0.75;
/// Additional attempts after a schema violation.
pub const DEFAULT_RERANK_MAX_RETRIES: usize = 2;
/// Candidates included in a rerank payload.
pub const MAX_RERANK_CANDIDATES: usize = 50;
/// Token budget for score-only rerank responses (doubled with rationale).
pub const RERANK_BASE_MAX_TOKENS: u32 = 256;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;
pub const DEFAULT_EMBEDDING_DIM_U64: u64 = DEFAULT_EMBEDDING_DIM as u64;
pub const DEFAULT_RERANK_MODEL: &str = "gpt-4o-mini";

pub const DEFAULT_VECTOR_CACHE_TTL_SECS: u64 = 24 * 3600;
pub const DEFAULT_RESULT_CACHE_TTL_SECS: u64 = 24 * 3600;
pub const DEFAULT_NEGATIVE_CACHE_TTL_SECS: u64 = 5 * 60;
pub const DEFAULT_XSELL_CACHE_TTL_SECS: u64 = 24 * 3600;
pub const DEFAULT_TOP_SALES_CACHE_TTL_SECS: u64 = 5 * 60;
pub const DEFAULT_LOCK_TTL_SECS: u64 = 20;
/// Interval between cache polls while another worker holds the embedding lock.
pub const LOCK_POLL_INTERVAL_MS: u64 = 100;

/// Store scan chunk size for the batch embedding job.
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 500;
/// Provider call chunk size for the batch embedding job.
pub const DEFAULT_PROVIDER_BATCH_SIZE: usize = 64;
pub const MAX_PROVIDER_BATCH_SIZE: usize = 2048;
pub const MIN_SCAN_BATCH_SIZE: usize = 10;
pub const MAX_SCAN_BATCH_SIZE: usize = 5000;

/// Default and largest number of products on the last-seen listing.
pub const DEFAULT_LAST_SEEN_LIMIT: usize = 20;
pub const MAX_LAST_SEEN_LIMIT: usize = 100;

pub const VECTOR_CACHE_PREFIX: &str = "vec";
pub const LOCK_PREFIX: &str = "lock";
pub const XSELL_CACHE_PREFIX: &str = "xsell";
pub const TOP_SALES_CACHE_PREFIX: &str = "top_sales";
