//! Recommendation orchestration: similar/complementary pipelines, cross-sell, best sellers and
//! recently viewed products.

pub mod context;
pub mod cross_sell;
pub mod error;
pub mod last_seen;
pub mod pipeline;
pub mod settings;
pub mod top_sales;
pub mod types;

#[cfg(test)]
mod tests;

pub use context::{ServiceContext, ServiceRecommender};
pub use cross_sell::normalize_counts;
pub use error::{ContextError, RecommendError, RecommendResult};
pub use pipeline::Recommender;
pub use settings::RecommenderSettings;
pub use types::{
    ApiVersion, CrossSellRequest, DEFAULT_LIST_LIMIT, LastSeenItem, LastSeenRequest,
    LastSeenResult, RecommendRequest, RecommendationItem, RecommendationResult, RerankMode,
    TopSalesItem, TopSalesRequest, TopSalesResult,
};
