use serde::{Deserialize, Serialize};

use crate::catalog::FilterSet;
use crate::constants::{DEFAULT_FINAL_K, DEFAULT_LAST_SEEN_LIMIT};

/// Default number of cross-sell and best-seller items.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// One recommended product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub product_id: String,
    /// In `[0, 1]`.
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl RecommendationItem {
    /// Creates an item, clamping the score into `[0, 1]` (non-finite scores become `0`).
    pub fn new(product_id: impl Into<String>, score: f32) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            product_id: product_id.into(),
            score,
            rationale: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

#[derive(Deserialize)]
struct RecommendationResultWire {
    source_product_id: String,
    #[serde(default)]
    items: Vec<RecommendationItem>,
}

/// Ordered recommendations for one source product. `count` always equals `items.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecommendationResultWire")]
pub struct RecommendationResult {
    source_product_id: String,
    items: Vec<RecommendationItem>,
    count: usize,
}

impl From<RecommendationResultWire> for RecommendationResult {
    fn from(wire: RecommendationResultWire) -> Self {
        Self::new(wire.source_product_id, wire.items)
    }
}

impl RecommendationResult {
    pub fn new(source_product_id: impl Into<String>, items: Vec<RecommendationItem>) -> Self {
        Self {
            source_product_id: source_product_id.into(),
            count: items.len(),
            items,
        }
    }

    pub fn empty(source_product_id: impl Into<String>) -> Self {
        Self::new(source_product_id, Vec::new())
    }

    pub fn source_product_id(&self) -> &str {
        &self.source_product_id
    }

    pub fn items(&self) -> &[RecommendationItem] {
        &self.items
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<RecommendationItem> {
        self.items
    }
}

/// API version namespace of cached results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    #[default]
    V1,
    V2,
}

impl ApiVersion {
    /// Resolves an `X-API-Version` header value (`1`/`v1`, `2`/`v2`); anything else is v1.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("2" | "v2") => ApiVersion::V2,
            _ => ApiVersion::V1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rerank mode recorded in result cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankMode {
    Off,
    /// Reranked without rationales.
    Scored,
    /// Reranked with rationales.
    Explained,
}

impl RerankMode {
    pub fn from_flags(rerank: bool, include_rationale: bool) -> Self {
        match (rerank, include_rationale) {
            (false, _) => RerankMode::Off,
            (true, false) => RerankMode::Scored,
            (true, true) => RerankMode::Explained,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RerankMode::Off => "off",
            RerankMode::Scored => "scored",
            RerankMode::Explained => "explained",
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, RerankMode::Off)
    }

    pub fn includes_rationale(&self) -> bool {
        matches!(self, RerankMode::Explained)
    }
}

/// Parameters of a similarity-style recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendRequest {
    pub product_id: String,
    pub kind: String,
    pub limit: usize,
    /// Replaces the kind's default filters when set.
    pub filters: Option<FilterSet>,
    pub use_text_fallback: bool,
    pub rerank: RerankMode,
    pub api_version: ApiVersion,
}

impl RecommendRequest {
    pub fn new(product_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            kind: kind.into(),
            limit: DEFAULT_FINAL_K,
            filters: None,
            use_text_fallback: true,
            rerank: RerankMode::Off,
            api_version: ApiVersion::V1,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_text_fallback(mut self, enabled: bool) -> Self {
        self.use_text_fallback = enabled;
        self
    }

    pub fn with_rerank(mut self, mode: RerankMode) -> Self {
        self.rerank = mode;
        self
    }

    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }
}

/// Parameters of a co-purchase (cross-sell) recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSellRequest {
    pub product_id: String,
    /// Restricts mining to this user's orders and enables history exclusions.
    pub user_id: Option<String>,
    pub limit: usize,
    pub rerank: RerankMode,
    pub brands: Vec<String>,
    pub category_ids: Vec<String>,
    pub exclude_purchased: bool,
    pub exclude_in_cart: bool,
    pub api_version: ApiVersion,
}

impl CrossSellRequest {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            user_id: None,
            limit: DEFAULT_LIST_LIMIT,
            rerank: RerankMode::Off,
            brands: Vec::new(),
            category_ids: Vec::new(),
            exclude_purchased: true,
            exclude_in_cart: true,
            api_version: ApiVersion::V1,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_rerank(mut self, mode: RerankMode) -> Self {
        self.rerank = mode;
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brands.push(brand.into());
        self
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_ids.push(category_id.into());
        self
    }

    pub fn with_exclusions(mut self, purchased: bool, in_cart: bool) -> Self {
        self.exclude_purchased = purchased;
        self.exclude_in_cart = in_cart;
        self
    }

    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }
}

/// Parameters of the best-seller listing.
#[derive(Debug, Clone, PartialEq)]
pub struct TopSalesRequest {
    pub limit: usize,
    pub brands: Vec<String>,
    pub category_ids: Vec<String>,
    pub api_version: ApiVersion,
}

impl Default for TopSalesRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            brands: Vec::new(),
            category_ids: Vec::new(),
            api_version: ApiVersion::V1,
        }
    }
}

impl TopSalesRequest {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn with_brands(mut self, brands: Vec<String>) -> Self {
        self.brands = brands;
        self
    }

    pub fn with_categories(mut self, category_ids: Vec<String>) -> Self {
        self.category_ids = category_ids;
        self
    }

    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopSalesItem {
    pub product_id: String,
    pub units: u64,
    pub orders: u64,
}

#[derive(Deserialize)]
struct TopSalesResultWire {
    #[serde(default)]
    items: Vec<TopSalesItem>,
}

impl From<TopSalesResultWire> for TopSalesResult {
    fn from(wire: TopSalesResultWire) -> Self {
        Self::new(wire.items)
    }
}

/// Best sellers, most units first. `count` always equals `items.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TopSalesResultWire")]
pub struct TopSalesResult {
    items: Vec<TopSalesItem>,
    count: usize,
}

impl TopSalesResult {
    pub fn new(items: Vec<TopSalesItem>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }

    pub fn items(&self) -> &[TopSalesItem] {
        &self.items
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Recently viewed products of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastSeenRequest {
    pub user_id: String,
    pub limit: usize,
}

impl LastSeenRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            limit: DEFAULT_LAST_SEEN_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSeenItem {
    pub product_id: String,
}

#[derive(Deserialize)]
struct LastSeenResultWire {
    #[serde(default)]
    items: Vec<LastSeenItem>,
}

impl From<LastSeenResultWire> for LastSeenResult {
    fn from(wire: LastSeenResultWire) -> Self {
        Self::new(wire.items)
    }
}

/// Distinct viewed products, most recent first. `count` always equals `items.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LastSeenResultWire")]
pub struct LastSeenResult {
    items: Vec<LastSeenItem>,
    count: usize,
}

impl LastSeenResult {
    pub fn new(items: Vec<LastSeenItem>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }

    pub fn items(&self) -> &[LastSeenItem] {
        &self.items
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
