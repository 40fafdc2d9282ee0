use std::collections::BTreeMap;
use std::time::Instant;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::cache::{CacheStore, RECO_STATUS_HEADER, ResultSource};
use crate::catalog::CatalogStore;
use crate::constants::{
    DEFAULT_LAST_SEEN_LIMIT, DEFAULT_PROVIDER_BATCH_SIZE, DEFAULT_SCAN_BATCH_SIZE,
    MAX_PROVIDER_BATCH_SIZE, MAX_SCAN_BATCH_SIZE, MIN_SCAN_BATCH_SIZE,
};
use crate::embedding::{BatchEmbedOptions, BatchEmbedStats, EmbeddingProvider, VectorizeOptions};
use crate::gateway::error::GatewayError;
use crate::gateway::state::HandlerState;
use crate::kinds::{KIND_COMPLEMENTARY, KIND_SIMILAR};
use crate::recommend::{
    ApiVersion, CrossSellRequest, DEFAULT_LIST_LIMIT, LastSeenRequest, RecommendRequest,
    RerankMode, TopSalesRequest,
};
use crate::rerank::CompletionProvider;

pub const API_VERSION_HEADER: &str = "X-API-Version";

/// Largest `limit` on the similar/complementary routes.
pub const PRODUCT_ROUTE_MAX_LIMIT: usize = 50;

const DEFAULT_PRODUCT_ROUTE_LIMIT: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct RecommendQuery {
    pub limit: Option<usize>,
    pub use_text_fallback: Option<bool>,
    pub use_llm_rerank: Option<bool>,
    pub include_rationale: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CrossSellQuery {
    pub user_id: Option<String>,
    pub limit: Option<usize>,
    pub use_llm_rerank: Option<bool>,
    pub include_rationale: Option<bool>,
    pub brand: Option<String>,
    pub category_id: Option<String>,
    pub exclude_already_purchased: Option<bool>,
    pub exclude_already_in_cart: Option<bool>,
}

/// `brand` and `category_id` accept comma-separated lists.
#[derive(Debug, Default, Deserialize)]
pub struct TopSalesQuery {
    pub limit: Option<usize>,
    pub brand: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchEmbedRequest {
    pub product_ids: Vec<String>,
    #[serde(default = "default_batch_kinds")]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default = "default_write_back")]
    pub write_back: bool,
    #[serde(default, alias = "openai_batch_size")]
    pub provider_batch_size: Option<usize>,
    #[serde(default)]
    pub scan_batch_size: Option<usize>,
}

fn default_batch_kinds() -> Vec<String> {
    vec![KIND_SIMILAR.to_string(), KIND_COMPLEMENTARY.to_string()]
}

fn default_write_back() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchEmbedResponse {
    pub stats: Vec<BatchEmbedStats>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LastSeenQuery {
    pub limit: Option<usize>,
}

/// Query of the catalog-wide vectorize route.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VectorizeQuery {
    pub force: bool,
    pub do_sim: bool,
    pub do_comp: bool,
    /// Maximum number of products to scan.
    pub limit: Option<usize>,
    #[serde(alias = "openai_batch_size")]
    pub provider_batch_size: usize,
    pub scan_batch_size: usize,
}

impl Default for VectorizeQuery {
    fn default() -> Self {
        Self {
            force: false,
            do_sim: true,
            do_comp: true,
            limit: None,
            provider_batch_size: DEFAULT_PROVIDER_BATCH_SIZE,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VectorizeResponse {
    pub version: ApiVersion,
    pub seen: usize,
    pub stats_by_kind: BTreeMap<String, BatchEmbedStats>,
    pub errors: Vec<String>,
    pub elapsed_ms: u64,
}

pub fn api_version(headers: &HeaderMap) -> ApiVersion {
    ApiVersion::resolve(
        headers
            .get(API_VERSION_HEADER)
            .and_then(|v| v.to_str().ok()),
    )
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Batch options with validated chunk sizes; `None` keeps the default.
fn batch_options(
    force: bool,
    write_back: bool,
    provider_batch_size: Option<usize>,
    scan_batch_size: Option<usize>,
) -> Result<BatchEmbedOptions, GatewayError> {
    let provider_batch_size = provider_batch_size.unwrap_or(DEFAULT_PROVIDER_BATCH_SIZE);
    if !(1..=MAX_PROVIDER_BATCH_SIZE).contains(&provider_batch_size) {
        return Err(GatewayError::invalid(format!(
            "provider_batch_size must be within 1..={MAX_PROVIDER_BATCH_SIZE}"
        )));
    }
    let scan_batch_size = scan_batch_size.unwrap_or(DEFAULT_SCAN_BATCH_SIZE);
    if !(MIN_SCAN_BATCH_SIZE..=MAX_SCAN_BATCH_SIZE).contains(&scan_batch_size) {
        return Err(GatewayError::invalid(format!(
            "scan_batch_size must be within {MIN_SCAN_BATCH_SIZE}..={MAX_SCAN_BATCH_SIZE}"
        )));
    }

    Ok(BatchEmbedOptions {
        force,
        write_back,
        hydrate_cache: true,
        provider_batch_size,
        scan_batch_size,
    })
}

fn with_source<T: Serialize>(body: T, source: ResultSource) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        RECO_STATUS_HEADER,
        HeaderValue::from_static(source.as_header_value()),
    );
    (StatusCode::OK, headers, Json(body)).into_response()
}

async fn product_route<S, C, E, P>(
    state: &HandlerState<S, C, E, P>,
    product_id: String,
    kind: &str,
    default_text_fallback: bool,
    headers: &HeaderMap,
    query: RecommendQuery,
) -> Result<Response, GatewayError>
where
    S: CatalogStore + 'static,
    C: CacheStore + 'static,
    E: EmbeddingProvider + 'static,
    P: CompletionProvider + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_PRODUCT_ROUTE_LIMIT);
    if !(1..=PRODUCT_ROUTE_MAX_LIMIT).contains(&limit) {
        return Err(GatewayError::invalid(format!(
            "limit must be within 1..={PRODUCT_ROUTE_MAX_LIMIT}"
        )));
    }

    let request = RecommendRequest::new(product_id, kind)
        .with_limit(limit)
        .with_text_fallback(query.use_text_fallback.unwrap_or(default_text_fallback))
        .with_rerank(RerankMode::from_flags(
            query.use_llm_rerank.unwrap_or(true),
            query.include_rationale.unwrap_or(false),
        ))
        .with_api_version(api_version(headers));

    let started = Instant::now();
    let (result, source) = state.recommender.recommend_traced(&request).await?;
    info!(
        count = result.count(),
        source = %source,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "recommendation served"
    );

    Ok(with_source(result, source))
}

#[instrument(skip(state, headers, query))]
pub async fn similar_handler<S, C, E, P>(
    State(state): State<HandlerState<S, C, E, P>>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<RecommendQuery>,
) -> Result<Response, GatewayError>
where
    S: CatalogStore + 'static,
    C: CacheStore + 'static,
    E: EmbeddingProvider + 'static,
    P: CompletionProvider + 'static,
{
    product_route(&state, product_id, KIND_SIMILAR, true, &headers, query).await
}

#[instrument(skip(state, headers, query))]
pub async fn complementary_handler<S, C, E, P>(
    State(state): State<HandlerState<S, C, E, P>>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<RecommendQuery>,
) -> Result<Response, GatewayError>
where
    S: CatalogStore + 'static,
    C: CacheStore + 'static,
    E: EmbeddingProvider + 'static,
    P: CompletionProvider + 'static,
{
    product_route(&state, product_id, KIND_COMPLEMENTARY, false, &headers, query).await
}

#[instrument(skip(state, headers, query))]
pub async fn cross_sell_handler<S, C, E, P>(
    State(state): State<HandlerState<S, C, E, P>>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<CrossSellQuery>,
) -> Result<Response, GatewayError>
where
    S: CatalogStore + 'static,
    C: CacheStore + 'static,
    E: EmbeddingProvider + 'static,
    P: CompletionProvider + 'static,
{
    let mut request = CrossSellRequest::new(product_id)
        .with_limit(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .with_rerank(RerankMode::from_flags(
            query.use_llm_rerank.unwrap_or(true),
            query.include_rationale.unwrap_or(false),
        ))
        .with_exclusions(
            query.exclude_already_purchased.unwrap_or(true),
            query.exclude_already_in_cart.unwrap_or(true),
        )
        .with_api_version(api_version(&headers));
    if let Some(user_id) = query.user_id.filter(|u| !u.trim().is_empty()) {
        request = request.with_user(user_id);
    }
    if let Some(brand) = query.brand.filter(|b| !b.is_empty()) {
        request = request.with_brand(brand);
    }
    if let Some(category_id) = query.category_id.filter(|c| !c.is_empty()) {
        request = request.with_category(category_id);
    }

    let (result, source) = state.recommender.cross_sell_traced(&request).await?;
    info!(count = result.count(), source = %source, "cross-sell served");
    Ok(with_source(result, source))
}

#[instrument(skip(state, headers, query))]
pub async fn top_sales_handler<S, C, E, P>(
    State(state): State<HandlerState<S, C, E, P>>,
    headers: HeaderMap,
    Query(query): Query<TopSalesQuery>,
) -> Result<Response, GatewayError>
where
    S: CatalogStore + 'static,
    C: CacheStore + 'static,
    E: EmbeddingProvider + 'static,
    P: CompletionProvider + 'static,
{
    let request = TopSalesRequest::new(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .with_brands(split_list(query.brand.as_deref()))
        .with_categories(split_list(query.category_id.as_deref()))
        .with_api_version(api_version(&headers));

    let (result, source) = state.recommender.top_sales_traced(&request).await?;
    Ok(with_source(result, source))
}

#[instrument(skip(state, request), fields(products = request.product_ids.len()))]
pub async fn batch_embed_handler<S, C, E, P>(
    State(state): State<HandlerState<S, C, E, P>>,
    Json(request): Json<BatchEmbedRequest>,
) -> Result<Response, GatewayError>
where
    S: CatalogStore + 'static,
    C: CacheStore + 'static,
    E: EmbeddingProvider + 'static,
    P: CompletionProvider + 'static,
{
    if request.product_ids.is_empty() {
        return Err(GatewayError::invalid("product_ids must not be empty"));
    }
    if request.kinds.is_empty() {
        return Err(GatewayError::invalid("enable at least one embedding kind"));
    }
    let kinds = state.recommender.kinds();
    if let Some(unknown) = request.kinds.iter().find(|k| !kinds.contains(k)) {
        return Err(GatewayError::invalid(format!("unknown kind '{unknown}'")));
    }

    let options = batch_options(
        request.force,
        request.write_back,
        request.provider_batch_size,
        request.scan_batch_size,
    )?;

    let started = Instant::now();
    let mut stats = Vec::with_capacity(request.kinds.len());
    for kind in &request.kinds {
        stats.push(
            state
                .recommender
                .embeddings()
                .batch_get_or_create(&request.product_ids, kind, options)
                .await,
        );
    }
    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(kinds = stats.len(), elapsed_ms, "batch embedding finished");

    Ok((
        StatusCode::OK,
        Json(BatchEmbedResponse { stats, elapsed_ms }),
    )
        .into_response())
}

/// Scans the whole product catalog and backfills the selected kinds.
#[instrument(skip(state, headers, query))]
pub async fn vectorize_handler<S, C, E, P>(
    State(state): State<HandlerState<S, C, E, P>>,
    headers: HeaderMap,
    Query(query): Query<VectorizeQuery>,
) -> Result<Response, GatewayError>
where
    S: CatalogStore + 'static,
    C: CacheStore + 'static,
    E: EmbeddingProvider + 'static,
    P: CompletionProvider + 'static,
{
    let mut kinds = Vec::new();
    if query.do_sim {
        kinds.push(KIND_SIMILAR.to_string());
    }
    if query.do_comp {
        kinds.push(KIND_COMPLEMENTARY.to_string());
    }
    if kinds.is_empty() {
        return Err(GatewayError::invalid(
            "enable at least one embedding kind (do_sim or do_comp)",
        ));
    }
    if query.limit == Some(0) {
        return Err(GatewayError::invalid("limit must be at least 1"));
    }

    let options = VectorizeOptions {
        batch: batch_options(
            query.force,
            true,
            Some(query.provider_batch_size),
            Some(query.scan_batch_size),
        )?,
        limit: query.limit,
    };

    let started = Instant::now();
    let stats = state
        .recommender
        .embeddings()
        .vectorize_catalog(&kinds, options)
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(seen = stats.seen, elapsed_ms, "vectorize finished");

    Ok((
        StatusCode::OK,
        Json(VectorizeResponse {
            version: api_version(&headers),
            seen: stats.seen,
            stats_by_kind: stats
                .kinds
                .into_iter()
                .map(|k| (k.kind.clone(), k))
                .collect(),
            errors: stats.errors,
            elapsed_ms,
        }),
    )
        .into_response())
}

#[instrument(skip(state, query))]
pub async fn last_seen_handler<S, C, E, P>(
    State(state): State<HandlerState<S, C, E, P>>,
    Path(user_id): Path<String>,
    Query(query): Query<LastSeenQuery>,
) -> Result<Response, GatewayError>
where
    S: CatalogStore + 'static,
    C: CacheStore + 'static,
    E: EmbeddingProvider + 'static,
    P: CompletionProvider + 'static,
{
    let request =
        LastSeenRequest::new(user_id).with_limit(query.limit.unwrap_or(DEFAULT_LAST_SEEN_LIMIT));
    let result = state.recommender.last_seen(&request).await?;
    if result.is_empty() {
        return Err(GatewayError::NotFound {
            reason: "no view events found for this user".to_string(),
        });
    }

    Ok((StatusCode::OK, Json(result)).into_response())
}
