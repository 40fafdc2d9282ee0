//! HTTP gateway (Axum) over the recommendation pipeline.

pub mod error;
pub mod handler;
pub mod state;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::{
    API_VERSION_HEADER, batch_embed_handler, complementary_handler, cross_sell_handler,
    last_seen_handler, similar_handler, top_sales_handler, vectorize_handler,
};
pub use state::HandlerState;

use crate::cache::{
    CacheStore, RECO_STATUS_ERROR, RECO_STATUS_HEADER, RECO_STATUS_HEALTHY, RECO_STATUS_NOT_READY,
    RECO_STATUS_READY,
};
use crate::catalog::CatalogStore;
use crate::embedding::EmbeddingProvider;
use crate::rerank::CompletionProvider;

const READY_PROBE_KEY: &str = "reco:ready";

pub fn create_router_with_state<S, C, E, P>(state: HandlerState<S, C, E, P>) -> Router
where
    S: CatalogStore + 'static,
    C: CacheStore + 'static,
    E: EmbeddingProvider + 'static,
    P: CompletionProvider + 'static,
{
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler::<S, C, E, P>))
        .route(
            "/api/v1/products/{product_id}/similar",
            get(similar_handler::<S, C, E, P>),
        )
        .route(
            "/api/v1/products/{product_id}/complementary",
            get(complementary_handler::<S, C, E, P>),
        )
        .route(
            "/api/v1/products/{product_id}/x-sell",
            get(cross_sell_handler::<S, C, E, P>),
        )
        .route("/api/v1/top-sales", get(top_sales_handler::<S, C, E, P>))
        .route(
            "/users/{user_id}/last-seen-product",
            get(last_seen_handler::<S, C, E, P>),
        )
        .route(
            "/api/v1/embeddings/batch",
            post(batch_embed_handler::<S, C, E, P>),
        )
        .route(
            "/api/v1/products/vectorize",
            post(vectorize_handler::<S, C, E, P>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub catalog: &'static str,
    pub cache: &'static str,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        RECO_STATUS_HEADER,
        HeaderValue::from_static(RECO_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

#[tracing::instrument(skip(state))]
pub async fn ready_handler<S, C, E, P>(State(state): State<HandlerState<S, C, E, P>>) -> Response
where
    S: CatalogStore + 'static,
    C: CacheStore + 'static,
    E: EmbeddingProvider + 'static,
    P: CompletionProvider + 'static,
{
    let catalog_status = match state.recommender.catalog().health_check().await {
        Ok(()) => RECO_STATUS_READY,
        Err(e) => {
            tracing::warn!(error = %e, "catalog not ready");
            RECO_STATUS_ERROR
        }
    };

    let cache_status = match state.recommender.cache().exists(READY_PROBE_KEY).await {
        Ok(_) => RECO_STATUS_READY,
        Err(e) => {
            tracing::warn!(error = %e, "cache not ready");
            RECO_STATUS_ERROR
        }
    };

    let components = ComponentStatus {
        http: RECO_STATUS_READY,
        catalog: catalog_status,
        cache: cache_status,
    };

    let is_ready = components.catalog == RECO_STATUS_READY && components.cache == RECO_STATUS_READY;
    let (status_code, status_msg) = if is_ready {
        (StatusCode::OK, RECO_STATUS_READY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, RECO_STATUS_NOT_READY)
    };

    let mut headers = HeaderMap::new();
    headers.insert(RECO_STATUS_HEADER, HeaderValue::from_static(status_msg));

    (
        status_code,
        headers,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}
