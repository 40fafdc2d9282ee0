use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cache::RECO_STATUS_HEADER;
use crate::recommend::RecommendError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("not found: {reason}")]
    NotFound { reason: String },

    #[error(transparent)]
    Recommend(#[from] RecommendError),

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl GatewayError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, reco_status) = match &self {
            GatewayError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            GatewayError::Recommend(RecommendError::UnknownKind { .. }) => {
                (StatusCode::BAD_REQUEST, "unknown_kind")
            }
            GatewayError::Recommend(RecommendError::InvalidInput { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_request")
            }
            GatewayError::Recommend(RecommendError::StoreUnavailable { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
            }
            GatewayError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let mut headers = HeaderMap::new();
        headers.insert(RECO_STATUS_HEADER, HeaderValue::from_static(reco_status));

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
