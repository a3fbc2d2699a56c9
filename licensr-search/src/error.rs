//! Error types for licensr-search
//!
//! Every failure is rendered as `{ "ok": false, "error": "..." }`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request, rejected before any store access (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Store failure on the critical path (500)
    #[error(transparent)]
    Store(#[from] licensr_common::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "ok": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let bad = ApiError::BadRequest("limit must be positive".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let store = ApiError::Store(licensr_common::Error::Internal("down".into())).into_response();
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
