//! licensr-search library - catalog search service
//!
//! Synonym-expanded, tiered facet and text search over the track catalog,
//! with an append-only query log feeding popular/recent search lists.

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use licensr_common::config::SearchSettings;
use licensr_common::{Error, Result};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod search;
pub mod store;

pub use crate::error::{ApiError, ApiResult};
use crate::search::SearchService;
use crate::store::CatalogStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub search: SearchService,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn CatalogStore>, settings: SearchSettings) -> Result<Self> {
        Ok(Self {
            search: SearchService::new(store, settings)?,
            startup_time: Utc::now(),
        })
    }
}

/// CORS policy: the configured origin only, or any origin when unset
pub fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(api::search::USER_ID_HEADER),
        ]);

    match origin {
        Some(origin) => {
            let value = HeaderValue::from_str(origin)
                .map_err(|e| Error::Config(format!("invalid CORS origin {:?}: {}", origin, e)))?;
            Ok(layer.allow_origin(value))
        }
        None => Ok(layer.allow_origin(Any)),
    }
}

/// Build application router
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/search", post(api::search))
        .route("/api/search", post(api::search))
        .route("/api/search/popular", get(api::popular_searches))
        .route("/api/search/recent", get(api::recent_searches))
        .merge(api::health_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
