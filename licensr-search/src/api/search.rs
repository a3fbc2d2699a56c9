//! Catalog search endpoints
//!
//! `POST /search`, `POST /api/search`: tiered facet + text search
//! `GET /api/search/popular`, `GET /api/search/recent`: query log aggregates

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use licensr_common::db::{FacetTerms, PopularSearch};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::search::{SearchRequest, SearchResult, Tier};
use crate::AppState;

/// Header carrying the authenticated user id, set by the fronting auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

/// Search request body; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub query: Option<String>,
    pub genres: Option<Vec<String>>,
    #[serde(alias = "subGenres")]
    pub subgenres: Option<Vec<String>>,
    pub moods: Option<Vec<String>>,
    pub usage_types: Option<Vec<String>>,
    /// Instrument terms only add relevance to rows another constraint
    /// selected. They never filter, so a request carrying nothing but
    /// instruments is served from the recent tier, unscored.
    pub instruments: Option<Vec<String>>,
    pub limit: Option<i64>,
}

impl SearchBody {
    /// Reject values the deserializer lets through
    pub fn into_request(self, user_id: Option<String>) -> ApiResult<SearchRequest> {
        let limit = match self.limit {
            Some(l) if l <= 0 => {
                return Err(ApiError::BadRequest(format!(
                    "limit must be a positive integer, got {}",
                    l
                )))
            }
            Some(l) => Some(usize::try_from(l).unwrap_or(usize::MAX)),
            None => None,
        };

        Ok(SearchRequest {
            query: self.query.unwrap_or_default(),
            genres: self.genres.unwrap_or_default(),
            sub_genres: self.subgenres.unwrap_or_default(),
            moods: self.moods.unwrap_or_default(),
            usage_types: self.usage_types.unwrap_or_default(),
            instruments: self.instruments.unwrap_or_default(),
            limit,
            user_id,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta {
    pub count: usize,
    pub tier: Tier,
    pub expanded_terms: FacetTerms,
    pub popular_searches: Vec<PopularSearch>,
    pub recent_searches: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub ok: bool,
    pub results: Vec<SearchResult>,
    pub meta: SearchMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularResponse {
    pub ok: bool,
    pub popular_searches: Vec<PopularSearch>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentResponse {
    pub ok: bool,
    pub recent_searches: Vec<String>,
}

/// POST /search, POST /api/search
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SearchBody>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(body) = payload?;
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let request = body.into_request(user_id)?;
    let report = state.search.search(request).await?;

    Ok(Json(SearchResponse {
        ok: true,
        meta: SearchMeta {
            count: report.results.len(),
            tier: report.tier,
            expanded_terms: report.terms,
            popular_searches: report.popular_searches,
            recent_searches: report.recent_searches,
        },
        results: report.results,
    }))
}

/// GET /api/search/popular
pub async fn popular_searches(State(state): State<AppState>) -> ApiResult<Json<PopularResponse>> {
    Ok(Json(PopularResponse {
        ok: true,
        popular_searches: state.search.popular_searches().await?,
    }))
}

/// GET /api/search/recent
pub async fn recent_searches(State(state): State<AppState>) -> ApiResult<Json<RecentResponse>> {
    Ok(Json(RecentResponse {
        ok: true,
        recent_searches: state.search.recent_searches().await?,
    }))
}
