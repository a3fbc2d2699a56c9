//! Shared fixtures for licensr-search integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use licensr_common::config::SearchSettings;
use licensr_common::db::Track;
use licensr_search::store::MemoryCatalogStore;
use licensr_search::{build_router, cors_layer, AppState};
use serde_json::Value;

/// Fixed reference time so ordering assertions are stable
pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Track created `minutes` after the base time
pub fn track(title: &str, minutes: i64) -> Track {
    Track::new(title, base_time() + Duration::minutes(minutes))
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

pub fn app(store: Arc<MemoryCatalogStore>) -> Router {
    app_with_settings(store, SearchSettings::default())
}

pub fn app_with_settings(store: Arc<MemoryCatalogStore>, settings: SearchSettings) -> Router {
    let state = AppState::new(store, settings).unwrap();
    build_router(state, cors_layer(None).unwrap())
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

pub fn result_ids(body: &Value) -> Vec<String> {
    body["results"]
        .as_array()
        .expect("results array")
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}
