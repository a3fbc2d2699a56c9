//! HTTP API handlers for licensr-search

pub mod health;
pub mod search;

pub use health::health_routes;
pub use search::{popular_searches, recent_searches, search};
