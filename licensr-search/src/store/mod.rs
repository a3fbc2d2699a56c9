//! Data-access layer for catalog search
//!
//! Handlers and the search pipeline only ever see `dyn CatalogStore`, so the
//! SQLite store used in production can be swapped for the in-memory store in
//! tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use licensr_common::config::RelevanceWeights;
use licensr_common::db::{FacetTerms, PopularSearch, SearchLogRecord, SynonymEntry, Track};
use licensr_common::Result;

use crate::search::{PredicateSet, SearchResult};

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryCatalogStore, StoreCalls};
pub use sqlite::SqliteCatalogStore;

/// Strict-tier query: every predicate must hold, rows come back scored
#[derive(Debug, Clone, Copy)]
pub struct StrictQuery<'a> {
    pub predicates: &'a PredicateSet,
    /// Expanded terms for scoring (includes facets that never filter)
    pub terms: &'a FacetTerms,
    pub weights: RelevanceWeights,
    pub limit: usize,
}

/// Catalog data access
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every synonym entry whose canonical term or any synonym equals one of
    /// `terms` (case-insensitive). One round-trip regardless of term count.
    async fn lookup_synonyms(&self, terms: &[String]) -> Result<Vec<SynonymEntry>>;

    /// Most recently created searchable tracks, newest first
    async fn recent_tracks(&self, limit: usize) -> Result<Vec<Track>>;

    /// AND-combined search ordered by relevance desc then created_at desc
    async fn strict_search(&self, query: StrictQuery<'_>) -> Result<Vec<SearchResult>>;

    /// OR-combined search ordered by created_at desc, unscored
    async fn loose_search(&self, predicates: &PredicateSet, limit: usize) -> Result<Vec<Track>>;

    /// Append one record to the search log
    async fn log_search(&self, record: &SearchLogRecord) -> Result<()>;

    /// Raw queries logged since `since`, grouped and counted, most frequent first
    async fn popular_searches(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PopularSearch>>;

    /// Most recently logged raw queries, newest first, duplicates kept
    async fn recent_searches(&self, limit: usize) -> Result<Vec<String>>;
}
