//! In-memory catalog store
//!
//! Evaluates predicates with the same Rust code the scorer uses. Counts
//! every call and can be told to fail, which makes it the store of choice
//! for exercising the search pipeline without a database.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use licensr_common::db::{PopularSearch, SearchLogRecord, SynonymEntry, Track};
use licensr_common::{Error, Result};
use tokio::sync::RwLock;

use super::{CatalogStore, StrictQuery};
use crate::search::{normalize_terms, Combinator, PredicateSet, RelevanceScorer, SearchResult};

/// Snapshot of how often each store operation ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub lookup_synonyms: usize,
    pub recent_tracks: usize,
    pub strict_search: usize,
    pub loose_search: usize,
    pub log_search: usize,
    pub popular_searches: usize,
    pub recent_searches: usize,
}

#[derive(Default)]
struct Counters {
    lookup_synonyms: AtomicUsize,
    recent_tracks: AtomicUsize,
    strict_search: AtomicUsize,
    loose_search: AtomicUsize,
    log_search: AtomicUsize,
    popular_searches: AtomicUsize,
    recent_searches: AtomicUsize,
}

#[derive(Default)]
pub struct MemoryCatalogStore {
    tracks: RwLock<Vec<Track>>,
    synonyms: RwLock<Vec<SynonymEntry>>,
    log: RwLock<Vec<SearchLogRecord>>,
    counters: Counters,
    fail_logging: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks: RwLock::new(tracks),
            ..Default::default()
        }
    }

    pub async fn insert_track(&self, track: Track) {
        self.tracks.write().await.push(track);
    }

    pub async fn add_synonyms(&self, term: &str, synonyms: &[&str]) {
        self.synonyms.write().await.push(SynonymEntry {
            term: term.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        });
    }

    /// Seed the log directly, bypassing the call counter
    pub async fn push_log_record(&self, record: SearchLogRecord) {
        self.log.write().await.push(record);
    }

    pub async fn log_records(&self) -> Vec<SearchLogRecord> {
        self.log.read().await.clone()
    }

    /// Make every `log_search` call fail
    pub fn fail_logging(&self, fail: bool) {
        self.fail_logging.store(fail, Ordering::SeqCst);
    }

    /// Make every read fail (synonyms, searches, aggregates)
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> StoreCalls {
        let c = &self.counters;
        StoreCalls {
            lookup_synonyms: c.lookup_synonyms.load(Ordering::SeqCst),
            recent_tracks: c.recent_tracks.load(Ordering::SeqCst),
            strict_search: c.strict_search.load(Ordering::SeqCst),
            loose_search: c.loose_search.load(Ordering::SeqCst),
            log_search: c.log_search.load(Ordering::SeqCst),
            popular_searches: c.popular_searches.load(Ordering::SeqCst),
            recent_searches: c.recent_searches.load(Ordering::SeqCst),
        }
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Internal("simulated read failure".to_string()));
        }
        Ok(())
    }

    /// Searchable tracks, newest first
    async fn searchable(&self) -> Vec<Track> {
        let mut tracks: Vec<Track> = self
            .tracks
            .read()
            .await
            .iter()
            .filter(|t| t.is_searchable())
            .cloned()
            .collect();
        tracks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tracks
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn lookup_synonyms(&self, terms: &[String]) -> Result<Vec<SynonymEntry>> {
        self.counters.lookup_synonyms.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        let terms = normalize_terms(terms);
        Ok(self
            .synonyms
            .read()
            .await
            .iter()
            .filter(|entry| {
                std::iter::once(&entry.term)
                    .chain(entry.synonyms.iter())
                    .any(|member| terms.contains(&member.trim().to_lowercase()))
            })
            .cloned()
            .collect())
    }

    async fn recent_tracks(&self, limit: usize) -> Result<Vec<Track>> {
        self.counters.recent_tracks.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        let mut tracks = self.searchable().await;
        tracks.truncate(limit);
        Ok(tracks)
    }

    async fn strict_search(&self, query: StrictQuery<'_>) -> Result<Vec<SearchResult>> {
        self.counters.strict_search.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        let matching = self
            .searchable()
            .await
            .into_iter()
            .filter(|t| query.predicates.matches(t, Combinator::All));

        Ok(RelevanceScorer::new(query.weights).rank(
            matching,
            query.terms,
            query.predicates.tokens(),
            query.limit,
        ))
    }

    async fn loose_search(&self, predicates: &PredicateSet, limit: usize) -> Result<Vec<Track>> {
        self.counters.loose_search.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        Ok(self
            .searchable()
            .await
            .into_iter()
            .filter(|t| predicates.matches(t, Combinator::Any))
            .take(limit)
            .collect())
    }

    async fn log_search(&self, record: &SearchLogRecord) -> Result<()> {
        self.counters.log_search.fetch_add(1, Ordering::SeqCst);
        if self.fail_logging.load(Ordering::SeqCst) {
            return Err(Error::Internal("simulated log failure".to_string()));
        }

        self.log.write().await.push(record.clone());
        Ok(())
    }

    async fn popular_searches(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PopularSearch>> {
        self.counters.popular_searches.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        let mut counts: Vec<PopularSearch> = Vec::new();
        for record in self.log.read().await.iter() {
            if record.created_at < since || record.query.is_empty() {
                continue;
            }
            match counts.iter_mut().find(|p| p.query == record.query) {
                Some(p) => p.count += 1,
                None => counts.push(PopularSearch {
                    query: record.query.clone(),
                    count: 1,
                }),
            }
        }

        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
        counts.truncate(limit);
        Ok(counts)
    }

    async fn recent_searches(&self, limit: usize) -> Result<Vec<String>> {
        self.counters.recent_searches.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        let mut records: Vec<SearchLogRecord> = self
            .log
            .read()
            .await
            .iter()
            .filter(|r| !r.query.is_empty())
            .cloned()
            .collect();
        // later inserts first among equal timestamps
        records.reverse();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(records.into_iter().take(limit).map(|r| r.query).collect())
    }
}
