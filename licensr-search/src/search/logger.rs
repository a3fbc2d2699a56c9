//! Search query log
//!
//! Writes are best-effort: a failed insert is reported through tracing and
//! never reaches the caller. Aggregate reads are part of the response and
//! propagate their errors.

use chrono::{Duration, Utc};
use licensr_common::config::SearchSettings;
use licensr_common::db::{FacetTerms, PopularSearch, SearchLogRecord};
use licensr_common::Result;
use tracing::warn;
use uuid::Uuid;

use crate::store::CatalogStore;

pub struct SearchLogger<'a> {
    store: &'a dyn CatalogStore,
    settings: &'a SearchSettings,
}

impl<'a> SearchLogger<'a> {
    pub fn new(store: &'a dyn CatalogStore, settings: &'a SearchSettings) -> Self {
        Self { store, settings }
    }

    /// Append one record; returns whether the write succeeded
    pub async fn record(&self, query: &str, user_id: Option<&str>, terms: &FacetTerms) -> bool {
        let record = SearchLogRecord {
            id: Uuid::new_v4(),
            query: query.trim().to_string(),
            user_id: user_id.map(str::to_string),
            terms: terms.clone(),
            created_at: Utc::now(),
        };

        match self.store.log_search(&record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, query = %record.query, "Failed to log search query");
                false
            }
        }
    }

    /// Most frequent raw queries over the trailing window
    pub async fn popular(&self) -> Result<Vec<PopularSearch>> {
        let since = Utc::now() - Duration::days(self.settings.popular_window_days);
        self.store
            .popular_searches(since, self.settings.meta_list_len)
            .await
    }

    /// Latest raw queries, newest first
    pub async fn recent(&self) -> Result<Vec<String>> {
        self.store.recent_searches(self.settings.meta_list_len).await
    }
}
