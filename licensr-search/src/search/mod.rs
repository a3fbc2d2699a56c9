//! Catalog search pipeline
//!
//! request → normalize/expand terms → log query → strict tier → optional
//! loose tier + merge → popular/recent metadata.

pub mod executor;
pub mod logger;
pub mod query;
pub mod scoring;
pub mod synonyms;

pub use executor::{merge_fallback, SearchOutcome, Tier, TieredSearch};
pub use logger::SearchLogger;
pub use query::{tokenize_query, Combinator, Predicate, PredicateSet};
pub use scoring::{RelevanceScorer, SearchResult};
pub use synonyms::{expand_terms, normalize_terms};

use std::sync::Arc;

use licensr_common::config::SearchSettings;
use licensr_common::db::{FacetTerms, PopularSearch};
use licensr_common::Result;
use tracing::info;

use crate::store::CatalogStore;

/// Validated search input
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub genres: Vec<String>,
    pub sub_genres: Vec<String>,
    pub moods: Vec<String>,
    pub usage_types: Vec<String>,
    pub instruments: Vec<String>,
    pub limit: Option<usize>,
    pub user_id: Option<String>,
}

/// Everything a search response is built from
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub results: Vec<SearchResult>,
    pub tier: Tier,
    /// Expanded terms actually used
    pub terms: FacetTerms,
    pub popular_searches: Vec<PopularSearch>,
    pub recent_searches: Vec<String>,
}

/// Search entry point shared by all handlers
#[derive(Clone)]
pub struct SearchService {
    store: Arc<dyn CatalogStore>,
    settings: Arc<SearchSettings>,
}

impl SearchService {
    /// Fails on settings that would make limits or the popular window unusable
    pub fn new(store: Arc<dyn CatalogStore>, settings: SearchSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            store,
            settings: Arc::new(settings),
        })
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    fn logger(&self) -> SearchLogger<'_> {
        SearchLogger::new(self.store.as_ref(), &self.settings)
    }

    /// Requested limit, or the default, clamped to `[1, max_limit]`
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.settings.default_limit)
            .clamp(1, self.settings.max_limit)
    }

    /// Normalize and expand every facet; the lookups run concurrently
    pub async fn expand(&self, request: &SearchRequest) -> Result<FacetTerms> {
        let store = self.store.as_ref();
        let genres = normalize_terms(&request.genres);
        let sub_genres = normalize_terms(&request.sub_genres);
        let moods = normalize_terms(&request.moods);
        let usage_types = normalize_terms(&request.usage_types);
        let instruments = normalize_terms(&request.instruments);

        let (genres, sub_genres, moods, usage_types, instruments) = tokio::try_join!(
            expand_terms(store, &genres),
            expand_terms(store, &sub_genres),
            expand_terms(store, &moods),
            expand_terms(store, &usage_types),
            expand_terms(store, &instruments),
        )?;

        Ok(FacetTerms {
            genres,
            sub_genres,
            moods,
            instruments,
            usage_types,
        })
    }

    pub async fn search(&self, request: SearchRequest) -> Result<SearchReport> {
        let limit = self.effective_limit(request.limit);
        let terms = self.expand(&request).await?;
        let tokens = tokenize_query(&request.query);

        self.logger()
            .record(&request.query, request.user_id.as_deref(), &terms)
            .await;

        let outcome = TieredSearch::new(self.store.as_ref(), &self.settings)
            .execute(&terms, &tokens, limit)
            .await?;

        let popular_searches = self.popular_searches().await?;
        let recent_searches = self.recent_searches().await?;

        info!(
            query = %request.query,
            tier = ?outcome.tier,
            count = outcome.results.len(),
            "Search completed"
        );

        Ok(SearchReport {
            results: outcome.results,
            tier: outcome.tier,
            terms,
            popular_searches,
            recent_searches,
        })
    }

    pub async fn popular_searches(&self) -> Result<Vec<PopularSearch>> {
        self.logger().popular().await
    }

    pub async fn recent_searches(&self) -> Result<Vec<String>> {
        self.logger().recent().await
    }
}
