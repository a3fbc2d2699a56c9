//! Tiered search execution
//!
//! ```text
//! NoConstraints  -> RecentFallback -> Respond
//! HasConstraints -> StrictQuery -> (count >= min_results) -> Respond
//!                              \-> (count <  min_results) -> LooseQuery + Merge -> Respond
//! ```

use std::collections::HashSet;

use licensr_common::config::SearchSettings;
use licensr_common::db::{FacetTerms, Track};
use licensr_common::Result;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::query::PredicateSet;
use super::scoring::SearchResult;
use crate::store::{CatalogStore, StrictQuery};

/// Which path produced the results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// No constraints: newest tracks
    Recent,
    /// Strict tier alone met the threshold
    Strict,
    /// Strict tier under-returned and the loose tier filled in
    StrictWithFallback,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub tier: Tier,
}

pub struct TieredSearch<'a> {
    store: &'a dyn CatalogStore,
    settings: &'a SearchSettings,
}

impl<'a> TieredSearch<'a> {
    pub fn new(store: &'a dyn CatalogStore, settings: &'a SearchSettings) -> Self {
        Self { store, settings }
    }

    pub async fn execute(
        &self,
        terms: &FacetTerms,
        tokens: &[String],
        limit: usize,
    ) -> Result<SearchOutcome> {
        let predicates = PredicateSet::build(terms, tokens);

        // instrument terms alone build no predicates and land here
        if predicates.is_empty() {
            let results = self
                .store
                .recent_tracks(limit)
                .await?
                .into_iter()
                .map(SearchResult::unscored)
                .collect();
            return Ok(SearchOutcome {
                results,
                tier: Tier::Recent,
            });
        }

        let strict = self
            .store
            .strict_search(StrictQuery {
                predicates: &predicates,
                terms,
                weights: self.settings.weights,
                limit,
            })
            .await?;

        if strict.len() >= self.settings.min_results || strict.len() >= limit {
            return Ok(SearchOutcome {
                results: strict,
                tier: Tier::Strict,
            });
        }

        debug!(
            strict = strict.len(),
            min_results = self.settings.min_results,
            "Strict tier under threshold, running loose tier"
        );

        // Loose rows may repeat strict ones, so over-fetch by that many
        let fallback = self
            .store
            .loose_search(&predicates, limit + strict.len())
            .await?;

        Ok(SearchOutcome {
            results: merge_fallback(strict, fallback, limit),
            tier: Tier::StrictWithFallback,
        })
    }
}

/// Append fallback rows not already present, stopping at `limit`.
///
/// Strict rows keep their order and always come first; fallback rows carry
/// relevance 0.
pub fn merge_fallback(
    mut strict: Vec<SearchResult>,
    fallback: Vec<Track>,
    limit: usize,
) -> Vec<SearchResult> {
    let mut seen: HashSet<Uuid> = strict.iter().map(|r| r.track.id).collect();

    for track in fallback {
        if strict.len() >= limit {
            break;
        }
        if seen.insert(track.id) {
            strict.push(SearchResult::unscored(track));
        }
    }

    strict
}
