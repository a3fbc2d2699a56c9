//! Relevance scoring
//!
//! Integer score: facet weights for each facet whose set intersects the
//! expanded terms, plus the title and artist bonuses. Used directly by the
//! in-memory store; the SQLite store evaluates the same sum in SQL.

use std::cmp::Ordering;

use licensr_common::config::RelevanceWeights;
use licensr_common::db::{Facet, FacetTerms, Track};
use serde::{Deserialize, Serialize};

use super::query::{contains_token, matches_artist, overlaps};

/// Track plus its computed relevance; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub track: Track,
    pub relevance: u32,
}

impl SearchResult {
    /// Unscored row (recent fallback and loose tier)
    pub fn unscored(track: Track) -> Self {
        Self { track, relevance: 0 }
    }
}

/// Weight of one facet in the table
pub fn facet_weight(weights: &RelevanceWeights, facet: Facet) -> u32 {
    match facet {
        Facet::Genre => weights.genre,
        Facet::SubGenre => weights.sub_genre,
        Facet::Mood => weights.mood,
        Facet::Instrument => weights.instrument,
        Facet::UsageType => weights.usage_type,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelevanceScorer {
    weights: RelevanceWeights,
}

impl RelevanceScorer {
    pub fn new(weights: RelevanceWeights) -> Self {
        Self { weights }
    }

    pub fn score<'a>(
        &self,
        track: &Track,
        terms: &FacetTerms,
        tokens: impl IntoIterator<Item = &'a str> + Clone,
    ) -> u32 {
        let mut score = 0u32;

        for facet in Facet::ALL {
            let set = terms.get(facet);
            if !set.is_empty() && overlaps(track.facet(facet), set) {
                score = score.saturating_add(facet_weight(&self.weights, facet));
            }
        }

        if tokens.clone().into_iter().any(|t| contains_token(&track.title, t)) {
            score = score.saturating_add(self.weights.title);
        }
        if tokens.into_iter().any(|t| matches_artist(track, t)) {
            score = score.saturating_add(self.weights.artist);
        }

        score
    }

    /// Score, order, and truncate to `limit`
    pub fn rank<'a>(
        &self,
        tracks: impl IntoIterator<Item = Track>,
        terms: &FacetTerms,
        tokens: impl IntoIterator<Item = &'a str> + Clone,
        limit: usize,
    ) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = tracks
            .into_iter()
            .map(|track| {
                let relevance = self.score(&track, terms, tokens.clone());
                SearchResult { track, relevance }
            })
            .collect();

        results.sort_by(by_relevance_then_recency);
        results.truncate(limit);
        results
    }
}

/// Relevance descending, then newest first
pub fn by_relevance_then_recency(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.relevance
        .cmp(&a.relevance)
        .then_with(|| b.track.created_at.cmp(&a.track.created_at))
}
