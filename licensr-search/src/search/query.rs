//! Query term building
//!
//! Turns expanded facet terms and free text into a predicate list. The same
//! list serves both tiers; only the [`Combinator`] changes.

use licensr_common::db::{Facet, FacetTerms, Track};

/// How predicates of one tier are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Strict tier: every predicate must hold
    All,
    /// Loose tier: at least one predicate must hold
    Any,
}

/// Single search constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Track's set for `facet` shares at least one element with `terms`
    Overlap { facet: Facet, terms: Vec<String> },
    /// `token` is a case-insensitive substring of the title or artist/description
    Text { token: String },
}

impl Predicate {
    pub fn matches(&self, track: &Track) -> bool {
        match self {
            Predicate::Overlap { facet, terms } => overlaps(track.facet(*facet), terms),
            Predicate::Text { token } => {
                contains_token(&track.title, token) || matches_artist(track, token)
            }
        }
    }
}

/// Predicates for one search request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateSet {
    predicates: Vec<Predicate>,
}

impl PredicateSet {
    /// One overlap predicate per non-empty filterable facet, then one text
    /// predicate per token. Empty facets contribute nothing.
    pub fn build(terms: &FacetTerms, tokens: &[String]) -> Self {
        let mut predicates = Vec::new();

        for facet in Facet::FILTERABLE {
            let set = terms.get(facet);
            if !set.is_empty() {
                predicates.push(Predicate::Overlap {
                    facet,
                    terms: set.to_vec(),
                });
            }
        }

        predicates.extend(
            tokens
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| Predicate::Text { token: t.clone() }),
        );

        Self { predicates }
    }

    /// No constraints at all (not the same as constraints matching nothing)
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter()
    }

    pub fn categorical_count(&self) -> usize {
        self.predicates
            .iter()
            .filter(|p| matches!(p, Predicate::Overlap { .. }))
            .count()
    }

    /// Text tokens in request order
    pub fn tokens(&self) -> impl Iterator<Item = &str> + Clone {
        self.predicates.iter().filter_map(|p| match p {
            Predicate::Text { token } => Some(token.as_str()),
            Predicate::Overlap { .. } => None,
        })
    }

    /// Evaluate against an in-memory track.
    ///
    /// An empty set matches nothing under either combinator; callers route
    /// the no-constraint case elsewhere.
    pub fn matches(&self, track: &Track, combinator: Combinator) -> bool {
        if self.predicates.is_empty() {
            return false;
        }
        match combinator {
            Combinator::All => self.predicates.iter().all(|p| p.matches(track)),
            Combinator::Any => self.predicates.iter().any(|p| p.matches(track)),
        }
    }
}

/// Split free text on whitespace, lower-case, drop duplicates
pub fn tokenize_query(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in text.split_whitespace().map(str::to_lowercase) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Case-insensitive set intersection test
pub fn overlaps(values: &[String], terms: &[String]) -> bool {
    values.iter().any(|v| {
        let v = v.to_lowercase();
        terms.iter().any(|t| t.to_lowercase() == v)
    })
}

/// Case-insensitive substring test; `token` is already lower-case
pub fn contains_token(haystack: &str, token: &str) -> bool {
    haystack.to_lowercase().contains(token)
}

/// Token found in the artist or description field
pub fn matches_artist(track: &Track, token: &str) -> bool {
    track
        .artist
        .as_deref()
        .is_some_and(|a| contains_token(a, token))
        || track
            .description
            .as_deref()
            .is_some_and(|d| contains_token(d, token))
}
