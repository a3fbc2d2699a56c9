//! Database models

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Categorical track attribute holding a set of tag-like strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Genre,
    SubGenre,
    Mood,
    Instrument,
    UsageType,
}

impl Facet {
    /// All facets, in scoring order
    pub const ALL: [Facet; 5] = [
        Facet::Genre,
        Facet::SubGenre,
        Facet::Mood,
        Facet::Instrument,
        Facet::UsageType,
    ];

    /// Facets that produce filter predicates.
    ///
    /// Instruments only contribute to relevance, never to filtering.
    pub const FILTERABLE: [Facet; 4] = [
        Facet::Genre,
        Facet::SubGenre,
        Facet::Mood,
        Facet::UsageType,
    ];

    /// Column name in the `tracks` and `search_queries` tables
    pub fn column(self) -> &'static str {
        match self {
            Facet::Genre => "genres",
            Facet::SubGenre => "sub_genres",
            Facet::Mood => "moods",
            Facet::Instrument => "instruments",
            Facet::UsageType => "usage_types",
        }
    }

    /// Lower-cased copy of [`Facet::column`] used for matching
    pub fn folded_column(self) -> &'static str {
        match self {
            Facet::Genre => "genres_lc",
            Facet::SubGenre => "sub_genres_lc",
            Facet::Mood => "moods_lc",
            Facet::Instrument => "instruments_lc",
            Facet::UsageType => "usage_types_lc",
        }
    }
}

/// Term sets for every facet
///
/// Used both for the expanded terms of a request and for the copy
/// persisted in the search log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetTerms {
    pub genres: Vec<String>,
    pub sub_genres: Vec<String>,
    pub moods: Vec<String>,
    pub instruments: Vec<String>,
    pub usage_types: Vec<String>,
}

impl FacetTerms {
    pub fn get(&self, facet: Facet) -> &[String] {
        match facet {
            Facet::Genre => &self.genres,
            Facet::SubGenre => &self.sub_genres,
            Facet::Mood => &self.moods,
            Facet::Instrument => &self.instruments,
            Facet::UsageType => &self.usage_types,
        }
    }

    pub fn is_empty(&self) -> bool {
        Facet::ALL.iter().all(|f| self.get(*f).is_empty())
    }
}

/// Catalog track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: Uuid,
    pub title: String,
    /// Artist name; text search treats it together with the description
    pub artist: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub sub_genres: Vec<String>,
    pub moods: Vec<String>,
    pub instruments: Vec<String>,
    pub usage_types: Vec<String>,
    pub bpm: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker; deleted tracks never appear in search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Hidden from search (e.g. sync-only exclusion)
    #[serde(skip_serializing, default)]
    pub excluded: bool,
}

impl Track {
    /// Minimal live track, mostly useful for seeding and tests
    pub fn new(title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: None,
            description: None,
            genres: Vec::new(),
            sub_genres: Vec::new(),
            moods: Vec::new(),
            instruments: Vec::new(),
            usage_types: Vec::new(),
            bpm: None,
            duration_seconds: None,
            audio_url: None,
            image_url: None,
            created_at,
            deleted_at: None,
            excluded: false,
        }
    }

    pub fn facet(&self, facet: Facet) -> &[String] {
        match facet {
            Facet::Genre => &self.genres,
            Facet::SubGenre => &self.sub_genres,
            Facet::Mood => &self.moods,
            Facet::Instrument => &self.instruments,
            Facet::UsageType => &self.usage_types,
        }
    }

    /// Whether the track may appear in search results at all
    pub fn is_searchable(&self) -> bool {
        self.deleted_at.is_none() && !self.excluded
    }
}

/// Canonical term and its synonyms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymEntry {
    pub term: String,
    pub synonyms: Vec<String>,
}

/// Immutable record of one submitted search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchLogRecord {
    pub id: Uuid,
    /// Raw query text as submitted (empty when only facets were given)
    pub query: String,
    pub user_id: Option<String>,
    /// Expanded term sets actually used for filtering and scoring
    pub terms: FacetTerms,
    pub created_at: DateTime<Utc>,
}

/// Raw query text with the number of times it was submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularSearch {
    pub query: String,
    pub count: i64,
}

/// Fixed-width RFC 3339 form used for every stored timestamp.
///
/// Stored timestamps are compared as text, so the width must not vary.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
