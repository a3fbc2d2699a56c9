//! SQLite catalog store
//!
//! Categorical sets are JSON arrays, so set overlap goes through
//! `json_each`. Every term, token, weight, and limit is a bind parameter;
//! only fixed column names are ever pushed as SQL text.
//!
//! Matching never uses SQLite `lower()`, which folds ASCII only. Tracks are
//! written with lower-cased `*_lc` copies folded by Rust, the same folding
//! applied to request terms, and predicates compare against those.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use licensr_common::db::{
    format_timestamp, Facet, PopularSearch, SearchLogRecord, SynonymEntry, Track,
};
use licensr_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::{CatalogStore, StrictQuery};
use crate::search::scoring::facet_weight;
use crate::search::{normalize_terms, Predicate, PredicateSet, SearchResult};

const TRACK_COLUMNS: &str = "tracks.id, tracks.title, tracks.artist, tracks.description, \
     tracks.genres, tracks.sub_genres, tracks.moods, tracks.instruments, tracks.usage_types, \
     tracks.bpm, tracks.duration_seconds, tracks.audio_url, tracks.image_url, \
     tracks.created_at, tracks.deleted_at, tracks.excluded";

const SEARCHABLE: &str = "tracks.deleted_at IS NULL AND tracks.excluded = 0";

#[derive(Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert_track(&self, track: &Track) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tracks (
                id, title, artist, description,
                genres, sub_genres, moods, instruments, usage_types,
                bpm, duration_seconds, audio_url, image_url,
                created_at, deleted_at, excluded,
                title_lc, artist_lc, description_lc,
                genres_lc, sub_genres_lc, moods_lc, instruments_lc, usage_types_lc
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(track.id.to_string())
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.description)
        .bind(serde_json::to_string(&track.genres)?)
        .bind(serde_json::to_string(&track.sub_genres)?)
        .bind(serde_json::to_string(&track.moods)?)
        .bind(serde_json::to_string(&track.instruments)?)
        .bind(serde_json::to_string(&track.usage_types)?)
        .bind(track.bpm)
        .bind(track.duration_seconds)
        .bind(&track.audio_url)
        .bind(&track.image_url)
        .bind(format_timestamp(track.created_at))
        .bind(track.deleted_at.map(format_timestamp))
        .bind(track.excluded)
        .bind(track.title.to_lowercase())
        .bind(fold_text(track.artist.as_deref()))
        .bind(fold_text(track.description.as_deref()))
        .bind(serde_json::to_string(&fold_list(&track.genres))?)
        .bind(serde_json::to_string(&fold_list(&track.sub_genres))?)
        .bind(serde_json::to_string(&fold_list(&track.moods))?)
        .bind(serde_json::to_string(&fold_list(&track.instruments))?)
        .bind(serde_json::to_string(&fold_list(&track.usage_types))?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or replace one synonym entry; the term is stored normalized
    pub async fn upsert_synonyms(&self, term: &str, synonyms: &[String]) -> Result<()> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Err(Error::InvalidInput("synonym term is empty".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO search_synonyms (term, synonyms) VALUES (?, ?)
            ON CONFLICT(term) DO UPDATE SET synonyms = excluded.synonyms
            "#,
        )
        .bind(term)
        .bind(serde_json::to_string(&normalize_terms(synonyms))?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load a configured synonym table; returns the number of entries written
    pub async fn seed_synonyms(&self, table: &BTreeMap<String, Vec<String>>) -> Result<usize> {
        for (term, synonyms) in table {
            self.upsert_synonyms(term, synonyms).await?;
        }
        if !table.is_empty() {
            info!("Loaded {} synonym entries from config", table.len());
        }
        Ok(table.len())
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn lookup_synonyms(&self, terms: &[String]) -> Result<Vec<SynonymEntry>> {
        // stored rows are already normalized by `upsert_synonyms`
        let terms = serde_json::to_string(&normalize_terms(terms))?;

        let rows = sqlx::query(
            r#"
            SELECT term, synonyms FROM search_synonyms
            WHERE term IN (SELECT value FROM json_each(?))
               OR EXISTS (
                   SELECT 1 FROM json_each(search_synonyms.synonyms) AS s
                   WHERE s.value IN (SELECT value FROM json_each(?))
               )
            "#,
        )
        .bind(&terms)
        .bind(&terms)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SynonymEntry> {
                Ok(SynonymEntry {
                    term: row.try_get("term")?,
                    synonyms: json_list(row, "synonyms")?,
                })
            })
            .collect()
    }

    async fn recent_tracks(&self, limit: usize) -> Result<Vec<Track>> {
        let sql = format!(
            "SELECT {} FROM tracks WHERE {} ORDER BY tracks.created_at DESC LIMIT ?",
            TRACK_COLUMNS, SEARCHABLE
        );

        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(track_from_row).collect()
    }

    async fn strict_search(&self, query: StrictQuery<'_>) -> Result<Vec<SearchResult>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
        qb.push(TRACK_COLUMNS);
        qb.push(", ");
        push_relevance(&mut qb, query)?;
        qb.push(" AS relevance FROM tracks WHERE ");
        qb.push(SEARCHABLE);
        qb.push(" AND ");
        push_predicates(&mut qb, query.predicates, " AND ")?;
        qb.push(" ORDER BY relevance DESC, tracks.created_at DESC LIMIT ");
        qb.push_bind(query.limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<SearchResult> {
                let relevance: i64 = row.try_get("relevance")?;
                Ok(SearchResult {
                    track: track_from_row(row)?,
                    relevance: u32::try_from(relevance.max(0)).unwrap_or(u32::MAX),
                })
            })
            .collect()
    }

    async fn loose_search(&self, predicates: &PredicateSet, limit: usize) -> Result<Vec<Track>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
        qb.push(TRACK_COLUMNS);
        qb.push(" FROM tracks WHERE ");
        qb.push(SEARCHABLE);
        qb.push(" AND ");
        push_predicates(&mut qb, predicates, " OR ")?;
        qb.push(" ORDER BY tracks.created_at DESC LIMIT ");
        qb.push_bind(limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;

        rows.iter().map(track_from_row).collect()
    }

    async fn log_search(&self, record: &SearchLogRecord) -> Result<()> {
        let terms = &record.terms;

        sqlx::query(
            r#"
            INSERT INTO search_queries (
                id, query, user_id,
                genres, sub_genres, moods, instruments, usage_types,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.query)
        .bind(&record.user_id)
        .bind(serde_json::to_string(&terms.genres)?)
        .bind(serde_json::to_string(&terms.sub_genres)?)
        .bind(serde_json::to_string(&terms.moods)?)
        .bind(serde_json::to_string(&terms.instruments)?)
        .bind(serde_json::to_string(&terms.usage_types)?)
        .bind(format_timestamp(record.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn popular_searches(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PopularSearch>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT query, COUNT(*) AS count
            FROM search_queries
            WHERE created_at >= ? AND query <> ''
            GROUP BY query
            ORDER BY count DESC, query ASC
            LIMIT ?
            "#,
        )
        .bind(format_timestamp(since))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(query, count)| PopularSearch { query, count })
            .collect())
    }

    async fn recent_searches(&self, limit: usize) -> Result<Vec<String>> {
        let queries: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT query FROM search_queries
            WHERE query <> ''
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(queries)
    }
}

/// Predicates joined by `separator`, wrapped in parentheses
fn push_predicates(
    qb: &mut QueryBuilder<'_, Sqlite>,
    predicates: &PredicateSet,
    separator: &str,
) -> Result<()> {
    qb.push("(");
    for (i, predicate) in predicates.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        match predicate {
            Predicate::Overlap { facet, terms } => push_overlap(qb, *facet, terms)?,
            Predicate::Text { token } => {
                qb.push("(");
                push_title_match(qb, token);
                qb.push(" OR ");
                push_artist_match(qb, token);
                qb.push(")");
            }
        }
    }
    qb.push(")");
    Ok(())
}

/// `CASE` sum mirroring `RelevanceScorer::score`
fn push_relevance(qb: &mut QueryBuilder<'_, Sqlite>, query: StrictQuery<'_>) -> Result<()> {
    qb.push("(0");

    for facet in Facet::ALL {
        let terms = query.terms.get(facet);
        if terms.is_empty() {
            continue;
        }
        qb.push(" + CASE WHEN ");
        push_overlap(qb, facet, terms)?;
        qb.push(" THEN ");
        qb.push_bind(i64::from(facet_weight(&query.weights, facet)));
        qb.push(" ELSE 0 END");
    }

    let tokens: Vec<&str> = query.predicates.tokens().collect();
    if !tokens.is_empty() {
        qb.push(" + CASE WHEN ");
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            push_title_match(qb, token);
        }
        qb.push(" THEN ");
        qb.push_bind(i64::from(query.weights.title));
        qb.push(" ELSE 0 END");

        qb.push(" + CASE WHEN ");
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            push_artist_match(qb, token);
        }
        qb.push(" THEN ");
        qb.push_bind(i64::from(query.weights.artist));
        qb.push(" ELSE 0 END");
    }

    qb.push(")");
    Ok(())
}

fn push_overlap(qb: &mut QueryBuilder<'_, Sqlite>, facet: Facet, terms: &[String]) -> Result<()> {
    let terms = serde_json::to_string(&normalize_terms(terms))?;
    qb.push("EXISTS (SELECT 1 FROM json_each(tracks.");
    qb.push(facet.folded_column());
    qb.push(") AS f WHERE f.value IN (SELECT value FROM json_each(");
    qb.push_bind(terms);
    qb.push(")))");
    Ok(())
}

fn push_title_match(qb: &mut QueryBuilder<'_, Sqlite>, token: &str) {
    qb.push("instr(tracks.title_lc, ");
    qb.push_bind(token.to_lowercase());
    qb.push(") > 0");
}

fn push_artist_match(qb: &mut QueryBuilder<'_, Sqlite>, token: &str) {
    qb.push("(instr(tracks.artist_lc, ");
    qb.push_bind(token.to_lowercase());
    qb.push(") > 0 OR instr(tracks.description_lc, ");
    qb.push_bind(token.to_lowercase());
    qb.push(") > 0)");
}

/// Same per-value folding as `query::overlaps`
fn fold_list(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

fn fold_text(value: Option<&str>) -> String {
    value.map(str::to_lowercase).unwrap_or_default()
}

fn track_from_row(row: &SqliteRow) -> Result<Track> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let deleted_at: Option<String> = row.try_get("deleted_at")?;

    Ok(Track {
        id: Uuid::from_str(&id)
            .map_err(|e| Error::Internal(format!("invalid track id {}: {}", id, e)))?,
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        description: row.try_get("description")?,
        genres: json_list(row, "genres")?,
        sub_genres: json_list(row, "sub_genres")?,
        moods: json_list(row, "moods")?,
        instruments: json_list(row, "instruments")?,
        usage_types: json_list(row, "usage_types")?,
        bpm: row.try_get("bpm")?,
        duration_seconds: row.try_get("duration_seconds")?,
        audio_url: row.try_get("audio_url")?,
        image_url: row.try_get("image_url")?,
        created_at: parse_timestamp(&created_at)?,
        deleted_at: deleted_at.as_deref().map(parse_timestamp).transpose()?,
        excluded: row.try_get("excluded")?,
    })
}

fn json_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.try_get(column)?;
    Ok(serde_json::from_str(&raw)?)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid timestamp {}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use licensr_common::db::FacetTerms;

    fn sql_for(predicates: &PredicateSet, separator: &str) -> String {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("");
        push_predicates(&mut qb, predicates, separator).unwrap();
        qb.sql().to_string()
    }

    #[test]
    fn test_terms_never_inlined() {
        let terms = FacetTerms {
            genres: vec!["rock'n'roll".to_string()],
            ..Default::default()
        };
        let tokens = vec!["o'brien".to_string(), "drop table".to_string()];
        let set = PredicateSet::build(&terms, &tokens);

        let sql = sql_for(&set, " AND ");

        assert!(!sql.contains("rock"));
        assert!(!sql.contains("brien"));
        assert!(!sql.contains("drop"));
        assert!(sql.contains("json_each(tracks.genres_lc)"));
        assert!(!sql.contains("lower("));
    }

    #[test]
    fn test_separator_joins_predicates() {
        let terms = FacetTerms {
            genres: vec!["rock".to_string()],
            moods: vec!["happy".to_string()],
            ..Default::default()
        };
        let set = PredicateSet::build(&terms, &[]);

        let sql = sql_for(&set, " OR ");

        assert_eq!(sql.matches(" OR ").count(), 1);
        assert!(sql.contains("json_each(tracks.moods_lc)"));
    }
}
