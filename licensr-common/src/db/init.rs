//! Database initialization
//!
//! Opens (creating when missing) the catalog database and ensures the
//! search tables exist. Every statement is idempotent, so this is safe to
//! run on each startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL lets search reads proceed while the query log is being written
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all catalog search tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_tracks_table(pool).await?;
    create_search_synonyms_table(pool).await?;
    create_search_queries_table(pool).await?;
    Ok(())
}

/// Create the tracks table
///
/// Categorical columns hold JSON arrays of strings. The `*_lc` columns are
/// lower-cased copies written on insert; SQLite `lower()` folds ASCII only,
/// so all case-insensitive matching runs against these.
async fn create_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT,
            description TEXT,
            genres TEXT NOT NULL DEFAULT '[]',
            sub_genres TEXT NOT NULL DEFAULT '[]',
            moods TEXT NOT NULL DEFAULT '[]',
            instruments TEXT NOT NULL DEFAULT '[]',
            usage_types TEXT NOT NULL DEFAULT '[]',
            bpm INTEGER,
            duration_seconds REAL,
            audio_url TEXT,
            image_url TEXT,
            created_at TEXT NOT NULL,
            deleted_at TEXT,
            excluded INTEGER NOT NULL DEFAULT 0,
            title_lc TEXT NOT NULL DEFAULT '',
            artist_lc TEXT NOT NULL DEFAULT '',
            description_lc TEXT NOT NULL DEFAULT '',
            genres_lc TEXT NOT NULL DEFAULT '[]',
            sub_genres_lc TEXT NOT NULL DEFAULT '[]',
            moods_lc TEXT NOT NULL DEFAULT '[]',
            instruments_lc TEXT NOT NULL DEFAULT '[]',
            usage_types_lc TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tracks_created_at ON tracks(created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the synonym table
///
/// Terms are stored lower-cased; `synonyms` is a JSON array of strings.
async fn create_search_synonyms_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_synonyms (
            term TEXT PRIMARY KEY,
            synonyms TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the append-only search log table
async fn create_search_queries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_queries (
            id TEXT PRIMARY KEY,
            query TEXT NOT NULL,
            user_id TEXT,
            genres TEXT NOT NULL DEFAULT '[]',
            sub_genres TEXT NOT NULL DEFAULT '[]',
            moods TEXT NOT NULL DEFAULT '[]',
            instruments TEXT NOT NULL DEFAULT '[]',
            usage_types TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_search_queries_created_at ON search_queries(created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
