//! SQLite store tests
//!
//! Runs the same scenarios as the in-memory store against a real database
//! file, checking that SQL scoring agrees with `RelevanceScorer`.

mod helpers;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use helpers::*;
use licensr_common::config::{RelevanceWeights, SearchSettings};
use licensr_common::db::init::init_database;
use licensr_common::db::{FacetTerms, SearchLogRecord, Track};
use licensr_search::search::{
    expand_terms, normalize_terms, tokenize_query, PredicateSet, RelevanceScorer,
};
use licensr_search::store::{CatalogStore, MemoryCatalogStore, SqliteCatalogStore, StrictQuery};
use licensr_search::{build_router, cors_layer, AppState};
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

async fn setup_store() -> (TempDir, SqliteCatalogStore) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("catalog.db")).await.unwrap();
    (dir, SqliteCatalogStore::new(pool))
}

fn catalog() -> Vec<Track> {
    let mut a = track("Neon Skyline", 1);
    a.artist = Some("Night Runner".to_string());
    a.genres = strings(&["Synthwave", "Electronic"]);
    a.moods = strings(&["Nostalgic"]);
    a.usage_types = strings(&["Advertising"]);
    a.instruments = strings(&["Synth"]);

    let mut b = track("Night Drive", 2);
    b.genres = strings(&["Electronic"]);
    b.moods = strings(&["Dark"]);

    let mut c = track("Sunday Morning", 3);
    c.description = Some("Neon-lit acoustic ballad".to_string());
    c.genres = strings(&["Folk"]);
    c.moods = strings(&["Nostalgic"]);

    let mut d = track("Rock'n'Roll Heart", 4);
    d.genres = strings(&["Rock'n'Roll"]);

    let mut deleted = track("Gone", 5);
    deleted.genres = strings(&["Electronic"]);
    deleted.deleted_at = Some(base_time());

    let mut excluded = track("Sync Only", 6);
    excluded.genres = strings(&["Electronic"]);
    excluded.excluded = true;

    vec![a, b, c, d, deleted, excluded]
}

/// Mixed-case tags and text outside ASCII
fn accented_catalog() -> Vec<Track> {
    let mut a = track("ÉTÉ Indien", 1);
    a.artist = Some("Zoé Ångström".to_string());
    a.genres = strings(&["Électronique"]);
    a.moods = strings(&["Mélancolique"]);

    let mut b = track("Straße nach Süden", 2);
    b.genres = strings(&["Électronique", "Pop"]);
    b.moods = strings(&["Fröhlich"]);

    let mut c = track("Ñandú", 3);
    c.description = Some("Canción ÁRIDA".to_string());
    c.genres = strings(&["Folk"]);
    c.moods = strings(&["MÉLANCOLIQUE"]);

    vec![a, b, c]
}

type TierRows = (Vec<(String, u32)>, Vec<String>);

/// Strict rows with relevance, then loose titles
async fn run_tiers(store: &dyn CatalogStore, terms: &FacetTerms, query: &str) -> TierRows {
    let tokens = tokenize_query(query);
    let predicates = PredicateSet::build(terms, &tokens);

    let strict = store
        .strict_search(StrictQuery {
            predicates: &predicates,
            terms,
            weights: RelevanceWeights::default(),
            limit: 10,
        })
        .await
        .unwrap();
    let loose = store.loose_search(&predicates, 10).await.unwrap();

    (
        strict
            .into_iter()
            .map(|r| (r.track.title, r.relevance))
            .collect(),
        loose.into_iter().map(|t| t.title).collect(),
    )
}

async fn seeded_store() -> (TempDir, SqliteCatalogStore) {
    let (dir, store) = setup_store().await;
    for t in catalog() {
        store.insert_track(&t).await.unwrap();
    }
    (dir, store)
}

#[tokio::test]
async fn test_recent_tracks_skip_deleted_and_excluded() {
    let (_dir, store) = seeded_store().await;

    let tracks = store.recent_tracks(10).await.unwrap();

    let titles: Vec<_> = tracks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Rock'n'Roll Heart", "Sunday Morning", "Night Drive", "Neon Skyline"]
    );
    assert_eq!(tracks[3].genres, strings(&["Synthwave", "Electronic"]));
    assert_eq!(tracks[3].created_at, base_time() + Duration::minutes(1));
}

#[tokio::test]
async fn test_strict_scores_match_rust_scorer() {
    let (_dir, store) = seeded_store().await;
    let terms = FacetTerms {
        genres: strings(&["electronic", "folk"]),
        moods: strings(&["nostalgic"]),
        instruments: strings(&["synth"]),
        usage_types: strings(&["advertising"]),
        ..Default::default()
    };
    let tokens = tokenize_query("neon");
    let predicates = PredicateSet::build(&terms, &[]);
    let weights = RelevanceWeights::default();

    let results = store
        .strict_search(StrictQuery {
            predicates: &predicates,
            terms: &terms,
            weights,
            limit: 10,
        })
        .await
        .unwrap();

    // genre AND mood AND usage: only Neon Skyline
    assert_eq!(results.len(), 1);
    let scorer = RelevanceScorer::new(weights);
    assert_eq!(
        results[0].relevance,
        scorer.score(&results[0].track, &terms, predicates.tokens())
    );
    // genre 3 + mood 2 + instrument 1 + usage 3
    assert_eq!(results[0].relevance, 9);

    let with_text = PredicateSet::build(&FacetTerms::default(), &tokens);
    let results = store
        .strict_search(StrictQuery {
            predicates: &with_text,
            terms: &FacetTerms::default(),
            weights,
            limit: 10,
        })
        .await
        .unwrap();

    let titles: Vec<_> = results.iter().map(|r| r.track.title.as_str()).collect();
    assert_eq!(titles, vec!["Neon Skyline", "Sunday Morning"]);
    assert_eq!(results[0].relevance, 2);
    assert_eq!(results[1].relevance, 1);
}

#[tokio::test]
async fn test_loose_search_any_predicate_newest_first() {
    let (_dir, store) = seeded_store().await;
    let terms = FacetTerms {
        genres: strings(&["folk"]),
        moods: strings(&["dark"]),
        ..Default::default()
    };
    let predicates = PredicateSet::build(&terms, &[]);

    let tracks = store.loose_search(&predicates, 10).await.unwrap();

    let titles: Vec<_> = tracks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Sunday Morning", "Night Drive"]);
}

#[tokio::test]
async fn test_quotes_in_terms_are_bound_not_spliced() {
    let (_dir, store) = seeded_store().await;
    let terms = FacetTerms {
        genres: strings(&["rock'n'roll"]),
        ..Default::default()
    };
    let predicates = PredicateSet::build(&terms, &tokenize_query("n'roll"));

    let results = store
        .strict_search(StrictQuery {
            predicates: &predicates,
            terms: &terms,
            weights: RelevanceWeights::default(),
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].track.title, "Rock'n'Roll Heart");
    // genre 3 + title 2
    assert_eq!(results[0].relevance, 5);

    let hostile = PredicateSet::build(
        &FacetTerms::default(),
        &tokenize_query("'); DROP TABLE tracks; --"),
    );
    let tracks = store.loose_search(&hostile, 10).await.unwrap();
    assert!(tracks.is_empty());
    assert_eq!(store.recent_tracks(10).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_synonym_lookup_is_bidirectional() {
    let (_dir, store) = setup_store().await;
    let mut table = BTreeMap::new();
    table.insert("Hip Hop".to_string(), strings(&["Rap", "HipHop"]));
    table.insert("ambient".to_string(), strings(&["atmospheric"]));
    assert_eq!(store.seed_synonyms(&table).await.unwrap(), 2);

    let by_term = store.lookup_synonyms(&strings(&["hip hop"])).await.unwrap();
    assert_eq!(by_term.len(), 1);
    assert_eq!(by_term[0].term, "hip hop");
    assert_eq!(by_term[0].synonyms, strings(&["rap", "hiphop"]));

    let by_synonym = store.lookup_synonyms(&strings(&["RAP"])).await.unwrap();
    assert_eq!(by_synonym.len(), 1);
    assert_eq!(by_synonym[0].term, "hip hop");

    let none = store.lookup_synonyms(&strings(&["hip"])).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_seed_synonyms_is_idempotent() {
    let (_dir, store) = setup_store().await;
    let mut table = BTreeMap::new();
    table.insert("chill".to_string(), strings(&["relaxed"]));
    store.seed_synonyms(&table).await.unwrap();

    table.insert("chill".to_string(), strings(&["relaxed", "mellow"]));
    store.seed_synonyms(&table).await.unwrap();

    let entries = store.lookup_synonyms(&strings(&["mellow"])).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].synonyms, strings(&["relaxed", "mellow"]));
}

#[tokio::test]
async fn test_popular_and_recent_searches() {
    let (_dir, store) = setup_store().await;
    let now = Utc::now();

    let entries = [
        ("piano", 1),
        ("piano", 2),
        ("piano", 3),
        ("drums", 1),
        ("drums", 2),
        ("strings", 0),
        ("old", 40),
        ("old", 41),
        ("old", 42),
        ("old", 43),
        ("", 0),
    ];
    for (query, days_ago) in entries {
        store
            .log_search(&SearchLogRecord {
                id: Uuid::new_v4(),
                query: query.to_string(),
                user_id: Some("u1".to_string()),
                terms: FacetTerms {
                    genres: strings(&["classical"]),
                    ..Default::default()
                },
                created_at: now - Duration::days(days_ago),
            })
            .await
            .unwrap();
    }

    let popular = store
        .popular_searches(now - Duration::days(30), 10)
        .await
        .unwrap();
    let got: Vec<_> = popular.iter().map(|p| (p.query.as_str(), p.count)).collect();
    assert_eq!(got, vec![("piano", 3), ("drums", 2), ("strings", 1)]);

    // equal timestamps: later insert counts as more recent
    let recent = store.recent_searches(3).await.unwrap();
    assert_eq!(recent, strings(&["strings", "drums", "piano"]));
}

#[tokio::test]
async fn test_end_to_end_over_sqlite() {
    let (_dir, store) = seeded_store().await;
    store
        .upsert_synonyms("electronic", &strings(&["edm"]))
        .await
        .unwrap();
    let store = Arc::new(store);
    let app = build_router(
        AppState::new(store.clone(), SearchSettings::default()).unwrap(),
        cors_layer(Some("https://licensr.example")).unwrap(),
    );

    let response = app
        .oneshot(post_json("/api/search", r#"{"genres":["EDM"],"moods":["dark"]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let results = body["results"].as_array().unwrap();
    // strict: Night Drive; loose adds Neon Skyline (electronic)
    assert_eq!(results[0]["title"], "Night Drive");
    assert_eq!(results[0]["relevance"], 5);
    assert_eq!(results.len(), 2);
    assert_eq!(results[1]["title"], "Neon Skyline");
    assert_eq!(results[1]["relevance"], 0);
    assert_eq!(body["meta"]["recentSearches"].as_array().unwrap().len(), 0);

    let logged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_queries")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(logged, 1);
}

#[tokio::test]
async fn test_non_ascii_matching_agrees_with_memory_store() {
    let (_dir, sqlite) = setup_store().await;
    for t in accented_catalog() {
        sqlite.insert_track(&t).await.unwrap();
    }
    let memory = MemoryCatalogStore::with_tracks(accented_catalog());

    let genre_exact = FacetTerms {
        genres: normalize_terms(["Électronique"]),
        ..Default::default()
    };
    let genre_and_mood = FacetTerms {
        genres: normalize_terms(["électronique", "FOLK"]),
        moods: normalize_terms(["mélancolique"]),
        ..Default::default()
    };
    let cases = [
        (genre_exact, ""),
        (genre_and_mood, ""),
        (FacetTerms::default(), "ÉTÉ"),
        (FacetTerms::default(), "ångström"),
        (FacetTerms::default(), "árida süden"),
    ];

    for (terms, query) in &cases {
        let from_sqlite = run_tiers(&sqlite, terms, query).await;
        let from_memory = run_tiers(&memory, terms, query).await;
        assert_eq!(from_sqlite, from_memory, "terms {:?} query {:?}", terms, query);
    }

    let (strict, _) = run_tiers(&sqlite, &cases[0].0, "").await;
    assert_eq!(
        strict,
        vec![
            ("Straße nach Süden".to_string(), 3),
            ("ÉTÉ Indien".to_string(), 3)
        ]
    );

    let (strict, loose) = run_tiers(&sqlite, &cases[1].0, "").await;
    // genre 3 + mood 2
    assert_eq!(
        strict,
        vec![("Ñandú".to_string(), 5), ("ÉTÉ Indien".to_string(), 5)]
    );
    assert_eq!(loose, strings(&["Ñandú", "Straße nach Süden", "ÉTÉ Indien"]));

    let (strict, _) = run_tiers(&sqlite, &FacetTerms::default(), "ÉTÉ").await;
    // title bonus only
    assert_eq!(strict, vec![("ÉTÉ Indien".to_string(), 2)]);

    let (strict, loose) = run_tiers(&sqlite, &FacetTerms::default(), "árida süden").await;
    // tokens AND-combined in the strict tier
    assert!(strict.is_empty());
    assert_eq!(loose, strings(&["Ñandú", "Straße nach Süden"]));
}

#[tokio::test]
async fn test_non_ascii_synonyms_agree_with_memory_store() {
    let (_dir, sqlite) = setup_store().await;
    let mut table = BTreeMap::new();
    table.insert("Électronique".to_string(), strings(&["Électro", "ÉLECTRONICA"]));
    sqlite.seed_synonyms(&table).await.unwrap();

    let memory = MemoryCatalogStore::new();
    memory
        .add_synonyms("Électronique", &["Électro", "ÉLECTRONICA"])
        .await;

    for raw in [&["ÉLECTRO"][..], &["électronique"][..], &["Électronica", "pop"][..]] {
        let terms = normalize_terms(raw);
        let from_sqlite = expand_terms(&sqlite, &terms).await.unwrap();
        let from_memory = expand_terms(&memory, &terms).await.unwrap();
        assert_eq!(from_sqlite, from_memory, "raw {:?}", raw);
        assert!(from_sqlite.contains(&"électronique".to_string()));
        assert!(from_sqlite.contains(&"électro".to_string()));
    }
}

#[tokio::test]
async fn test_search_endpoint_matches_accented_genre_over_sqlite() {
    let (_dir, store) = setup_store().await;
    for t in accented_catalog() {
        store.insert_track(&t).await.unwrap();
    }
    let app = build_router(
        AppState::new(Arc::new(store), SearchSettings::default()).unwrap(),
        cors_layer(None).unwrap(),
    );

    let response = app
        .clone()
        .oneshot(post_json("/search", r#"{"genres":["Électronique"]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["meta"]["count"], 2);
    assert_eq!(body["results"][0]["title"], "Straße nach Süden");
    assert_eq!(body["results"][0]["relevance"], 3);

    let response = app
        .oneshot(post_json("/search", r#"{"query":"ÉTÉ Indien"}"#))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["results"][0]["title"], "ÉTÉ Indien");
    assert_eq!(body["results"][0]["relevance"], 2);
}
