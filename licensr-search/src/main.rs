//! licensr-search - Catalog search microservice
//!
//! Serves the tiered catalog search endpoint, popular/recent search lists,
//! and a liveness probe.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use licensr_common::config::{CompiledDefaults, Overrides, ServiceConfig, TomlConfig};
use licensr_common::db::init::init_database;
use licensr_search::store::SqliteCatalogStore;
use licensr_search::{build_router, cors_layer, AppState};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "licensr-search", version, about = "Catalog search service")]
struct Args {
    /// TOML config file (default: <config dir>/licensr/config.toml)
    #[arg(long, env = "LICENSR_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "LICENSR_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(long, env = "LICENSR_PORT")]
    port: Option<u16>,

    /// SQLite catalog database path
    #[arg(long, env = "LICENSR_DATABASE")]
    database: Option<PathBuf>,

    /// Allowed CORS origin ("*" for any)
    #[arg(long, env = "LICENSR_CORS_ORIGIN")]
    cors_origin: Option<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, env = "LICENSR_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            bind: self.bind.clone(),
            port: self.port,
            database: self.database.clone(),
            cors_origin: self.cors_origin.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Read before tracing init so the TOML log level can take effect
    let toml = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load config file")?;
    let config_source = toml.source.clone();
    let config = ServiceConfig::resolve(
        args.overrides(),
        toml,
        CompiledDefaults::for_current_platform(),
    )?;

    let default_directive = config
        .log_level
        .parse::<tracing_subscriber::filter::Directive>()
        .unwrap_or_else(|_| tracing::Level::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_directive)
                .from_env_lossy(),
        )
        .init();

    // Build identification immediately after tracing init
    info!(
        "Starting licensr-search v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_source {
        Some(path) => info!("Config file: {}", path.display()),
        None => warn!("No config file found, using defaults"),
    }

    info!("Database path: {}", config.database.display());
    let pool = match init_database(&config.database).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let store = SqliteCatalogStore::new(pool);
    store.seed_synonyms(&config.synonyms).await?;

    match &config.cors_origin {
        Some(origin) => info!("CORS origin: {}", origin),
        None => info!("CORS origin: any"),
    }
    let cors = cors_layer(config.cors_origin.as_deref())?;

    let state = AppState::new(Arc::new(store), config.search.clone())?;
    let app = build_router(state, cors);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("licensr-search listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
