//! Configuration loading and resolution
//!
//! Every setting resolves in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 are merged by the service's `clap` parser before they
//! reach [`ServiceConfig::resolve`]. A missing config file is not an error:
//! the service starts on defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Relevance weight table
///
/// Each facet weight is added once when the track's set for that facet
/// shares at least one term with the expanded request terms. The text
/// bonuses are added once when any query token is found in the title or
/// in the artist/description respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceWeights {
    pub genre: u32,
    pub sub_genre: u32,
    pub mood: u32,
    pub instrument: u32,
    pub usage_type: u32,
    pub title: u32,
    pub artist: u32,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            genre: 3,
            sub_genre: 2,
            mood: 2,
            instrument: 1,
            usage_type: 3,
            title: 2,
            artist: 1,
        }
    }
}

/// Upper bound on the popular-search window (ten years)
pub const MAX_POPULAR_WINDOW_DAYS: i64 = 3650;

/// Search tuning parameters (`[search]` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Strict-tier result count below which the loose tier runs
    pub min_results: usize,
    /// Limit used when the request does not carry one
    pub default_limit: usize,
    /// Upper bound applied to requested limits
    pub max_limit: usize,
    /// Trailing window for popular searches
    pub popular_window_days: i64,
    /// Length of the popular and recent search lists
    pub meta_list_len: usize,
    pub weights: RelevanceWeights,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            min_results: 20,
            default_limit: 40,
            max_limit: 100,
            popular_window_days: 30,
            meta_list_len: 10,
            weights: RelevanceWeights::default(),
        }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(Error::Config("search limits must be positive".to_string()));
        }
        if self.default_limit > self.max_limit {
            return Err(Error::Config(format!(
                "default_limit ({}) exceeds max_limit ({})",
                self.default_limit, self.max_limit
            )));
        }
        if !(1..=MAX_POPULAR_WINDOW_DAYS).contains(&self.popular_window_days) {
            return Err(Error::Config(format!(
                "popular_window_days must be between 1 and {}, got {}",
                MAX_POPULAR_WINDOW_DAYS, self.popular_window_days
            )));
        }
        Ok(())
    }
}

/// Contents of the TOML config file; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub database: Option<PathBuf>,
    pub cors_origin: Option<String>,
    pub log_level: Option<String>,
    pub search: SearchSettings,
    /// Canonical term → synonyms, loaded into `search_synonyms` at startup
    pub synonyms: BTreeMap<String, Vec<String>>,
    /// File this config was read from; `None` when running on defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the config file if present, falling back to defaults when missing
    ///
    /// A file that exists but does not parse is still an error. Runs before
    /// logging is initialized, so callers report [`TomlConfig::source`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default()),
        };

        let mut config = Self::load(&path)?;
        config.source = Some(path);
        Ok(config)
    }
}

/// Compiled defaults (lowest priority tier)
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub bind: String,
    pub port: u16,
    pub database: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5730,
            database: default_database_path(),
            log_level: "info".to_string(),
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub database: Option<PathBuf>,
    pub cors_origin: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: String,
    pub port: u16,
    pub database: PathBuf,
    /// Allowed CORS origin; `None` allows any origin
    pub cors_origin: Option<String>,
    pub log_level: String,
    pub search: SearchSettings,
    pub synonyms: BTreeMap<String, Vec<String>>,
}

impl ServiceConfig {
    /// Merge overrides, TOML values, and compiled defaults
    pub fn resolve(overrides: Overrides, toml: TomlConfig, defaults: CompiledDefaults) -> Result<Self> {
        toml.search.validate()?;

        let cors_origin = overrides
            .cors_origin
            .or(toml.cors_origin)
            .filter(|o| !o.trim().is_empty() && o.trim() != "*");

        Ok(Self {
            bind: overrides.bind.or(toml.bind).unwrap_or(defaults.bind),
            port: overrides.port.or(toml.port).unwrap_or(defaults.port),
            database: overrides
                .database
                .or(toml.database)
                .unwrap_or(defaults.database),
            cors_origin,
            log_level: overrides
                .log_level
                .or(toml.log_level)
                .unwrap_or(defaults.log_level),
            search: toml.search,
            synonyms: toml.synonyms,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// `<config dir>/licensr/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("licensr").join("config.toml"))
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("licensr").join("catalog.db"))
        .unwrap_or_else(|| PathBuf::from("./licensr_data/catalog.db"))
}
