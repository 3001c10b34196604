//! Database configuration with layered sources.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use stele_core::{SteleError, SteleResult};
use tracing::debug;

/// SQLite connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLx connection URL, e.g. `sqlite://stele.db` or `sqlite::memory:`.
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 5,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl DatabaseConfig {
    /// Creates an in-memory configuration; a single connection so every
    /// statement observes the same memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            ..Self::default()
        }
    }

    /// Loads configuration layered over the defaults:
    ///
    /// 1. `{config_dir}/database.toml`, when present
    /// 2. environment variables with the `STELE_` prefix
    pub fn load(config_dir: &str) -> SteleResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let mut builder = Config::builder().add_source(
            Config::try_from(&Self::default())
                .map_err(|e| SteleError::configuration(e.to_string()))?,
        );

        let file_path = format!("{config_dir}/database.toml");
        if Path::new(&file_path).exists() {
            debug!("Loading database config from: {}", file_path);
            builder = builder.add_source(File::with_name(&file_path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("STELE")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| SteleError::configuration(e.to_string()))
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> SteleResult<Self> {
        Self::load("./config")
    }
}
