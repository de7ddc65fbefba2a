//! Service configuration loading.
//!
//! Settings come from an optional YAML file; `DATABASE_URL` overrides the
//! file's connection parameters when set.

use std::path::Path;

use anyhow::{Context, Result};
use catalog::ConnectionParams;
use serde::{Deserialize, Serialize};
use zip_stream::SPOOL_THRESHOLD;

const DEFAULT_DATABASE_URL: &str = "postgresql://httpd@localhost/crmp";

/// Data formats served when none are configured.
pub const DEFAULT_DATA_FORMATS: &[&str] = &["csv", "ascii"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// DSN string or `{database, user, host, password?, sslmode?}` mapping.
    #[serde(default = "default_database")]
    pub database: ConnectionParams,

    /// Only list stations from networks flagged for publication.
    #[serde(default)]
    pub publish_only: bool,

    /// Largest selection `/agg/` will archive. Unlimited when unset.
    #[serde(default)]
    pub max_stations: Option<usize>,

    /// Extensions accepted in `data-format`.
    #[serde(default = "default_data_formats")]
    pub data_formats: Vec<String>,

    /// Archive size past which the spool moves to a temporary file.
    #[serde(default = "default_spill_threshold")]
    pub spill_threshold: u64,
}

fn default_database() -> ConnectionParams {
    ConnectionParams::from(DEFAULT_DATABASE_URL)
}

fn default_data_formats() -> Vec<String> {
    DEFAULT_DATA_FORMATS.iter().map(|s| s.to_string()).collect()
}

fn default_spill_threshold() -> u64 {
    SPOOL_THRESHOLD
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            publish_only: false,
            max_stations: None,
            data_formats: default_data_formats(),
            spill_threshold: default_spill_threshold(),
        }
    }
}

impl PortalConfig {
    /// Parse a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse portal config")
    }

    /// Load from `path` if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read: {:?}", path))?;
                Self::from_yaml(&content).with_context(|| format!("In {:?}", path))?
            }
            None => {
                tracing::warn!("No config file given, using defaults");
                Self::default()
            }
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                config.database = ConnectionParams::Dsn(url);
            }
        }

        Ok(config)
    }
}
