// Optional YAML configuration for the CLI

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::DEFAULT_UNIT;

const APP_DIR: &str = "shoplist";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the logs and index
    pub store_path: Option<PathBuf>,
    /// tracing level: error, warn, info, debug or trace
    pub log_level: String,
    /// Unit used when `add-item` is given none
    pub default_unit: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            log_level: "warn".to_string(),
            default_unit: DEFAULT_UNIT.to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the per-user config file when `path` is None.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if required {
                return Err(eyre!("Config file not found: {}", path.display()));
            }
            debug!(path = ?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context(format!("Failed to read config {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).context(format!("Failed to parse config {}", path.display()))?;
        debug!(path = ?path, "Loaded config");
        Ok(config)
    }

    /// `<config_dir>/shoplist/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// CLI override, then the config file, then `<data_local_dir>/shoplist`
    pub fn resolve_store_path(&self, cli_override: Option<PathBuf>) -> Result<PathBuf> {
        cli_override
            .or_else(|| self.store_path.clone())
            .or_else(|| dirs::data_local_dir().map(|d| d.join(APP_DIR)))
            .ok_or_else(|| eyre!("Could not determine a data directory; pass --store-path"))
    }

    /// Log level after applying `-v` occurrences on top of the configured one
    pub fn effective_log_level(&self, verbose: u8) -> tracing::Level {
        let configured = self.log_level.parse().unwrap_or(tracing::Level::WARN);
        match verbose {
            0 => configured,
            1 => configured.max(tracing::Level::INFO),
            2 => configured.max(tracing::Level::DEBUG),
            _ => tracing::Level::TRACE,
        }
    }
}
