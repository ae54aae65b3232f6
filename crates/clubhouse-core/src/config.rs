//! Application configuration management.
//!
//! Configuration is stored at `~/.config/clubhouse/config.json`. Missing
//! fields take their defaults; `CLUBHOUSE_API_URL` and `CLUBHOUSE_PAGE_SIZE`
//! (from the environment or a `.env` file) override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::query::{QueryPolicy, RetryPolicy};

/// Application name used for config/data directory paths
const APP_NAME: &str = "clubhouse";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_API_URL: &str = "CLUBHOUSE_API_URL";
const ENV_PAGE_SIZE: &str = "CLUBHOUSE_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub default_page_size: u32,
    /// Minimum time the startup session load takes.
    pub session_min_load_ms: u64,
    /// `None` keeps successful data fresh for the whole session.
    pub stale_time_secs: Option<u64>,
    /// Automatic retries after a failed fetch. 0 means retry on re-request only.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001".to_string(),
            request_timeout_secs: 30,
            default_page_size: 6,
            session_min_load_ms: 500,
            stale_time_secs: None,
            max_retries: 0,
            initial_backoff_ms: 1000,
            fetch_timeout_secs: Some(30),
        }
    }
}

impl Config {
    /// Load from the user config directory, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| dotenvy::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            debug!(url = %url, "API URL overridden from environment");
            self.api_base_url = url;
        }
        if let Some(size) = lookup(ENV_PAGE_SIZE).and_then(|v| v.trim().parse::<u32>().ok()) {
            if size > 0 {
                self.default_page_size = size;
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn session_min_load(&self) -> Duration {
        Duration::from_millis(self.session_min_load_ms)
    }

    pub fn query_policy(&self) -> QueryPolicy {
        let mut policy = QueryPolicy::default().with_retry(RetryPolicy::exponential(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
        ));
        if let Some(secs) = self.stale_time_secs {
            policy = policy.with_stale_time(Duration::from_secs(secs));
        }
        if let Some(secs) = self.fetch_timeout_secs {
            policy = policy.with_fetch_timeout(Duration::from_secs(secs));
        }
        policy
    }
}
