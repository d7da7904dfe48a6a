use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};

use crate::model::Unit;

pub const DEFAULT_API_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_CITY: &str = "Delhi";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Top-level configuration stored on disk, with environment overrides
/// applied after loading.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// default_city = "Delhi"
/// units = "metric"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credential. Absence is a fatal precondition for any fetch.
    pub api_key: Option<String>,

    /// Base URL of the weather API.
    pub api_url: String,

    /// City fetched when geolocation is denied or fails.
    pub default_city: String,

    /// Unit system used until the user toggles it.
    pub units: Unit,

    /// Auto-refresh cadence in seconds.
    pub refresh_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            default_city: DEFAULT_CITY.to_string(),
            units: Unit::default(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Load config from disk (or defaults if the file doesn't exist yet),
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Apply `SKYWATCH_*` environment variables on top of whatever was
    /// loaded from disk. Environment wins.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Empty values count as unset.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("SKYWATCH_API_KEY").filter(|v| !v.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("SKYWATCH_API_URL").filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(city) = lookup("SKYWATCH_DEFAULT_CITY").filter(|v| !v.is_empty()) {
            self.default_city = city;
        }
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "skywatch", "skywatch")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Returns the configured API key, if present and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
