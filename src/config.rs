//! Service configuration.
//!
//! Settings come from three places, later ones winning:
//! 1. compiled defaults
//! 2. a TOML file (`FORECAST_CONFIG`, default `forecast.toml`; optional)
//! 3. environment variables, after loading `.env`
//!
//! `FORECAST_CITIES` takes comma-separated registry identifiers and replaces
//! the city list.
//!
//! ```toml
//! [fetch]
//! workers = 4
//! timeout_secs = 10
//! # replay_dir = "fixtures"   # serve stored responses instead of HTTP
//!
//! [report]
//! path = "cities.csv"
//!
//! [logging]
//! level = "debug"
//! file = "app.log"
//! console_timestamps = false
//!
//! [[cities]]
//! name = "MOSCOW"
//! url = "https://code.s3.yandex.net/async-module/moscow-response.json"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::cities::{default_cities, find_city, City};
use crate::ingest::fetch::{FetchSettings, DEFAULT_FETCH_WORKERS, DEFAULT_REQUEST_TIMEOUT};
use crate::logging::LogLevel;
use crate::pipeline::PipelineSettings;

pub const CONFIG_PATH_VAR: &str = "FORECAST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "forecast.toml";

const REPORT_PATH_VAR: &str = "FORECAST_REPORT_PATH";
const LOG_LEVEL_VAR: &str = "FORECAST_LOG_LEVEL";
const WORKERS_VAR: &str = "FORECAST_WORKERS";
const REPLAY_DIR_VAR: &str = "FORECAST_REPLAY_DIR";
const CITIES_VAR: &str = "FORECAST_CITIES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub workers: usize,
    pub timeout_secs: u64,
    pub replay_dir: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_FETCH_WORKERS,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            replay_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cities.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Debug,
            file: Some("app.log".to_string()),
            console_timestamps: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
    /// Replaces the built-in city registry when present.
    pub cities: Option<Vec<City>>,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Applies overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(REPORT_PATH_VAR) {
            self.report.path = PathBuf::from(path);
        }
        if let Some(level) = lookup(LOG_LEVEL_VAR) {
            self.logging.level = level
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", LOG_LEVEL_VAR, e)))?;
        }
        if let Some(workers) = lookup(WORKERS_VAR) {
            self.fetch.workers = workers.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a positive integer, got '{}'", WORKERS_VAR, workers))
            })?;
        }
        if let Some(dir) = lookup(REPLAY_DIR_VAR) {
            self.fetch.replay_dir = Some(PathBuf::from(dir));
        }
        if let Some(names) = lookup(CITIES_VAR) {
            self.cities = Some(registry_cities(&names)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.workers == 0 {
            return Err(ConfigError::Invalid("fetch.workers must be at least 1".into()));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be at least 1".into()));
        }
        if let Some(cities) = &self.cities {
            let mut seen = HashSet::new();
            for city in cities {
                if city.name.trim().is_empty() {
                    return Err(ConfigError::Invalid("city name must not be empty".into()));
                }
                if !seen.insert(city.name.as_str()) {
                    return Err(ConfigError::Invalid(format!("duplicate city '{}'", city.name)));
                }
            }
        }
        Ok(())
    }

    /// Configured cities, or the built-in registry.
    pub fn city_list(&self) -> Vec<City> {
        self.cities.clone().unwrap_or_else(default_cities)
    }

    pub fn city_names(&self) -> Vec<String> {
        self.city_list().into_iter().map(|c| c.name).collect()
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            workers: self.fetch.workers,
            request_timeout: Duration::from_secs(self.fetch.timeout_secs),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            fetch: self.fetch_settings(),
            report_path: self.report.path.clone(),
        }
    }
}

/// Resolves a comma-separated list of registry identifiers, keeping its order.
fn registry_cities(names: &str) -> Result<Vec<City>, ConfigError> {
    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            find_city(&name.to_uppercase())
                .map(|entry| entry.to_city())
                .ok_or_else(|| ConfigError::Invalid(format!("{}: unknown city '{}'", CITIES_VAR, name)))
        })
        .collect()
}

/// Loads `.env`, the config file (if any) and environment overrides.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    dotenv::dotenv().ok();

    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let path = Path::new(&path);

    let mut config = if path.exists() {
        AppConfig::from_file(path)?
    } else {
        AppConfig::default()
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
