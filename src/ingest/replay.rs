//! Offline forecast source for development and tests
//!
//! When the forecast API is unavailable, point the service at a directory of
//! previously downloaded responses. A city `MOSCOW` is served from
//! `<dir>/moscow-response.json`, the same file name the API host uses.

use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use crate::ingest::yandex::parse_forecast_response;
use crate::ingest::ForecastSource;
use crate::model::{ForecastError, RawForecast};

const RESPONSE_SUFFIX: &str = "-response.json";

/// Replays stored forecast documents from a directory.
pub struct ReplaySource {
    dir: PathBuf,
}

impl ReplaySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File the given city is served from.
    pub fn path_for(&self, city: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", city.to_lowercase(), RESPONSE_SUFFIX))
    }

    /// City identifiers (upper-cased file stems) available in the directory,
    /// sorted by name.
    pub fn available_cities(&self) -> std::io::Result<Vec<String>> {
        let mut cities = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            if let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(RESPONSE_SUFFIX)) {
                cities.push(stem.to_uppercase());
            }
        }
        cities.sort();
        Ok(cities)
    }
}

impl ForecastSource for ReplaySource {
    fn fetch(&self, city: &str) -> impl Future<Output = Result<RawForecast, ForecastError>> + Send {
        async move {
            let path = self.path_for(city);
            debug!(city, path = %path.display(), "replaying stored forecast");

            let body = match tokio::fs::read_to_string(&path).await {
                Ok(body) => body,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(ForecastError::UnknownCity(city.to_string()));
                }
                Err(e) => return Err(e.into()),
            };

            parse_forecast_response(&body)
        }
    }
}
