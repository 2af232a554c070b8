//! Forecast ingestion.
//!
//! Submodules:
//! - `yandex`: HTTP client for the upstream forecast API and its JSON shape.
//! - `replay`: serves stored forecast responses from disk for offline runs.
//! - `fetch` : the fetch stage: bounded concurrent requests, one per city.

pub mod fetch;
pub mod replay;
pub mod yandex;

use std::future::Future;

use crate::model::{ForecastError, RawForecast};

pub use fetch::{fetch_cities, FetchSettings, PendingForecast};
pub use replay::ReplaySource;
pub use yandex::YandexWeatherClient;

/// Anything that can produce a forecast for a named city.
///
/// Implementations make at most one attempt per call; retries, if any, are
/// the implementation's business.
pub trait ForecastSource: Send + Sync + 'static {
    fn fetch(&self, city: &str) -> impl Future<Output = Result<RawForecast, ForecastError>> + Send;
}
