//! Core data types for the city weather ranking service.
//!
//! This module defines the shared domain model imported by all other modules:
//! raw forecasts as delivered by a forecast source, the per-day and per-city
//! summaries derived from them, and the error types of every stage.
//! It contains no I/O.

use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

/// Report marker substituted for a statistic that has no qualifying samples.
pub const INSUFFICIENT_DATA: &str = "Недостаточно данных";

// ---------------------------------------------------------------------------
// Raw forecast types
// ---------------------------------------------------------------------------

/// Weather condition code from the upstream forecast vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Overcast,
    Drizzle,
    LightRain,
    Rain,
    ModerateRain,
    HeavyRain,
    ContinuousHeavyRain,
    Showers,
    WetSnow,
    LightSnow,
    Snow,
    SnowShowers,
    Hail,
    Thunderstorm,
    ThunderstormWithRain,
    ThunderstormWithHail,
    /// Any code the vocabulary above does not name.
    #[serde(other)]
    Unknown,
}

impl Condition {
    /// Conditions without precipitation. Only these count as "fair" hours.
    pub fn is_fair(self) -> bool {
        matches!(
            self,
            Condition::Clear | Condition::PartlyCloudy | Condition::Overcast | Condition::Cloudy
        )
    }
}

/// A single hourly forecast sample.
#[derive(Debug, Clone, PartialEq)]
pub struct HourSample {
    /// Hour of day, 0-23.
    pub hour: u8,
    pub temp: f64,
    pub condition: Condition,
}

/// All hourly samples forecast for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub hours: Vec<HourSample>,
}

/// A forecast source's response for one city.
#[derive(Debug, Clone, PartialEq)]
pub struct RawForecast {
    /// Locality name as reported by the source (used as the city's display name).
    pub locality: String,
    pub days: Vec<DayForecast>,
}

// ---------------------------------------------------------------------------
// Derived statistics
// ---------------------------------------------------------------------------

/// A statistic that is either a computed value or the insufficient-data
/// sentinel. The sentinel orders below every value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric<T> {
    Value(T),
    InsufficientData,
}

impl<T: Copy> Metric<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Metric::Value(v) => Some(*v),
            Metric::InsufficientData => None,
        }
    }
}

impl Metric<f64> {
    /// Total order used for ranking: sentinel < any value. Values compare
    /// numerically, so `-0.0` and `0.0` tie just as they do under `==`.
    pub fn rank_cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Metric::Value(a), Metric::Value(b)) => {
                a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b))
            }
            (Metric::Value(_), Metric::InsufficientData) => Ordering::Greater,
            (Metric::InsufficientData, Metric::Value(_)) => Ordering::Less,
            (Metric::InsufficientData, Metric::InsufficientData) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Metric<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(v) => write!(f, "{:.1}", v),
            Metric::InsufficientData => f.write_str(INSUFFICIENT_DATA),
        }
    }
}

impl fmt::Display for Metric<u32> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(v) => write!(f, "{}", v),
            Metric::InsufficientData => f.write_str(INSUFFICIENT_DATA),
        }
    }
}

/// Daytime statistics for one forecast day.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    /// Date formatted as `DD-MM`; doubles as the report column label.
    pub date_label: String,
    pub temp_avg: Metric<f64>,
    pub fair_hours: Metric<u32>,
}

/// One city's reduced record.
///
/// `rating` is 0 until the calculation stage ranks the full set, after which
/// it is the city's 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct CitySummary {
    pub name: String,
    pub days: Vec<DaySummary>,
    pub temp_avg: Metric<f64>,
    pub cond_avg: Metric<f64>,
    pub rating: u32,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by a forecast source for a single city.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The city has no known forecast location.
    #[error("Unknown city: {0}")]
    UnknownCity(String),
    /// Non-2xx HTTP response from the forecast API.
    #[error("HTTP error: {status} for {city}")]
    HttpStatus { city: String, status: u16 },
    /// Transport-level failure (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The request did not complete within the fetch timeout.
    #[error("Request for {city} timed out after {secs}s")]
    Timeout { city: String, secs: u64 },
    /// The fetch worker pool was shut down before the request was issued.
    #[error("Fetch worker pool closed")]
    PoolClosed,
}

impl From<serde_json::Error> for ForecastError {
    fn from(e: serde_json::Error) -> Self {
        ForecastError::Parse(e.to_string())
    }
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A city's forecast could not be fetched.
    #[error("Fetching forecast for {city} failed: {source}")]
    Fetch {
        city: String,
        #[source]
        source: ForecastError,
    },
    /// A per-city worker panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),
    /// A stage was invoked with zero cities.
    #[error("{stage} stage received no cities")]
    EmptyInput { stage: &'static str },
    /// The report could not be written.
    #[error("Report error: {0}")]
    Report(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
