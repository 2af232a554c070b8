//! Structured logging for the city weather ranking service
//!
//! Installs a `tracing` subscriber that writes either to an append-only log
//! file or to stderr, and provides the shared vocabulary used in log fields:
//! which pipeline stage is talking, and how a failed fetch is classified.

use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;

use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::model::ForecastError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Calculate,
    Aggregate,
    Analyze,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "FETCH"),
            Stage::Calculate => write!(f, "CALC"),
            Stage::Aggregate => write!(f, "AGGR"),
            Stage::Analyze => write!(f, "ANLZ"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the source simply has no forecast for this city
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a forecast fetch failure
pub fn classify_fetch_failure(err: &ForecastError) -> FailureType {
    match err {
        // Document missing upstream
        ForecastError::HttpStatus { status: 404, .. } => FailureType::Expected,
        ForecastError::HttpStatus { .. } | ForecastError::Http(_) => FailureType::Unexpected,
        // Bad registry entry or API format change
        ForecastError::UnknownCity(_) | ForecastError::Parse(_) => FailureType::Unexpected,
        ForecastError::PoolClosed => FailureType::Unexpected,
        ForecastError::Timeout { .. } | ForecastError::Io(_) => FailureType::Unknown,
    }
}

/// Log a fetch failure at a level matching its classification
pub fn log_fetch_failure(city: &str, err: &ForecastError) {
    let failure_type = classify_fetch_failure(err);
    match failure_type {
        FailureType::Expected => {
            tracing::debug!(stage = %Stage::Fetch, city, kind = %failure_type, "fetch failed: {}", err)
        }
        FailureType::Unexpected => {
            tracing::error!(stage = %Stage::Fetch, city, kind = %failure_type, "fetch failed: {}", err)
        }
        FailureType::Unknown => {
            tracing::warn!(stage = %Stage::Fetch, city, kind = %failure_type, "fetch failed: {}", err)
        }
    }
}

/// Log the outcome of a complete pipeline run
pub fn log_run_summary(total: usize, favorable: &[String]) {
    if favorable.is_empty() {
        tracing::warn!(stage = %Stage::System, total, "run complete: no favorable city");
    } else {
        tracing::info!(
            stage = %Stage::System,
            total,
            favorable = favorable.len(),
            "run complete: {}",
            favorable.join(", ")
        );
    }
}

// ---------------------------------------------------------------------------
// Subscriber Setup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("logger already initialized: {0}")]
    Init(String),
}

/// Initialize the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `min_level`. With `log_file`
/// the output is appended to that file without colours; otherwise it goes
/// to stderr.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_filter()));

    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: path.to_string(),
                    source,
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(true);

    // Log files always carry timestamps.
    let result = if console_timestamps || log_file.is_some() {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };
    result.map_err(|e| LoggingError::Init(e.to_string()))
}
