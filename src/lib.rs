//! Ranks cities by forecast weather.
//!
//! Fetches multi-day hourly forecasts for a list of cities, reduces each to
//! daytime averages, ranks the cities, writes a CSV report and reports the
//! cities tied at the best temperature and fair-hour averages.

pub mod analysis;
pub mod cities;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
