//! Forecast reduction and ranking.
//!
//! Submodules:
//! - `daily`    : pure per-day and per-city statistics (daytime window, fair hours).
//! - `calculate`: the calculation stage: parallel per-city reduction and ranking.
//! - `favorable`: the analysis stage: cities tied at both maxima.

pub mod calculate;
pub mod daily;
pub mod favorable;

pub use calculate::{calculate_cities, rank_cities};
pub use daily::summarize_city;
pub use favorable::{find_favorable, Thresholds};
