//! Analysis stage: favorable cities.
//!
//! A city is favorable when its aggregate temperature and its aggregate
//! fair-hour count both equal the maxima over all ranked cities. The two
//! maxima are computed independently, so the top-rated city is not
//! necessarily favorable.

use tokio::task::JoinSet;
use tracing::info;

use crate::logging::Stage;
use crate::model::{CitySummary, Metric, PipelineError};

/// The run-wide maxima a city must match to be favorable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub temp: Metric<f64>,
    pub cond: Metric<f64>,
}

impl Thresholds {
    /// Maxima over all cities. `None` for an empty slice.
    pub fn from_cities(cities: &[CitySummary]) -> Option<Self> {
        let temp = cities.iter().map(|c| c.temp_avg).max_by(|a, b| a.rank_cmp(b))?;
        let cond = cities.iter().map(|c| c.cond_avg).max_by(|a, b| a.rank_cmp(b))?;
        Some(Self { temp, cond })
    }

    /// Exact equality on both rounded aggregates.
    pub fn admits(&self, city: &CitySummary) -> bool {
        city.temp_avg == self.temp && city.cond_avg == self.cond
    }
}

/// Returns the names of all favorable cities, in rating order.
pub async fn find_favorable(cities: &[CitySummary]) -> Result<Vec<String>, PipelineError> {
    let thresholds =
        Thresholds::from_cities(cities).ok_or(PipelineError::EmptyInput { stage: "analysis" })?;

    let mut checks = JoinSet::new();
    for (position, city) in cities.iter().enumerate() {
        let city = city.clone();
        checks.spawn(async move { thresholds.admits(&city).then_some((position, city.name)) });
    }

    let mut favorable = Vec::new();
    while let Some(joined) = checks.join_next().await {
        let checked =
            joined.map_err(|e| PipelineError::Worker(format!("analysis task failed: {}", e)))?;
        if let Some(hit) = checked {
            favorable.push(hit);
        }
    }
    favorable.sort_by_key(|(position, _)| *position);

    info!(
        stage = %Stage::Analyze,
        max_temp = %thresholds.temp,
        max_cond = %thresholds.cond,
        favorable = favorable.len(),
        "analysis complete"
    );
    Ok(favorable.into_iter().map(|(_, name)| name).collect())
}
