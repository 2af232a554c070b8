//! Pipeline orchestration.
//!
//! Runs the four stages strictly in sequence: fetch, calculation,
//! aggregation (report), analysis. A stage starts only after the previous
//! one has produced its whole output; any per-city failure fails the run.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::analysis::{calculate_cities, find_favorable};
use crate::ingest::{fetch_cities, FetchSettings, ForecastSource};
use crate::logging::{log_run_summary, Stage};
use crate::model::PipelineError;
use crate::report::write_report;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub fetch: FetchSettings,
    pub report_path: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            report_path: PathBuf::from("cities.csv"),
        }
    }
}

pub struct Pipeline<S> {
    source: Arc<S>,
    settings: PipelineSettings,
}

impl<S: ForecastSource> Pipeline<S> {
    pub fn new(source: S, settings: PipelineSettings) -> Self {
        Self::with_shared_source(Arc::new(source), settings)
    }

    pub fn with_shared_source(source: Arc<S>, settings: PipelineSettings) -> Self {
        Self { source, settings }
    }

    /// Ranks `cities`, writes the report and returns the favorable cities.
    pub async fn run(&self, cities: &[String]) -> Result<Vec<String>, PipelineError> {
        let pending = fetch_cities(Arc::clone(&self.source), cities, &self.settings.fetch);

        info!(stage = %Stage::Calculate, "waiting for forecasts");
        let ranked = calculate_cities(pending).await?;

        write_report(&self.settings.report_path, &ranked).await?;

        let favorable = find_favorable(&ranked).await?;
        log_run_summary(ranked.len(), &favorable);
        Ok(favorable)
    }
}
