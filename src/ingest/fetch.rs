//! Fetch stage.
//!
//! Issues one forecast request per city on the tokio runtime. A semaphore
//! bounds how many requests are in flight at once; every request is also
//! bounded by a timeout. The stage returns as soon as all requests have been
//! issued: each city gets a `PendingForecast` that the calculation stage
//! resolves on its own schedule. A failed city does not affect the others.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::ingest::ForecastSource;
use crate::logging::{log_fetch_failure, Stage};
use crate::model::{ForecastError, PipelineError, RawForecast};

pub const DEFAULT_FETCH_WORKERS: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Worker pool size and per-request timeout for the fetch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub workers: usize,
    pub request_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_FETCH_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// An issued request for one city's forecast.
#[derive(Debug)]
pub struct PendingForecast {
    pub city: String,
    /// Position of the city in the input list.
    pub index: usize,
    handle: JoinHandle<Result<RawForecast, ForecastError>>,
}

impl PendingForecast {
    /// `true` once the request has completed, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the request if it is still running.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Waits for the request and returns its forecast.
    pub async fn resolve(self) -> Result<RawForecast, PipelineError> {
        match self.handle.await {
            Ok(Ok(forecast)) => Ok(forecast),
            Ok(Err(source)) => {
                log_fetch_failure(&self.city, &source);
                Err(PipelineError::Fetch {
                    city: self.city,
                    source,
                })
            }
            Err(e) => Err(PipelineError::Worker(format!(
                "fetch task for {} failed: {}",
                self.city, e
            ))),
        }
    }
}

/// Issues a forecast request for every city and returns the pending results
/// in input order. Must be called from within a tokio runtime.
pub fn fetch_cities<S: ForecastSource>(
    source: Arc<S>,
    cities: &[String],
    settings: &FetchSettings,
) -> Vec<PendingForecast> {
    let permits = Arc::new(Semaphore::new(settings.workers.max(1)));
    let timeout = settings.request_timeout;

    info!(
        stage = %Stage::Fetch,
        cities = cities.len(),
        workers = settings.workers.max(1),
        "issuing forecast requests"
    );

    cities
        .iter()
        .enumerate()
        .map(|(index, city)| {
            let source = Arc::clone(&source);
            let permits = Arc::clone(&permits);
            let name = city.clone();

            let handle = tokio::spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(ForecastError::PoolClosed),
                };

                debug!(stage = %Stage::Fetch, city = %name, "request started");
                match tokio::time::timeout(timeout, source.fetch(&name)).await {
                    Ok(result) => result,
                    Err(_) => Err(ForecastError::Timeout {
                        city: name.clone(),
                        secs: timeout.as_secs(),
                    }),
                }
            });

            PendingForecast {
                city: city.clone(),
                index,
                handle,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DayForecast;
    use chrono::NaiveDate;
    use std::future::Future;

    struct EchoSource;

    impl ForecastSource for EchoSource {
        fn fetch(
            &self,
            city: &str,
        ) -> impl Future<Output = Result<RawForecast, ForecastError>> + Send {
            async move {
                if city == "BROKEN" {
                    return Err(ForecastError::HttpStatus {
                        city: city.to_string(),
                        status: 500,
                    });
                }
                Ok(RawForecast {
                    locality: city.to_lowercase(),
                    days: vec![DayForecast {
                        date: NaiveDate::from_ymd_opt(2022, 5, 26).unwrap(),
                        hours: Vec::new(),
                    }],
                })
            }
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_one_pending_result_per_city_in_input_order() {
        let cities = names(&["PARIS", "ROMA", "PARIS"]);
        let pending = fetch_cities(Arc::new(EchoSource), &cities, &FetchSettings::default());

        assert_eq!(pending.len(), 3);
        let order: Vec<_> = pending.iter().map(|p| (p.index, p.city.clone())).collect();
        assert_eq!(
            order,
            vec![
                (0, "PARIS".to_string()),
                (1, "ROMA".to_string()),
                (2, "PARIS".to_string())
            ]
        );

        for p in pending {
            let forecast = p.resolve().await.unwrap();
            assert_eq!(forecast.days.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_failure_for_one_city_leaves_others_intact() {
        let cities = names(&["PARIS", "BROKEN", "ROMA"]);
        let pending = fetch_cities(Arc::new(EchoSource), &cities, &FetchSettings::default());

        let results: Vec<_> = futures_resolve(pending).await;
        assert!(results[0].is_ok());
        match &results[1] {
            Err(PipelineError::Fetch { city, source }) => {
                assert_eq!(city, "BROKEN");
                assert!(matches!(source, ForecastError::HttpStatus { status: 500, .. }));
            }
            other => panic!("expected fetch error, got {:?}", other),
        }
        assert_eq!(results[2].as_ref().unwrap().locality, "roma");
    }

    #[tokio::test]
    async fn test_zero_workers_is_treated_as_one() {
        let settings = FetchSettings {
            workers: 0,
            request_timeout: Duration::from_secs(1),
        };
        let pending = fetch_cities(Arc::new(EchoSource), &names(&["KAZAN"]), &settings);
        let results = futures_resolve(pending).await;
        assert!(results[0].is_ok());
    }

    async fn futures_resolve(
        pending: Vec<PendingForecast>,
    ) -> Vec<Result<RawForecast, PipelineError>> {
        let mut out = Vec::new();
        for p in pending {
            out.push(p.resolve().await);
        }
        out
    }
}
