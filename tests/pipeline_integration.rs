//! Pipeline behaviour tests with an in-memory forecast source
//!
//! The stub source returns synthetic forecasts built to hit exact aggregate
//! values, can delay individual cities, and records how many requests are
//! in flight at once.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use city_weather_service::analysis::{calculate_cities, find_favorable};
use city_weather_service::ingest::{fetch_cities, FetchSettings, ForecastSource};
use city_weather_service::model::{
    Condition, DayForecast, ForecastError, HourSample, Metric, PipelineError, RawForecast,
    INSUFFICIENT_DATA,
};
use city_weather_service::pipeline::{Pipeline, PipelineSettings};
use city_weather_service::report::render_report;

// ---------------------------------------------------------------------------
// Stub source
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StubSource {
    forecasts: HashMap<String, RawForecast>,
    delays: HashMap<String, Duration>,
    failing: HashMap<String, u16>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubSource {
    fn with(mut self, city: &str, forecast: RawForecast) -> Self {
        self.forecasts.insert(city.to_string(), forecast);
        self
    }

    fn delayed(mut self, city: &str, delay: Duration) -> Self {
        self.delays.insert(city.to_string(), delay);
        self
    }

    fn failing(mut self, city: &str, status: u16) -> Self {
        self.failing.insert(city.to_string(), status);
        self
    }
}

impl ForecastSource for StubSource {
    fn fetch(&self, city: &str) -> impl Future<Output = Result<RawForecast, ForecastError>> + Send {
        async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delays.get(city) {
                tokio::time::sleep(*delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(status) = self.failing.get(city) {
                return Err(ForecastError::HttpStatus {
                    city: city.to_string(),
                    status: *status,
                });
            }
            self.forecasts
                .get(city)
                .cloned()
                .ok_or_else(|| ForecastError::UnknownCity(city.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Forecast builders
// ---------------------------------------------------------------------------

/// One full 24-hour day: every daytime hour at `temp`, the first `fair`
/// daytime hours clear and the rest rainy. Night hours are extreme and must
/// not matter.
fn full_day(date: u32, temp: f64, fair: usize) -> DayForecast {
    let hours = (0u8..24)
        .map(|hour| {
            if (9..20).contains(&hour) {
                let condition = if usize::from(hour - 9) < fair {
                    Condition::Clear
                } else {
                    Condition::Rain
                };
                HourSample { hour, temp, condition }
            } else {
                HourSample {
                    hour,
                    temp: -50.0,
                    condition: Condition::Clear,
                }
            }
        })
        .collect();
    DayForecast {
        date: NaiveDate::from_ymd_opt(2022, 5, date).unwrap(),
        hours,
    }
}

fn night_only_day(date: u32) -> DayForecast {
    DayForecast {
        date: NaiveDate::from_ymd_opt(2022, 5, date).unwrap(),
        hours: (0u8..6)
            .map(|hour| HourSample {
                hour,
                temp: 3.0,
                condition: Condition::Clear,
            })
            .collect(),
    }
}

fn forecast(locality: &str, days: Vec<DayForecast>) -> RawForecast {
    RawForecast {
        locality: locality.to_string(),
        days,
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn settings(dir: &tempfile::TempDir, workers: usize, timeout: Duration) -> PipelineSettings {
    PipelineSettings {
        fetch: FetchSettings {
            workers,
            request_timeout: timeout,
        },
        report_path: dir.path().join("cities.csv"),
    }
}

/// Three cities: two tied at (20.0, 8), one at (15.0, 5). ALPHA answers
/// last so completion order differs from input order.
fn tied_source() -> StubSource {
    StubSource::default()
        .with("ALPHA", forecast("Alpha", vec![full_day(26, 20.0, 8), full_day(27, 20.0, 8)]))
        .with("BRAVO", forecast("Bravo", vec![full_day(26, 20.0, 8), full_day(27, 20.0, 8)]))
        .with("CHARLIE", forecast("Charlie", vec![full_day(26, 15.0, 5), full_day(27, 15.0, 5)]))
        .delayed("ALPHA", Duration::from_millis(60))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tied_cities_rank_in_input_order_and_are_both_favorable() {
    let cities = names(&["ALPHA", "BRAVO", "CHARLIE"]);
    let pending = fetch_cities(Arc::new(tied_source()), &cities, &FetchSettings::default());
    let ranked = calculate_cities(pending).await.unwrap();

    let order: Vec<_> = ranked
        .iter()
        .map(|c| (c.name.as_str(), c.rating, c.temp_avg, c.cond_avg))
        .collect();
    assert_eq!(
        order,
        vec![
            ("Alpha", 1, Metric::Value(20.0), Metric::Value(8.0)),
            ("Bravo", 2, Metric::Value(20.0), Metric::Value(8.0)),
            ("Charlie", 3, Metric::Value(15.0), Metric::Value(5.0)),
        ]
    );

    assert_eq!(find_favorable(&ranked).await.unwrap(), vec!["Alpha", "Bravo"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pipeline_run_returns_favorable_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(tied_source(), settings(&dir, 4, Duration::from_secs(5)));

    let favorable = pipeline
        .run(&names(&["ALPHA", "BRAVO", "CHARLIE"]))
        .await
        .unwrap();
    assert_eq!(favorable, vec!["Alpha", "Bravo"]);

    let report = std::fs::read_to_string(dir.path().join("cities.csv")).unwrap();
    let header = report.lines().next().unwrap();
    assert_eq!(header, "Город/День,,26-05,27-05,Среднее,Рейтинг");
    assert_eq!(report.split_terminator("\r\n").count(), 1 + 2 * 3);
    assert!(report.contains("Charlie,\"Температура, среднее\",15.0,15.0,15.0,3\r\n"));
    assert!(report.contains(",\"Без осадков, среднее\",5,5,5.0,\r\n"));
}

#[tokio::test]
async fn test_city_without_daytime_samples_renders_sentinel() {
    let source = StubSource::default().with(
        "NIGHT",
        forecast("Night Town", vec![night_only_day(26), night_only_day(27)]),
    );
    let pending = fetch_cities(Arc::new(source), &names(&["NIGHT"]), &FetchSettings::default());
    let ranked = calculate_cities(pending).await.unwrap();

    assert_eq!(ranked[0].temp_avg, Metric::InsufficientData);
    assert_eq!(ranked[0].cond_avg, Metric::InsufficientData);
    assert_eq!(ranked[0].rating, 1);

    let report = render_report(&ranked).unwrap();
    let temp_row = report.split_terminator("\r\n").nth(1).unwrap();
    assert_eq!(
        temp_row,
        format!(
            "Night Town,\"Температура, среднее\",{0},{0},{0},1",
            INSUFFICIENT_DATA
        )
    );
    assert!(!report.contains("0.0"));

    assert_eq!(find_favorable(&ranked).await.unwrap(), vec!["Night Town"]);
}

#[tokio::test]
async fn test_fetch_failure_aborts_run_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = tied_source().failing("BRAVO", 503);
    let pipeline = Pipeline::new(source, settings(&dir, 4, Duration::from_secs(5)));

    let result = pipeline.run(&names(&["ALPHA", "BRAVO", "CHARLIE"])).await;
    match result {
        Err(PipelineError::Fetch { city, source }) => {
            assert_eq!(city, "BRAVO");
            assert!(matches!(source, ForecastError::HttpStatus { status: 503, .. }));
        }
        other => panic!("expected fetch failure, got {:?}", other),
    }
    assert!(!dir.path().join("cities.csv").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fetch_concurrency_never_exceeds_worker_count() {
    let mut source = StubSource::default();
    let mut cities = Vec::new();
    for i in 0..8 {
        let city = format!("CITY{}", i);
        source = source
            .with(&city, forecast(&city, vec![full_day(26, 10.0 + i as f64, 3)]))
            .delayed(&city, Duration::from_millis(25));
        cities.push(city);
    }
    let source = Arc::new(source);

    let settings = FetchSettings {
        workers: 2,
        request_timeout: Duration::from_secs(5),
    };
    let pending = fetch_cities(Arc::clone(&source), &cities, &settings);
    let ranked = calculate_cities(pending).await.unwrap();

    assert_eq!(ranked.len(), 8);
    assert_eq!(ranked[0].name, "CITY7");
    let peak = source.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 2, "{} requests were in flight at once", peak);
    assert!(peak >= 1);
}

#[tokio::test]
async fn test_slow_city_times_out() {
    let source = StubSource::default()
        .with("SLOW", forecast("Slow", vec![full_day(26, 10.0, 3)]))
        .delayed("SLOW", Duration::from_millis(500));
    let settings = FetchSettings {
        workers: 1,
        request_timeout: Duration::from_millis(20),
    };

    let pending = fetch_cities(Arc::new(source), &names(&["SLOW"]), &settings);
    match calculate_cities(pending).await {
        Err(PipelineError::Fetch { city, source }) => {
            assert_eq!(city, "SLOW");
            assert!(matches!(source, ForecastError::Timeout { .. }));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pending_results_can_be_polled_before_resolving() {
    let source = StubSource::default()
        .with("QUICK", forecast("Quick", vec![full_day(26, 10.0, 3)]))
        .with("LATE", forecast("Late", vec![full_day(26, 10.0, 3)]))
        .delayed("LATE", Duration::from_millis(200));

    let pending = fetch_cities(
        Arc::new(source),
        &names(&["QUICK", "LATE"]),
        &FetchSettings::default(),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(pending[0].is_finished());
    assert!(!pending[1].is_finished());

    let ranked = calculate_cities(pending).await.unwrap();
    assert_eq!(ranked.len(), 2);
}

#[tokio::test]
async fn test_empty_city_list_fails_at_aggregation() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(StubSource::default(), settings(&dir, 2, Duration::from_secs(1)));

    assert!(matches!(
        pipeline.run(&[]).await,
        Err(PipelineError::EmptyInput { stage: "aggregation" })
    ));
}

#[tokio::test]
async fn test_rerunning_pipeline_yields_identical_ranking_and_report() {
    let cities = names(&["ALPHA", "BRAVO", "CHARLIE"]);
    let source = Arc::new(tied_source());

    let first = calculate_cities(fetch_cities(Arc::clone(&source), &cities, &FetchSettings::default()))
        .await
        .unwrap();
    let second = calculate_cities(fetch_cities(source, &cities, &FetchSettings::default()))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(render_report(&first).unwrap(), render_report(&second).unwrap());
}
