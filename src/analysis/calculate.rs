//! Calculation stage.
//!
//! Resolves the fetch stage's pending results in input order and hands each
//! forecast to its own blocking worker. Workers share nothing but the sending
//! half of a bounded channel; the stage is the single consumer and drains it
//! until every city has reported. Results are then put back into input order
//! and ranked.
//!
//! Channel capacity equals the number of cities, so a worker never waits on
//! a full channel.

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::analysis::daily::summarize_city;
use crate::ingest::PendingForecast;
use crate::logging::Stage;
use crate::model::{CitySummary, PipelineError};

/// Reduces every pending forecast to a `CitySummary` and returns them ranked.
///
/// The first failed fetch cancels the remaining requests and fails the whole
/// stage.
pub async fn calculate_cities(
    pending: Vec<PendingForecast>,
) -> Result<Vec<CitySummary>, PipelineError> {
    let expected = pending.len();
    if expected == 0 {
        return Ok(Vec::new());
    }

    let (tx, mut rx) = mpsc::channel::<(usize, CitySummary)>(expected);
    let mut workers = JoinSet::new();
    let mut pending = pending.into_iter();

    while let Some(item) = pending.next() {
        let index = item.index;
        let forecast = match item.resolve().await {
            Ok(forecast) => forecast,
            Err(e) => {
                for rest in pending.by_ref() {
                    rest.abort();
                }
                workers.abort_all();
                return Err(e);
            }
        };

        let tx = tx.clone();
        workers.spawn_blocking(move || {
            let summary = summarize_city(&forecast);
            debug!(stage = %Stage::Calculate, city = %summary.name, "city reduced");
            // Send fails only once the consumer has given up on the run.
            let _ = tx.blocking_send((index, summary));
        });
    }
    drop(tx);

    let mut collected = Vec::with_capacity(expected);
    while collected.len() < expected {
        match rx.recv().await {
            Some(item) => collected.push(item),
            None => break,
        }
    }

    while let Some(joined) = workers.join_next().await {
        joined.map_err(|e| PipelineError::Worker(format!("calculation worker failed: {}", e)))?;
    }

    if collected.len() < expected {
        return Err(PipelineError::Worker(format!(
            "expected {} city summaries, received {}",
            expected,
            collected.len()
        )));
    }

    collected.sort_by_key(|(index, _)| *index);
    let ranked = rank_cities(collected.into_iter().map(|(_, summary)| summary).collect());

    info!(stage = %Stage::Calculate, cities = ranked.len(), "cities ranked");
    Ok(ranked)
}

/// Sorts cities best-first by (temperature, fair hours) and assigns 1-based
/// ratings. The sort is stable: fully tied cities keep their input order.
pub fn rank_cities(mut cities: Vec<CitySummary>) -> Vec<CitySummary> {
    cities.sort_by(|a, b| {
        b.temp_avg
            .rank_cmp(&a.temp_avg)
            .then_with(|| b.cond_avg.rank_cmp(&a.cond_avg))
    });

    for (position, city) in cities.iter_mut().enumerate() {
        city.rating = position as u32 + 1;
    }
    cities
}
