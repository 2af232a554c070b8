//! Per-day and per-city forecast statistics.
//!
//! Only the daytime window `[DAYTIME_START, DAYTIME_END)` counts. A statistic
//! with no qualifying samples becomes `Metric::InsufficientData`, and such
//! days are left out of both numerator and denominator of the city averages.

use crate::model::{CitySummary, DayForecast, DaySummary, HourSample, Metric, RawForecast};

/// First daytime hour (inclusive).
pub const DAYTIME_START: u8 = 9;
/// End of the daytime window (exclusive).
pub const DAYTIME_END: u8 = 20;
/// Number of samples in a fully forecast day.
pub const HOURS_PER_DAY: usize = 24;

const DATE_LABEL_FORMAT: &str = "%d-%m";

pub fn is_daytime(hour: u8) -> bool {
    (DAYTIME_START..DAYTIME_END).contains(&hour)
}

/// Rounds to one decimal place.
///
/// Rounds the exact binary value, so a literal like `20.25` (stored exactly)
/// goes to the even digit and `20.15` (stored slightly below) goes down.
/// Negative zero is normalized to `0.0`.
pub fn round1(x: f64) -> f64 {
    format!("{:.1}", x).parse::<f64>().unwrap_or(x) + 0.0
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Mean daytime temperature, rounded to one decimal.
pub fn daytime_temperature(hours: &[HourSample]) -> Metric<f64> {
    match mean(hours.iter().filter(|h| is_daytime(h.hour)).map(|h| h.temp)) {
        Some(avg) => Metric::Value(round1(avg)),
        None => Metric::InsufficientData,
    }
}

/// Number of daytime hours with a fair (dry) condition.
///
/// A partially forecast day with no fair hour reports `InsufficientData`
/// rather than 0. This also hides a genuinely rainy day whose forecast is
/// incomplete; the rule is kept as-is so reports stay comparable with earlier
/// runs.
pub fn fair_hours(hours: &[HourSample]) -> Metric<u32> {
    let count = hours
        .iter()
        .filter(|h| is_daytime(h.hour) && h.condition.is_fair())
        .count() as u32;

    if hours.len() < HOURS_PER_DAY && count == 0 {
        Metric::InsufficientData
    } else {
        Metric::Value(count)
    }
}

pub fn summarize_day(day: &DayForecast) -> DaySummary {
    DaySummary {
        date_label: day.date.format(DATE_LABEL_FORMAT).to_string(),
        temp_avg: daytime_temperature(&day.hours),
        fair_hours: fair_hours(&day.hours),
    }
}

/// City-wide averages of the per-day values, sentinel days excluded.
pub fn aggregate(days: &[DaySummary]) -> (Metric<f64>, Metric<f64>) {
    let temp = mean(days.iter().filter_map(|d| d.temp_avg.value()));
    let cond = mean(
        days.iter()
            .filter_map(|d| d.fair_hours.value())
            .map(f64::from),
    );

    let to_metric = |v: Option<f64>| v.map_or(Metric::InsufficientData, |v| Metric::Value(round1(v)));
    (to_metric(temp), to_metric(cond))
}

/// Reduces a city's forecast to its unranked summary.
pub fn summarize_city(forecast: &RawForecast) -> CitySummary {
    let days: Vec<DaySummary> = forecast.days.iter().map(summarize_day).collect();
    let (temp_avg, cond_avg) = aggregate(&days);

    CitySummary {
        name: forecast.locality.clone(),
        days,
        temp_avg,
        cond_avg,
        rating: 0,
    }
}
