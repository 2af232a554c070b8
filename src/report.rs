//! Aggregation stage: the CSV ranking report.
//!
//! Layout (labels are part of the report format and stay in Russian):
//!
//! ```text
//! Город/День,,26-05,27-05,...,Среднее,Рейтинг
//! Moscow,"Температура, среднее",17.3,15.0,...,16.2,4
//! ,"Без осадков, среднее",8,Недостаточно данных,...,8.0,
//! ```
//!
//! Date columns come from the first city; every city is assumed to carry the
//! same dates in the same order. Rows end with CRLF.
//!
//! `write_report` renders cities concurrently and serializes each city's two
//! rows through a mutex, so the pair stays adjacent while the order between
//! cities is unspecified. The file is assembled under a temporary name and
//! renamed into place only once complete.

use std::borrow::Cow;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::logging::Stage;
use crate::model::{CitySummary, PipelineError};

pub const CITY_LABEL: &str = "Город/День";
pub const AVERAGE_LABEL: &str = "Среднее";
pub const RATING_LABEL: &str = "Рейтинг";
pub const TEMP_MARKER: &str = "Температура, среднее";
pub const COND_MARKER: &str = "Без осадков, среднее";

const LINE_END: &str = "\r\n";
const FAVORABLE_PREFIX: &str = "Наиболее благоприятные города для проживания: ";

// ---------------------------------------------------------------------------
// Row construction
// ---------------------------------------------------------------------------

/// Header row derived from the first city's dates.
pub fn header(first: &CitySummary) -> Vec<String> {
    let mut row = vec![CITY_LABEL.to_string(), String::new()];
    row.extend(first.days.iter().map(|d| d.date_label.clone()));
    row.push(AVERAGE_LABEL.to_string());
    row.push(RATING_LABEL.to_string());
    row
}

/// The temperature row and the fair-hours row for one city.
pub fn city_rows(city: &CitySummary) -> [Vec<String>; 2] {
    let mut temp_row = vec![city.name.clone(), TEMP_MARKER.to_string()];
    temp_row.extend(city.days.iter().map(|d| d.temp_avg.to_string()));
    temp_row.push(city.temp_avg.to_string());
    temp_row.push(city.rating.to_string());

    let mut cond_row = vec![String::new(), COND_MARKER.to_string()];
    cond_row.extend(city.days.iter().map(|d| d.fair_hours.to_string()));
    cond_row.push(city.cond_avg.to_string());
    cond_row.push(String::new());

    [temp_row, cond_row]
}

/// Quotes a field if it contains a delimiter, quote or line break.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Encodes one row, including its line terminator.
pub fn encode_row(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str(LINE_END);
    line
}

fn encode_city(city: &CitySummary) -> String {
    let [temp_row, cond_row] = city_rows(city);
    let mut chunk = encode_row(&temp_row);
    chunk.push_str(&encode_row(&cond_row));
    chunk
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Renders the full report sequentially, cities in the given order.
pub fn render_report(cities: &[CitySummary]) -> Result<String, PipelineError> {
    let first = cities.first().ok_or(PipelineError::EmptyInput { stage: "aggregation" })?;

    let mut out = encode_row(&header(first));
    for city in cities {
        out.push_str(&encode_city(city));
    }
    Ok(out)
}

/// Console line announcing the favorable cities, in rating order.
///
/// Names are joined with `", "` rather than run together.
pub fn favorable_line(favorable: &[String]) -> String {
    format!("{}{}", FAVORABLE_PREFIX, favorable.join(", "))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes the report to `path`, replacing any previous report.
pub async fn write_report(path: &Path, cities: &[CitySummary]) -> Result<(), PipelineError> {
    let first = cities.first().ok_or(PipelineError::EmptyInput { stage: "aggregation" })?;

    let tmp = temp_path(path);
    let result = write_rows(&tmp, first, cities).await;
    if let Err(e) = result {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
            warn!(stage = %Stage::Aggregate, path = %tmp.display(), "could not remove partial report: {}", cleanup);
        }
        return Err(e);
    }

    tokio::fs::rename(&tmp, path).await?;
    info!(
        stage = %Stage::Aggregate,
        path = %path.display(),
        cities = cities.len(),
        "report written"
    );
    Ok(())
}

async fn write_rows(
    tmp: &Path,
    first: &CitySummary,
    cities: &[CitySummary],
) -> Result<(), PipelineError> {
    let header_row = encode_row(&header(first));
    let path = tmp.to_path_buf();
    let out = tokio::task::spawn_blocking(move || -> io::Result<BufWriter<File>> {
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(header_row.as_bytes())?;
        Ok(out)
    })
    .await
    .map_err(|e| PipelineError::Worker(format!("report writer failed: {}", e)))??;
    let out = Arc::new(Mutex::new(out));

    let mut writers = JoinSet::new();
    for city in cities.iter().cloned() {
        let out = Arc::clone(&out);
        writers.spawn_blocking(move || -> io::Result<()> {
            let chunk = encode_city(&city);
            let mut out = out
                .lock()
                .map_err(|_| io::Error::other("report writer lock poisoned"))?;
            out.write_all(chunk.as_bytes())
        });
    }

    while let Some(joined) = writers.join_next().await {
        joined.map_err(|e| PipelineError::Worker(format!("report writer failed: {}", e)))??;
    }

    let out = Arc::try_unwrap(out)
        .map_err(|_| PipelineError::Worker("report writer still shared".to_string()))?
        .into_inner()
        .map_err(|_| io::Error::other("report writer lock poisoned"))?;
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    })
    .await
    .map_err(|e| PipelineError::Worker(format!("report writer failed: {}", e)))??;
    Ok(())
}
