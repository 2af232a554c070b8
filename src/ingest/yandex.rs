//! Yandex Weather forecast client
//!
//! Retrieves multi-day hourly forecasts for the cities in the registry. Each
//! city's forecast is a static JSON document; the client maps a city
//! identifier to its URL, downloads the document and decodes it into a
//! `RawForecast`.
//!
//! Response shape (fields not listed are ignored):
//! `geo_object.locality.name`, `forecasts[].date` (YYYY-MM-DD),
//! `forecasts[].hours[].{hour, temp, condition}`.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::cities::City;
use crate::ingest::ForecastSource;
use crate::model::{Condition, DayForecast, ForecastError, HourSample, RawForecast};

/// Transport timeout applied by the HTTP client itself.
const CLIENT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub geo_object: GeoObject,
    pub forecasts: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
pub struct GeoObject {
    pub locality: Locality,
}

#[derive(Debug, Deserialize)]
pub struct Locality {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ForecastDay {
    pub date: String,  // "2022-05-26"
    #[serde(default)]
    pub hours: Vec<ForecastHour>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastHour {
    #[serde(deserialize_with = "deserialize_hour")]
    pub hour: u8,  // sent as a string ("9") by the API
    pub temp: f64,
    pub condition: Condition,
}

/// Accepts an hour given either as a number or as a numeric string.
fn deserialize_hour<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HourField {
        Number(u8),
        Text(String),
    }

    match HourField::deserialize(deserializer)? {
        HourField::Number(h) => Ok(h),
        HourField::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Decode a forecast document into the domain model.
pub fn parse_forecast_response(body: &str) -> Result<RawForecast, ForecastError> {
    let response: ForecastResponse = serde_json::from_str(body)?;

    let days = response
        .forecasts
        .into_iter()
        .map(|day| {
            let date = NaiveDate::parse_from_str(&day.date, "%Y-%m-%d")
                .map_err(|e| ForecastError::Parse(format!("bad date '{}': {}", day.date, e)))?;
            let hours = day
                .hours
                .into_iter()
                .map(|h| HourSample {
                    hour: h.hour,
                    temp: h.temp,
                    condition: h.condition,
                })
                .collect();
            Ok(DayForecast { date, hours })
        })
        .collect::<Result<Vec<_>, ForecastError>>()?;

    Ok(RawForecast {
        locality: response.geo_object.locality.name,
        days,
    })
}

// ============================================================================
// API Client
// ============================================================================

/// HTTP forecast source backed by the city registry's URLs.
pub struct YandexWeatherClient {
    client: reqwest::Client,
    urls: HashMap<String, String>,
}

impl YandexWeatherClient {
    pub fn new(cities: &[City]) -> Result<Self, ForecastError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
            .build()?;

        let urls = cities
            .iter()
            .map(|c| (c.name.clone(), c.url.clone()))
            .collect();

        Ok(Self { client, urls })
    }

    pub fn url_for(&self, city: &str) -> Option<&str> {
        self.urls.get(city).map(String::as_str)
    }
}

impl ForecastSource for YandexWeatherClient {
    fn fetch(&self, city: &str) -> impl Future<Output = Result<RawForecast, ForecastError>> + Send {
        async move {
            let url = self
                .url_for(city)
                .ok_or_else(|| ForecastError::UnknownCity(city.to_string()))?;

            debug!(city, url, "requesting forecast");

            let response = self
                .client
                .get(url)
                .header("Accept", "application/json")
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(ForecastError::HttpStatus {
                    city: city.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response.text().await?;
            parse_forecast_response(&body)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
