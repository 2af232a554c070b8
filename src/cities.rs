//! City registry for the weather ranking service.
//!
//! Defines the default list of cities whose forecasts are ranked, together
//! with the upstream URL serving each city's forecast. This is the single
//! source of truth for city identifiers unless the configuration file
//! supplies its own `[[cities]]` list.

use serde::Deserialize;

const FORECAST_BASE_URL: &str = "https://code.s3.yandex.net/async-module";

// ---------------------------------------------------------------------------
// City metadata
// ---------------------------------------------------------------------------

/// A city identifier and where its forecast lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct City {
    /// Identifier passed to the forecast source (e.g. "MOSCOW").
    pub name: String,
    /// Full URL of the city's forecast document.
    pub url: String,
}

/// Static registry entry; `slug` is the file stem on the forecast host.
pub struct CityEntry {
    pub name: &'static str,
    pub slug: &'static str,
}

/// All cities ranked by default, in report tie-break order.
pub static CITY_REGISTRY: &[CityEntry] = &[
    CityEntry { name: "MOSCOW", slug: "moscow" },
    CityEntry { name: "PARIS", slug: "paris" },
    CityEntry { name: "LONDON", slug: "london" },
    CityEntry { name: "BERLIN", slug: "berlin" },
    CityEntry { name: "BEIJING", slug: "beijing" },
    CityEntry { name: "KAZAN", slug: "kazan" },
    CityEntry { name: "SPETERSBURG", slug: "spetersburg" },
    CityEntry { name: "VOLGOGRAD", slug: "volgograd" },
    CityEntry { name: "NOVOSIBIRSK", slug: "novosibirsk" },
    CityEntry { name: "KALININGRAD", slug: "kaliningrad" },
    CityEntry { name: "ABUDHABI", slug: "abudhabi" },
    CityEntry { name: "WARSZAWA", slug: "warszawa" },
    CityEntry { name: "BUCHAREST", slug: "bucharest" },
    CityEntry { name: "ROMA", slug: "roma" },
    CityEntry { name: "CAIRO", slug: "cairo" },
];

impl CityEntry {
    pub fn url(&self) -> String {
        format!("{}/{}-response.json", FORECAST_BASE_URL, self.slug)
    }

    pub fn to_city(&self) -> City {
        City {
            name: self.name.to_string(),
            url: self.url(),
        }
    }
}

/// Returns the registry as owned `City` values.
pub fn default_cities() -> Vec<City> {
    CITY_REGISTRY.iter().map(CityEntry::to_city).collect()
}

/// Looks up a registry city by identifier. Returns `None` if not found.
pub fn find_city(name: &str) -> Option<&'static CityEntry> {
    CITY_REGISTRY.iter().find(|c| c.name == name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
