//! Core data model for flightwatch: query bounds, feed summaries and flight detail records.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

mod detail;

pub use detail::*;

/// Flight identifier as issued by the feed (hex-ish string, e.g. `"33a1f2c4"`).
pub type FlightId = String;

/// Metadata keys carried alongside flight entries in every feed response.
pub const RESERVED_FEED_KEYS: [&str; 2] = ["version", "full_count"];

/// Rectangular query region, top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub tl_x: f64,
    pub tl_y: f64,
    pub br_x: f64,
    pub br_y: f64,
}

impl Bound {
    pub fn new(tl_x: f64, tl_y: f64, br_x: f64, br_y: f64) -> Self {
        Self {
            tl_x,
            tl_y,
            br_x,
            br_y,
        }
    }

    /// Unescaped `bounds` query value in feed order: top-y, bottom-y, left-x, right-x.
    pub fn query_value(&self) -> String {
        format!(
            "{:.2},{:.2},{:.2},{:.2}",
            self.tl_y, self.br_y, self.tl_x, self.br_x
        )
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.2},{:.2} -> {:.2},{:.2}]",
            self.tl_x, self.tl_y, self.br_x, self.br_y
        )
    }
}

/// On-disk bounds document: `{"bounds": [{"tl_x":..,"tl_y":..,"br_x":..,"br_y":..}, ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundsFile {
    pub bounds: Vec<Bound>,
}

pub fn load_bounds(path: impl AsRef<Path>) -> Result<Vec<Bound>> {
    let file: BoundsFile = read_json_file(path)?;
    Ok(file.bounds)
}

fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Metadata half of a feed response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEnvelope {
    #[serde(default)]
    pub full_count: i64,
    #[serde(default)]
    pub version: i64,
}

/// Flights returned by one feed poll, keyed by flight id. Never contains the reserved keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlightSummarySet {
    flights: BTreeMap<FlightId, JsonValue>,
}

impl FlightSummarySet {
    pub fn from_feed_map(mut map: Map<String, JsonValue>) -> Self {
        for key in RESERVED_FEED_KEYS {
            map.remove(key);
        }
        Self {
            flights: map.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.flights.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.flights.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.flights.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(FlightId, JsonValue)> for FlightSummarySet {
    fn from_iter<I: IntoIterator<Item = (FlightId, JsonValue)>>(iter: I) -> Self {
        Self::from_feed_map(iter.into_iter().collect())
    }
}

/// Typed view over the positional array the feed returns per flight.
///
/// Every field is optional: the feed pads unknown values with empty strings or zeros and
/// occasionally truncates rows, so a malformed row degrades to `None`s instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryRow {
    pub icao_hex: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub heading: Option<f64>,
    pub altitude: Option<f64>,
    pub ground_speed: Option<f64>,
    pub squawk: Option<String>,
    pub aircraft_code: Option<String>,
    pub registration: Option<String>,
    pub origin_iata: Option<String>,
    pub destination_iata: Option<String>,
    pub flight_number: Option<String>,
    pub on_ground: Option<bool>,
    pub vertical_speed: Option<f64>,
    pub callsign: Option<String>,
    pub airline_icao: Option<String>,
}

impl SummaryRow {
    pub fn from_payload(payload: &JsonValue) -> Option<Self> {
        let row = payload.as_array()?;
        let text = |ix: usize| {
            row.get(ix)
                .and_then(JsonValue::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let number = |ix: usize| row.get(ix).and_then(JsonValue::as_f64);

        Some(Self {
            icao_hex: text(0),
            latitude: number(1),
            longitude: number(2),
            heading: number(3),
            altitude: number(4),
            ground_speed: number(5),
            squawk: text(6),
            aircraft_code: text(8),
            registration: text(9),
            origin_iata: text(11),
            destination_iata: text(12),
            flight_number: text(13),
            on_ground: number(14).map(|v| v != 0.0),
            vertical_speed: number(15),
            callsign: text(16),
            airline_icao: text(18),
        })
    }
}
