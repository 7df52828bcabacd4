//! City → coordinate input.
//!
//! The file is a JSON object `{ "Austin": { "lat": 30.27, "lon": -97.74 }, ... }`.
//! Object order is kept, since it decides fetch order.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::{fs, path::Path};
use tracing::{debug, warn};

use crate::model::CityCoordinate;

#[derive(Debug, Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

/// Load coordinates, treating a missing or malformed file as "no cities".
pub fn load_city_coordinates(path: &Path) -> Vec<CityCoordinate> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "City coordinate file unreadable, using no cities");
            return Vec::new();
        }
    };

    match parse_city_coordinates(&contents) {
        Ok(cities) => {
            debug!(path = %path.display(), count = cities.len(), "Loaded city coordinates");
            cities
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "City coordinate file malformed, using no cities");
            Vec::new()
        }
    }
}

/// Entries whose value is not a `{lat, lon}` pair are skipped with a warning.
pub fn parse_city_coordinates(json: &str) -> Result<Vec<CityCoordinate>, serde_json::Error> {
    let raw: Map<String, Value> = serde_json::from_str(json)?;

    let cities = raw
        .into_iter()
        .filter_map(|(city, value)| match RawCoordinate::deserialize(value) {
            Ok(RawCoordinate { lat, lon }) => Some(CityCoordinate { city, lat, lon }),
            Err(err) => {
                warn!(city = %city, error = %err, "Skipping city with invalid coordinates");
                None
            }
        })
        .collect();

    Ok(cities)
}
