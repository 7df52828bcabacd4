use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format used for observation timestamps everywhere they are rendered as text:
/// cache keys, the cache file, the CSV export and the `datetime` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A city and the coordinates used to query its weather history.
#[derive(Debug, Clone, PartialEq)]
pub struct CityCoordinate {
    pub city: String,
    pub lat: f64,
    pub lon: f64,
}

/// One hourly weather reading for one city, as stored in the cache.
///
/// Field names double as the keys of the cache file and the CSV header, so the
/// declaration order here is the export column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub city: String,
    #[serde(with = "timestamp_format")]
    pub datetime: DateTime<Utc>,
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    /// Raw provider label, e.g. `"Clouds"`. Mapped to a category at ingest time.
    #[serde(default)]
    pub weather: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default, with = "extreme_flag")]
    pub is_extreme: bool,
}

impl Observation {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.city, self.datetime)
    }

    pub fn timestamp_string(&self) -> String {
        self.datetime.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Identity of a cached observation: normalized city plus UTC timestamp.
///
/// The city is lower-cased and spaces become `_`, so `"New York"` and
/// `"new york"` name the same city. Two observations with equal keys are the
/// same real-world reading. The string form (`Display`) is
/// `<city>_<YYYY-MM-DD HH:MM:SS>` and is what the cache file uses as its keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    city: String,
    timestamp: DateTime<Utc>,
}

impl CacheKey {
    pub fn new(city: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            city: normalize_city(city),
            timestamp,
        }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.city, self.timestamp.format(TIMESTAMP_FORMAT))
    }
}

fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase().replace(' ', "_")
}

mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&dt.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(|ndt| ndt.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

/// Persisted as `0`/`1`; older cache files may carry a boolean instead.
mod extreme_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flag: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*flag))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Flag {
            Bool(bool),
            Int(i64),
            Float(f64),
        }

        Ok(match Flag::deserialize(d)? {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
            Flag::Float(f) => f != 0.0,
        })
    }
}
