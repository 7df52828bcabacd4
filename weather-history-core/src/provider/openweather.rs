use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    classify::classify,
    error::FetchError,
    model::{CityCoordinate, Observation},
    plan::DayWindow,
};

use super::HistoryProvider;

pub const DEFAULT_HISTORY_URL: &str = "https://history.openweathermap.org/data/2.5/history/city";

/// OpenWeather "History API" client, hourly granularity, metric units.
#[derive(Debug, Clone)]
pub struct OpenWeatherHistory {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherHistory {
    /// Fails with [`FetchError::MissingApiKey`] when `api_key` is blank.
    pub fn new(api_key: String) -> Result<Self, FetchError> {
        if api_key.trim().is_empty() {
            return Err(FetchError::MissingApiKey);
        }

        Ok(Self {
            api_key,
            base_url: DEFAULT_HISTORY_URL.to_string(),
            http: Client::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, FetchError> {
        self.http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct OwHistoryResponse {
    #[serde(default)]
    list: Vec<OwHistoryEntry>,
}

#[derive(Debug, Deserialize)]
struct OwHistoryEntry {
    dt: i64,
    #[serde(default)]
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
}

#[derive(Debug, Default, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    speed: Option<f64>,
}

#[async_trait]
impl HistoryProvider for OpenWeatherHistory {
    async fn fetch_history(
        &self,
        city: &CityCoordinate,
        window: &DayWindow,
    ) -> Result<Vec<Observation>, FetchError> {
        debug!(city = %city.city, day = %window.day, "Requesting weather history");

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("lat", city.lat.to_string()),
                ("lon", city.lon.to_string()),
                ("type", "hour".to_string()),
                ("start", window.start.timestamp().to_string()),
                ("end", window.end.timestamp().to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .map_err(|source| FetchError::Request {
                city: city.city.clone(),
                source,
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|source| FetchError::Request {
            city: city.city.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(FetchError::Status {
                city: city.city.clone(),
                status,
                body: truncate_body(&body),
            });
        }

        parse_history(&body, &city.city)
    }
}

/// Translate a History API payload into observations for `city`.
///
/// Missing readings count as `0` for the extreme check but stay absent on the
/// observation. Entries with an out-of-range `dt` are dropped.
pub fn parse_history(body: &str, city: &str) -> Result<Vec<Observation>, FetchError> {
    let parsed: OwHistoryResponse = serde_json::from_str(body).map_err(|source| FetchError::Decode {
        city: city.to_string(),
        source,
    })?;

    let observations = parsed
        .list
        .into_iter()
        .filter_map(|entry| {
            let Some(datetime) = unix_to_utc(entry.dt) else {
                warn!(city, dt = entry.dt, "Dropping observation with invalid timestamp");
                return None;
            };

            let (weather, description) = entry
                .weather
                .into_iter()
                .next()
                .map(|w| (w.main, w.description))
                .unwrap_or_default();

            let classification = classify(
                &weather,
                entry.main.temp.unwrap_or(0.0),
                entry.main.humidity.unwrap_or(0.0),
                entry.wind.speed.unwrap_or(0.0),
            );
            if classification.category.is_none() {
                debug!(city, label = %classification.label, "Weather label has no catalog category");
            }

            Some(Observation {
                city: city.to_string(),
                datetime,
                temp: entry.main.temp,
                humidity: entry.main.humidity,
                weather,
                description,
                wind_speed: entry.wind.speed,
                is_extreme: classification.is_extreme,
            })
        })
        .collect();

    Ok(observations)
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
