//! Core library for the `weather-history` pipeline.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Weather label classification and the fixed category catalog
//! - The history provider abstraction and the OpenWeather history client
//! - The incremental, budget-limited observation cache
//! - The SQLite projection of the cache
//!
//! It is used by `weather-history-cli`, but the analysis side can also open
//! the [`WeatherStore`] directly.

pub mod cache;
pub mod cities;
pub mod classify;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod provider;
pub mod store;

pub use cache::{InsertionBudget, MergeOutcome, ObservationCache};
pub use cities::load_city_coordinates;
pub use classify::{Classification, WeatherCategory, classify};
pub use config::Config;
pub use error::{CacheError, FetchError, StoreError};
pub use model::{CacheKey, CityCoordinate, Observation};
pub use pipeline::{FetchReport, refresh_cache, update_cache};
pub use plan::{DayWindow, day_windows};
pub use provider::{HistoryProvider, history_provider_from_config};
pub use store::{IngestReport, WeatherStore};
