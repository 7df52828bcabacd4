//! SQLite projection of the weather cache.
//!
//! Two tables: `Weather_Type`, the fixed category catalog, and `Weather_Data`,
//! one row per cached observation with a foreign key into the catalog.

use rusqlite::{Connection, OptionalExtension, params};
use std::{fs, io, path::Path};
use tracing::{info, warn};

use crate::{
    cache::ObservationCache,
    classify::{WeatherCategory, canonical_label},
    error::StoreError,
};

/// An observation the ingester could not map to a catalog category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub label: String,
    pub city: String,
    pub datetime: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    /// Rows already present; ignored by the uniqueness constraint.
    pub duplicates: usize,
    pub skipped: Vec<SkippedRow>,
}

/// A stored observation joined with its category title.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRow {
    pub city: String,
    pub datetime: String,
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub description: Option<String>,
    pub category: String,
    pub is_extreme: bool,
}

pub struct WeatherStore {
    conn: Connection,
}

impl WeatherStore {
    /// Open (or create) the database and ensure its schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| StoreError::Open(path.to_path_buf(), e))?;
        Self::with_connection(conn)
    }

    /// Delete any existing database file, then open a new one.
    pub fn open_fresh<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => info!(path = %path.display(), "Removed old weather database"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Remove(path.to_path_buf(), e)),
        }
        Self::open(path)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Open(":memory:".into(), e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self { conn };
        store.init_schema().map_err(StoreError::Schema)?;
        Ok(store)
    }

    /// Create both tables if missing and seed the catalog. Safe to re-run:
    /// existing category ids are never changed or duplicated.
    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS Weather_Type (
                id INTEGER PRIMARY KEY,
                title TEXT UNIQUE
            );

            CREATE TABLE IF NOT EXISTS Weather_Data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city TEXT,
                datetime TEXT,
                temp REAL,
                humidity REAL,
                wind_speed REAL,
                description TEXT,
                weather_type_id INTEGER,
                is_extreme INTEGER,
                UNIQUE(city, datetime),
                FOREIGN KEY(weather_type_id) REFERENCES Weather_Type(id)
            );
            "#,
        )?;

        let mut seed = self
            .conn
            .prepare("INSERT OR IGNORE INTO Weather_Type (id, title) VALUES (?1, ?2)")?;
        for category in WeatherCategory::all() {
            seed.execute(params![category.id(), category.as_str()])?;
        }

        Ok(())
    }

    /// Catalog id for a raw label: synonym mapping, then case-insensitive
    /// exact match on the title.
    pub fn category_id(&self, label: &str) -> Result<Option<i64>, StoreError> {
        lookup_category(&self.conn, label)
    }

    /// Load every cache entry into `Weather_Data`. Duplicates are ignored,
    /// unknown categories are skipped with a warning.
    pub fn ingest(&mut self, cache: &ObservationCache) -> Result<IngestReport, StoreError> {
        let mut report = IngestReport::default();
        let tx = self.conn.transaction()?;

        {
            let mut insert = tx.prepare_cached(
                r#"
                INSERT OR IGNORE INTO Weather_Data
                (city, datetime, temp, humidity, wind_speed, description, weather_type_id, is_extreme)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;

            for obs in cache.observations() {
                let datetime = obs.timestamp_string();

                let Some(type_id) = lookup_category(&tx, &obs.weather)? else {
                    warn!(
                        label = %obs.weather,
                        city = %obs.city,
                        datetime = %datetime,
                        "Skipping observation with unknown weather type"
                    );
                    report.skipped.push(SkippedRow {
                        label: obs.weather.clone(),
                        city: obs.city.clone(),
                        datetime,
                    });
                    continue;
                };

                let changed = insert.execute(params![
                    obs.city,
                    datetime,
                    obs.temp,
                    obs.humidity,
                    obs.wind_speed,
                    obs.description,
                    type_id,
                    i32::from(obs.is_extreme),
                ])?;

                if changed == 0 {
                    report.duplicates += 1;
                } else {
                    report.inserted += 1;
                }
            }
        }

        tx.commit()?;

        info!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped.len(),
            "Ingested weather cache"
        );
        Ok(report)
    }

    pub fn observation_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM Weather_Data", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Catalog contents in id order.
    pub fn categories(&self) -> Result<Vec<(i64, String)>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, title FROM Weather_Type ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Observations joined with their category title, ordered by city and time.
    pub fn observations(&self) -> Result<Vec<ObservationRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT wd.city, wd.datetime, wd.temp, wd.humidity, wd.wind_speed,
                   wd.description, wt.title, wd.is_extreme
            FROM Weather_Data wd
            JOIN Weather_Type wt ON wd.weather_type_id = wt.id
            ORDER BY wd.city, wd.datetime
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ObservationRow {
                city: row.get(0)?,
                datetime: row.get(1)?,
                temp: row.get(2)?,
                humidity: row.get(3)?,
                wind_speed: row.get(4)?,
                description: row.get(5)?,
                category: row.get(6)?,
                is_extreme: row.get::<_, i64>(7)? != 0,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn lookup_category(conn: &Connection, label: &str) -> Result<Option<i64>, StoreError> {
    let normalized = canonical_label(label).to_lowercase();
    let mut stmt = conn.prepare_cached("SELECT id FROM Weather_Type WHERE LOWER(title) = ?1")?;
    let id = stmt
        .query_row(params![normalized], |row| row.get(0))
        .optional()?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::InsertionBudget,
        model::Observation,
    };
    use chrono::{TimeZone, Utc};

    fn obs(city: &str, hour: u32, label: &str) -> Observation {
        Observation {
            city: city.to_string(),
            datetime: Utc.with_ymd_and_hms(2025, 4, 9, hour, 0, 0).unwrap(),
            temp: Some(12.0),
            humidity: Some(60.0),
            weather: label.to_string(),
            description: format!("{label} sky"),
            wind_speed: Some(2.5),
            is_extreme: false,
        }
    }

    fn cache_of(observations: Vec<Observation>) -> ObservationCache {
        let mut cache = ObservationCache::new();
        cache.merge(observations, &mut InsertionBudget::new(usize::MAX));
        cache
    }

    #[test]
    fn catalog_is_seeded_once() {
        let store = WeatherStore::in_memory().unwrap();
        store.init_schema().unwrap();
        store.init_schema().unwrap();

        let categories = store.categories().unwrap();
        assert_eq!(categories.len(), 9);
        assert_eq!(categories[0], (0, "Sunny".to_string()));
        assert_eq!(categories[8], (8, "Clear".to_string()));
    }

    #[test]
    fn category_lookup_applies_synonyms() {
        let store = WeatherStore::in_memory().unwrap();
        assert_eq!(store.category_id("Clouds").unwrap(), Some(6));
        assert_eq!(store.category_id("clear").unwrap(), Some(0));
        assert_eq!(store.category_id("TORNADO").unwrap(), Some(4));
        assert_eq!(store.category_id("plasma-storm").unwrap(), None);
    }

    #[test]
    fn drizzle_is_stored_as_rainy() {
        let mut store = WeatherStore::in_memory().unwrap();
        let report = store.ingest(&cache_of(vec![obs("Austin", 0, "drizzle")])).unwrap();

        assert_eq!(report.inserted, 1);
        let rows = store.observations().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category, "Rainy");
        assert_eq!(rows[0].datetime, "2025-04-09 00:00:00");
        assert_eq!(rows[0].description.as_deref(), Some("drizzle sky"));
    }

    #[test]
    fn unknown_label_is_skipped_with_report() {
        let mut store = WeatherStore::in_memory().unwrap();
        let report = store.ingest(&cache_of(vec![obs("Austin", 3, "plasma-storm")])).unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(
            report.skipped,
            vec![SkippedRow {
                label: "plasma-storm".into(),
                city: "Austin".into(),
                datetime: "2025-04-09 03:00:00".into(),
            }]
        );
        assert_eq!(store.observation_count().unwrap(), 0);
    }

    #[test]
    fn reingesting_does_not_duplicate_rows() {
        let mut store = WeatherStore::in_memory().unwrap();
        let cache = cache_of((0..6).map(|h| obs("Chicago", h, "Rain")).collect());

        let first = store.ingest(&cache).unwrap();
        let second = store.ingest(&cache).unwrap();

        assert_eq!(first.inserted, 6);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 6);
        assert_eq!(store.observation_count().unwrap(), 6);
    }

    #[test]
    fn extreme_flag_is_stored() {
        let mut store = WeatherStore::in_memory().unwrap();
        let mut hot = obs("Miami", 14, "Clear");
        hot.is_extreme = true;
        store.ingest(&cache_of(vec![hot, obs("Miami", 15, "Clear")])).unwrap();

        let flags: Vec<bool> = store.observations().unwrap().iter().map(|r| r.is_extreme).collect();
        assert_eq!(flags, [true, false]);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let store = WeatherStore::in_memory().unwrap();
        let result = store.conn.execute(
            "INSERT INTO Weather_Data (city, datetime, weather_type_id, is_extreme) VALUES ('X', 'T', 42, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn open_fresh_discards_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.db");

        let mut store = WeatherStore::open(&path).unwrap();
        store.ingest(&cache_of(vec![obs("Detroit", 1, "Snow")])).unwrap();
        drop(store);

        assert_eq!(WeatherStore::open(&path).unwrap().observation_count().unwrap(), 1);
        assert_eq!(WeatherStore::open_fresh(&path).unwrap().observation_count().unwrap(), 0);
    }

    #[test]
    fn unopenable_path_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("weather.db");
        assert!(matches!(WeatherStore::open(&path), Err(StoreError::Open(..))));
    }
}
