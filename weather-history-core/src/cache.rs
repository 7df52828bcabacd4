//! Durable, deduplicated store of observations keyed by [`CacheKey`].
//!
//! The cache file is a JSON object mapping `city_timestamp` strings to
//! observations. It is the source of truth; the relational store is rebuilt
//! from it. Entries are only ever added.

use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::Path,
};
use tracing::{debug, info, warn};

use crate::{
    error::CacheError,
    model::{CacheKey, Observation},
};

/// New entries a single run may add unless configured otherwise.
pub const DEFAULT_BUDGET: usize = 25;

/// Hard cap on new cache entries for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionBudget {
    limit: usize,
    used: usize,
}

impl InsertionBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    fn try_take(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.used += 1;
        true
    }
}

impl Default for InsertionBudget {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET)
    }
}

/// What a single [`ObservationCache::merge`] call did with its input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    /// Already cached, or repeated earlier in the same batch.
    pub duplicates: usize,
    /// New observations refused because the budget was spent.
    pub over_budget: usize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ObservationCache {
    entries: BTreeMap<CacheKey, Observation>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache file; a missing or unreadable file yields an empty cache.
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "No readable weather cache, starting empty");
                return Self::new();
            }
        };

        match Self::from_json(&contents) {
            Ok(cache) => {
                debug!(path = %path.display(), entries = cache.len(), "Loaded weather cache");
                cache
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Weather cache is corrupt, starting empty");
                Self::new()
            }
        }
    }

    /// Parse cache file contents. Keys are recomputed from each entry; entries
    /// that don't parse as observations are skipped with a warning.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: Map<String, Value> = serde_json::from_str(json)?;
        let mut cache = Self::new();

        for (file_key, value) in raw {
            match serde_json::from_value::<Observation>(value) {
                Ok(obs) => {
                    cache.entries.entry(obs.key()).or_insert(obs);
                }
                Err(err) => warn!(key = %file_key, error = %err, "Skipping malformed cache entry"),
            }
        }

        Ok(cache)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let keyed: BTreeMap<String, &Observation> = self
            .entries
            .iter()
            .map(|(key, obs)| (key.to_string(), obs))
            .collect();
        serde_json::to_string_pretty(&keyed)
    }

    /// Rewrite the whole cache file.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CacheError::CreateDir(parent.to_path_buf(), e))?;
        }

        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| CacheError::Write(path.to_path_buf(), e))?;

        debug!(path = %path.display(), entries = self.len(), "Saved weather cache");
        Ok(())
    }

    /// Add observations in order, skipping keys already present. New keys are
    /// accepted only while `budget` has room; the first-seen entry for a key
    /// always wins.
    pub fn merge<I>(&mut self, observations: I, budget: &mut InsertionBudget) -> MergeOutcome
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut outcome = MergeOutcome::default();

        for obs in observations {
            let key = obs.key();
            if self.entries.contains_key(&key) {
                outcome.duplicates += 1;
            } else if budget.try_take() {
                self.entries.insert(key, obs);
                outcome.inserted += 1;
            } else {
                outcome.over_budget += 1;
            }
        }

        outcome
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &CacheKey) -> Option<&Observation> {
        self.entries.get(key)
    }

    /// Entries in key order (city, then timestamp).
    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.entries.values()
    }

    /// Write the CSV projection of the cache. Returns the number of rows.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<usize, csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut rows = 0;

        for obs in self.observations() {
            wtr.serialize(obs)?;
            rows += 1;
        }

        wtr.flush()?;
        Ok(rows)
    }

    /// Export to a CSV file; an empty cache writes nothing.
    pub fn export_csv(&self, path: &Path) -> Result<usize, CacheError> {
        if self.is_empty() {
            info!("Nothing to export");
            return Ok(0);
        }

        let file = fs::File::create(path).map_err(|e| CacheError::Write(path.to_path_buf(), e))?;
        let rows = self
            .write_csv(file)
            .map_err(|e| CacheError::Export(path.to_path_buf(), e))?;

        info!(path = %path.display(), rows, "Exported weather cache to CSV");
        Ok(rows)
    }
}
