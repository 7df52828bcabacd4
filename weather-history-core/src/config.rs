use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{cache::DEFAULT_BUDGET, provider::openweather::DEFAULT_HISTORY_URL};

/// Input and output locations. Relative paths resolve against `data_dir`,
/// or the platform data directory when `data_dir` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: Option<PathBuf>,
    pub cities: PathBuf,
    pub cache: PathBuf,
    pub database: PathBuf,
    pub export_csv: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            cities: PathBuf::from("cities_weather_coords.json"),
            cache: PathBuf::from("weather_cache.json"),
            database: PathBuf::from("weather.db"),
            export_csv: PathBuf::from("weather_cache.csv"),
        }
    }
}

/// Which days a fetch run covers and how many new entries it may add.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub start_date: NaiveDate,
    pub days: u32,
    pub budget: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2025, 4, 9).unwrap_or(NaiveDate::MIN),
            days: 2,
            budget: DEFAULT_BUDGET,
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
///
/// [paths]
/// cache = "weather_cache.json"
///
/// [run]
/// start_date = "2025-04-09"
/// days = 2
/// budget = 25
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub paths: PathsConfig,
    pub run: RunConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_HISTORY_URL.to_string(),
            timeout_secs: 30,
            paths: PathsConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-history", "weather-history")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Returns the history API key, or an error with a configuration hint.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No API key configured for the weather history provider.\n\
                     Hint: run `weather-history configure` and enter your API key."
                )
            })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.paths.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.data_dir().to_path_buf()),
        }
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.data_dir()?.join(path))
        }
    }

    pub fn cities_path(&self) -> Result<PathBuf> {
        self.resolve(&self.paths.cities)
    }

    pub fn cache_path(&self) -> Result<PathBuf> {
        self.resolve(&self.paths.cache)
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        self.resolve(&self.paths.database)
    }

    pub fn export_csv_path(&self) -> Result<PathBuf> {
        self.resolve(&self.paths.export_csv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.api_key().unwrap_err();

        assert!(err.to_string().contains("No API key configured"));
        assert!(err.to_string().contains("Hint: run `weather-history configure`"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.set_api_key("   ".into());
        assert!(cfg.api_key().is_err());

        cfg.set_api_key("OPEN_KEY".into());
        assert_eq!(cfg.api_key().unwrap(), "OPEN_KEY");
    }

    #[test]
    fn defaults_match_original_run() {
        let cfg = Config::default();
        assert_eq!(cfg.run.budget, 25);
        assert_eq!(cfg.run.days, 2);
        assert_eq!(cfg.run.start_date, NaiveDate::from_ymd_opt(2025, 4, 9).unwrap());
        assert_eq!(cfg.base_url, DEFAULT_HISTORY_URL);
    }

    #[test]
    fn relative_paths_resolve_against_data_dir() {
        let mut cfg = Config::default();
        cfg.paths.data_dir = Some(PathBuf::from("/srv/weather"));
        cfg.paths.database = PathBuf::from("/tmp/other.db");

        assert_eq!(cfg.cache_path().unwrap(), PathBuf::from("/srv/weather/weather_cache.json"));
        assert_eq!(cfg.database_path().unwrap(), PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            api_key = "K"

            [run]
            budget = 10
            "#,
        )
        .unwrap();

        assert_eq!(cfg.api_key().unwrap(), "K");
        assert_eq!(cfg.run.budget, 10);
        assert_eq!(cfg.run.days, 2);
        assert_eq!(cfg.paths.cache, PathBuf::from("weather_cache.json"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_api_key("SAVED".into());
        cfg.run.start_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_key().unwrap(), "SAVED");
        assert_eq!(loaded.run.start_date, cfg.run.start_date);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.api_key.is_none());
    }
}
