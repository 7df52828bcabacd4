use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use std::path::PathBuf;
use weather_history_core::{
    Config, FetchReport, IngestReport, ObservationCache, WeatherStore, day_windows,
    history_provider_from_config, load_city_coordinates, refresh_cache,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-history", version, about = "Historical weather cache and ingestion")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API key and data directory.
    Configure,

    /// Fetch new observations into the cache, then export it to CSV.
    Fetch(FetchArgs),

    /// Load the cache into the SQLite store.
    Ingest {
        /// Delete the existing database before ingesting.
        #[arg(long)]
        fresh: bool,
    },

    /// Export the cache to CSV.
    Export,

    /// Fetch, export, then rebuild the database from the cache.
    Run(FetchArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// First UTC day to fetch, e.g. 2025-04-09.
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Number of consecutive days to fetch.
    #[arg(long)]
    days: Option<u32>,

    /// Maximum number of new cache entries for this run.
    #[arg(long)]
    budget: Option<usize>,
}

impl FetchArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(start_date) = self.start_date {
            config.run.start_date = start_date;
        }
        if let Some(days) = self.days {
            config.run.days = days;
        }
        if let Some(budget) = self.budget {
            config.run.budget = budget;
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure => configure(config)?,
            Command::Fetch(args) => {
                args.apply(&mut config);
                let (cache, report) = fetch(&config).await?;
                print_fetch_summary(&report);
                export(&config, &cache)?;
            }
            Command::Ingest { fresh } => {
                let cache = ObservationCache::load(&config.cache_path()?);
                let report = ingest(&config, &cache, fresh)?;
                print_ingest_summary(&report);
            }
            Command::Export => {
                let cache = ObservationCache::load(&config.cache_path()?);
                export(&config, &cache)?;
            }
            Command::Run(args) => {
                args.apply(&mut config);

                println!("=== Running Weather Cache Update ===");
                let (cache, report) = fetch(&config).await?;
                print_fetch_summary(&report);
                export(&config, &cache)?;

                println!("\n=== Ingesting Weather Cache into SQLite ===");
                let report = ingest(&config, &cache, true)?;
                print_ingest_summary(&report);
            }
        }

        Ok(())
    }
}

fn configure(mut config: Config) -> Result<()> {
    let api_key = Password::new("OpenWeather history API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key.trim().to_string());

    let current_dir = config.data_dir()?;
    let data_dir = Text::new("Data directory:")
        .with_default(&current_dir.display().to_string())
        .prompt()
        .context("Failed to read data directory")?;
    config.paths.data_dir = Some(PathBuf::from(data_dir));

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Returns the merged cache as saved, so later steps need not re-read it.
async fn fetch(config: &Config) -> Result<(ObservationCache, FetchReport)> {
    let provider = history_provider_from_config(config)?;
    let cities = load_city_coordinates(&config.cities_path()?);
    let windows = day_windows(config.run.start_date, config.run.days);
    let cache_path = config.cache_path()?;

    let (cache, report) = refresh_cache(&provider, &cities, &windows, &cache_path, config.run.budget)
        .await
        .with_context(|| format!("Failed to update weather cache {}", cache_path.display()))?;

    println!("Total cities processed: {}", cities.len());
    println!("Cache file saved to: {}", cache_path.display());
    Ok((cache, report))
}

fn ingest(config: &Config, cache: &ObservationCache, fresh: bool) -> Result<IngestReport> {
    let db_path = config.database_path()?;

    let mut store = if fresh {
        WeatherStore::open_fresh(&db_path)?
    } else {
        WeatherStore::open(&db_path)?
    };

    let report = store.ingest(cache)?;
    println!("Database populated: {}", db_path.display());
    Ok(report)
}

fn export(config: &Config, cache: &ObservationCache) -> Result<()> {
    let csv_path = config.export_csv_path()?;

    let rows = cache.export_csv(&csv_path)?;
    if rows > 0 {
        println!("Exported {rows} rows to {}", csv_path.display());
    } else {
        println!("Nothing to export.");
    }
    Ok(())
}

fn print_fetch_summary(report: &FetchReport) {
    println!("Slices fetched: {}/{}", report.slices_fetched, report.slices_planned);
    println!("Observations fetched: {}", report.observations_fetched);
    println!("New entries added: {}", report.inserted);
    if report.budget_exhausted {
        println!("Insertion budget reached ({} dropped)", report.dropped_over_budget);
    }
    for failed in &report.failed {
        println!("  failed: {} on {}: {}", failed.city, failed.day, failed.reason);
    }
}

fn print_ingest_summary(report: &IngestReport) {
    println!("Inserted {} new rows into Weather_Data.", report.inserted);
    println!("Already present: {}", report.duplicates);
    println!("Skipped (unknown weather type): {}", report.skipped.len());
    for row in &report.skipped {
        println!("  skipped '{}' in {} at {}", row.label, row.city, row.datetime);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use weather_history_core::{InsertionBudget, Observation};

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.paths.data_dir = Some(dir.to_path_buf());
        config
    }

    fn cache_with(labels: &[&str]) -> ObservationCache {
        let observations = labels.iter().enumerate().map(|(hour, label)| Observation {
            city: "Austin".to_string(),
            datetime: Utc.with_ymd_and_hms(2025, 4, 9, hour as u32, 0, 0).unwrap(),
            temp: Some(22.0),
            humidity: Some(55.0),
            weather: label.to_string(),
            description: String::new(),
            wind_speed: Some(3.0),
            is_extreme: false,
        });

        let mut cache = ObservationCache::new();
        cache.merge(observations, &mut InsertionBudget::new(10));
        cache
    }

    #[test]
    fn export_and_ingest_use_the_given_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let cache = cache_with(&["Clear", "Rain", "Clouds"]);

        export(&config, &cache).unwrap();
        let report = ingest(&config, &cache, true).unwrap();

        // Nothing was saved to the cache path; both steps worked from memory.
        assert!(!config.cache_path().unwrap().exists());
        assert_eq!(report.inserted, 3);
        let csv = std::fs::read_to_string(config.export_csv_path().unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn fetch_args_override_run_settings() {
        let mut config = Config::default();
        let args = FetchArgs {
            start_date: NaiveDate::from_ymd_opt(2025, 5, 1),
            days: None,
            budget: Some(5),
        };
        args.apply(&mut config);

        assert_eq!(config.run.start_date, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
        assert_eq!(config.run.days, 2);
        assert_eq!(config.run.budget, 5);
    }
}
