//! Incremental fetch run: walk the plan, fetch each slice, merge into the cache
//! until the budget is spent.

use chrono::NaiveDate;
use std::path::Path;
use tracing::{info, warn};

use crate::{
    cache::{InsertionBudget, ObservationCache},
    error::CacheError,
    model::CityCoordinate,
    plan::{DayWindow, plan_slices},
    provider::HistoryProvider,
};

/// A (city, day) slice whose request failed and contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSlice {
    pub city: String,
    pub day: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub slices_planned: usize,
    pub slices_fetched: usize,
    pub failed: Vec<FailedSlice>,
    pub observations_fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub dropped_over_budget: usize,
    pub budget_exhausted: bool,
}

/// Fetch the planned slices in order and merge them into `cache`.
///
/// A failed request is logged and recorded, never propagated. Once `budget`
/// is exhausted no further slices are requested.
pub async fn update_cache<P>(
    provider: &P,
    cities: &[CityCoordinate],
    windows: &[DayWindow],
    cache: &mut ObservationCache,
    budget: &mut InsertionBudget,
) -> FetchReport
where
    P: HistoryProvider + ?Sized,
{
    let slices = plan_slices(cities, windows);
    let mut report = FetchReport {
        slices_planned: slices.len(),
        ..FetchReport::default()
    };

    for slice in slices {
        if budget.is_exhausted() {
            info!(limit = budget.limit(), "Insertion budget reached, skipping remaining slices");
            report.budget_exhausted = true;
            break;
        }

        report.slices_fetched += 1;

        let observations = match provider.fetch_history(slice.city, &slice.window).await {
            Ok(observations) => observations,
            Err(err) => {
                let reason = err.chain();
                warn!(city = %slice.city.city, day = %slice.window.day, error = %reason, "History fetch failed");
                report.failed.push(FailedSlice {
                    city: slice.city.city.clone(),
                    day: slice.window.day,
                    reason,
                });
                continue;
            }
        };

        report.observations_fetched += observations.len();
        let outcome = cache.merge(observations, budget);
        report.inserted += outcome.inserted;
        report.duplicates += outcome.duplicates;
        report.dropped_over_budget += outcome.over_budget;
    }

    report.budget_exhausted |= budget.is_exhausted();
    report
}

/// Load the cache file, run [`update_cache`], and write the cache back.
///
/// Only a failure to write the cache is returned as an error.
pub async fn refresh_cache<P>(
    provider: &P,
    cities: &[CityCoordinate],
    windows: &[DayWindow],
    cache_path: &Path,
    budget_limit: usize,
) -> Result<(ObservationCache, FetchReport), CacheError>
where
    P: HistoryProvider + ?Sized,
{
    let mut cache = ObservationCache::load(cache_path);
    let mut budget = InsertionBudget::new(budget_limit);

    let report = update_cache(provider, cities, windows, &mut cache, &mut budget).await;
    cache.save(cache_path)?;

    info!(
        cities = cities.len(),
        inserted = report.inserted,
        failed = report.failed.len(),
        total = cache.len(),
        "Finished caching process"
    );
    Ok((cache, report))
}
