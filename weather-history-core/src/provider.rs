use crate::{
    Config, Observation,
    error::FetchError,
    model::CityCoordinate,
    plan::DayWindow,
    provider::openweather::OpenWeatherHistory,
};
use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};

pub mod openweather;

/// Source of hourly historical observations for one city and one day.
///
/// Implementations issue a single bounded request per call and do not retry.
#[async_trait]
pub trait HistoryProvider: Send + Sync + Debug {
    async fn fetch_history(
        &self,
        city: &CityCoordinate,
        window: &DayWindow,
    ) -> Result<Vec<Observation>, FetchError>;
}

/// Construct the history provider from config.
pub fn history_provider_from_config(config: &Config) -> anyhow::Result<OpenWeatherHistory> {
    let api_key = config.api_key()?;

    let provider = OpenWeatherHistory::new(api_key.to_owned())?
        .with_base_url(config.base_url.clone())
        .with_timeout(Duration::from_secs(config.timeout_secs))?;

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = history_provider_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".to_string());

        let provider = history_provider_from_config(&cfg);
        assert!(provider.is_ok());
    }
}
