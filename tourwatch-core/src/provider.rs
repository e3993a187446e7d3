use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::{fmt::Debug, time::Duration};

use crate::{
    config::WeatherConfig,
    model::{Coordinate, WeatherObservation},
    provider::open_meteo::OpenMeteoProvider,
};

pub mod open_meteo;

/// Source of current weather for a location.
///
/// Implementations never fail: anything that prevents a usable answer is
/// reported as [`WeatherObservation::Unavailable`] so the monitoring loop
/// keeps evaluating the other rules.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(&self, location: Coordinate) -> WeatherObservation;
}

/// Construct the weather provider described by `config`.
pub fn provider_from_config(config: &WeatherConfig) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let mut builder = Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let http = builder.build().context("Failed to build HTTP client for the weather source")?;

    Ok(Box::new(OpenMeteoProvider::with_client(config.base_url.clone(), http)))
}
