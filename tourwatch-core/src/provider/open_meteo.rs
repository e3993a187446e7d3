use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::{Coordinate, CurrentConditions, WeatherObservation};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";

const CURRENT_FIELDS: &str = "temperature_2m,precipitation,wind_speed_10m,is_day";

/// Open-Meteo forecast API, current conditions only. No API key needed.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        Self { base_url: base_url.into(), http }
    }

    /// Fetch the `current` object for `location`.
    ///
    /// Only an HTTP 200 with a JSON body holding `current` counts as success.
    pub async fn fetch_current(&self, location: Coordinate) -> Result<CurrentConditions> {
        let url = format!("{}/v1/forecast", self.base_url.trim_end_matches('/'));

        debug!(%location, %url, "requesting current weather");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to Open-Meteo (current weather)")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read Open-Meteo response body")?;

        if status != StatusCode::OK {
            return Err(anyhow!(
                "Open-Meteo request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: OmForecastResponse =
            serde_json::from_str(&body).context("Failed to parse Open-Meteo JSON")?;

        parsed
            .current
            .ok_or_else(|| anyhow!("Open-Meteo response contained no `current` object"))
    }
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    current: Option<CurrentConditions>,
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn current_weather(&self, location: Coordinate) -> WeatherObservation {
        match self.fetch_current(location).await {
            Ok(current) => WeatherObservation::Available(current),
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(%location, error = %reason, "weather unavailable");
                WeatherObservation::Unavailable
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
