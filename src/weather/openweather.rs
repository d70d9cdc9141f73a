//! OpenWeatherMap current-weather adapter

use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::WeatherProvider;
use crate::config::WeatherConfig;
use crate::error::UpstreamError;
use crate::models::{Coordinate, WeatherCondition, WeatherSnapshot};

const PROVIDER: &str = "weather";
const API_KEY_ENV: &str = "WEATHER_API_KEY";

/// Client for the OpenWeatherMap `/weather` endpoint
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new<B: Into<String>, K: Into<String>>(base_url: B, api_key: K) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("otenki-meshi/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build from configuration, falling back to `WEATHER_API_KEY`
    pub fn from_config(config: &WeatherConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("Missing weather API key (weather.api_key or {API_KEY_ENV})"))?;
        Self::new(config.base_url.as_str(), api_key)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    #[instrument(name = "weather_current", level = "debug", skip(self))]
    async fn current(&self, coordinate: &Coordinate) -> Result<WeatherSnapshot, UpstreamError> {
        let url = format!(
            "{}/weather?lat={}&lon={}&units=metric&appid={}",
            self.base_url,
            coordinate.latitude(),
            coordinate.longitude(),
            urlencoding::encode(&self.api_key)
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::from_status(PROVIDER, status));
        }

        let body: CurrentWeatherResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(PROVIDER, &e))?;

        let snapshot = body.into_snapshot();
        debug!(
            "Weather at {}: {} {}",
            coordinate.format_coordinates(),
            snapshot.condition.as_str(),
            snapshot.format_temperature()
        );
        Ok(snapshot)
    }
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    #[serde(default)]
    weather: Vec<ConditionEntry>,
    main: MainReadings,
    #[serde(default)]
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    id: u16,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    #[serde(default)]
    humidity: Option<f64>,
}

impl CurrentWeatherResponse {
    fn into_snapshot(self) -> WeatherSnapshot {
        let condition = self
            .weather
            .first()
            .map_or(WeatherCondition::Unknown, |entry| {
                WeatherCondition::from_openweather_id(entry.id)
            });
        let observed_at = self
            .dt
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        WeatherSnapshot {
            condition,
            temperature_c: self.main.temp,
            humidity: self.main.humidity,
            observed_at,
        }
    }
}
