//! Current-weather lookup

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::models::{Coordinate, WeatherSnapshot};

pub mod openweather;

pub use openweather::OpenWeatherClient;

/// Source of current weather conditions
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Conditions at `coordinate` right now. One call is one upstream attempt;
    /// timeouts and retries are applied by the caller.
    async fn current(&self, coordinate: &Coordinate) -> Result<WeatherSnapshot, UpstreamError>;
}
