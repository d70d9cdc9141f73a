//! Weather snapshot model consumed by the recommendation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse weather condition used for scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Rain,
    Snow,
    Cloudy,
    Extreme,
    Unknown,
}

impl WeatherCondition {
    /// Every condition, in declaration order
    pub const ALL: [WeatherCondition; 6] = [
        Self::Clear,
        Self::Rain,
        Self::Snow,
        Self::Cloudy,
        Self::Extreme,
        Self::Unknown,
    ];

    /// Map an OpenWeatherMap condition id to a condition
    /// See: https://openweathermap.org/weather-conditions
    #[must_use]
    pub fn from_openweather_id(id: u16) -> Self {
        match id {
            200..=299 => Self::Extreme,
            300..=399 | 500..=599 => Self::Rain,
            600..=699 => Self::Snow,
            // Volcanic ash, squalls and tornadoes
            762 | 771 | 781 => Self::Extreme,
            700..=799 => Self::Cloudy,
            800 | 801 => Self::Clear,
            802..=804 => Self::Cloudy,
            _ => Self::Unknown,
        }
    }

    /// Stable identifier used in responses and logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Cloudy => "cloudy",
            Self::Extreme => "extreme",
            Self::Unknown => "unknown",
        }
    }
}

/// Current weather at the requested coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub condition: WeatherCondition,
    /// Temperature in Celsius
    pub temperature_c: f64,
    /// Relative humidity in percent
    pub humidity: Option<f64>,
    /// When the provider observed these values
    pub observed_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    #[must_use]
    pub fn new(condition: WeatherCondition, temperature_c: f64) -> Self {
        Self {
            condition,
            temperature_c,
            humidity: None,
            observed_at: Utc::now(),
        }
    }

    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.1}°C", self.temperature_c)
    }
}
