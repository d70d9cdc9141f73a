//! Configuration management for the OtenkiMeshi service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::OtenkiError;
use crate::models::Coordinate;
use crate::retry::RetryPolicy;
use crate::search::{SearchTier, TierTable, default_tiers};
use anyhow::{Context, Result};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "OTENKI_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtenkiConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub venues: VenuesConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Whole-request budget; requests still running after this are dropped
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Falls back to `WEATHER_API_KEY`
    pub api_key: Option<String>,
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
}

/// Venue search API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenuesConfig {
    /// Falls back to `HOTPEPPER_API_KEY`
    pub api_key: Option<String>,
    #[serde(default = "default_venues_base_url")]
    pub base_url: String,
    /// Results requested from the provider per call
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Venues returned to the user
    #[serde(default = "default_max_venues")]
    pub max_venues: usize,
}

/// Timeouts and retries applied to every provider call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_tiers")]
    pub tiers: Vec<SearchTier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Preference table override; the built-in table is used when unset
    pub table_path: Option<PathBuf>,
    /// IANA zone used to derive the time-of-day bucket
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Used when a request carries no coordinate at all
    pub fallback_coordinate: Option<Coordinate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Persist entries to disk; otherwise they are only logged
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    29_000
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_venues_base_url() -> String {
    "https://webservice.recruit.co.jp/hotpepper/gourmet/v1".to_string()
}

fn default_page_size() -> u32 {
    50
}

fn default_max_venues() -> usize {
    5
}

fn default_attempt_timeout() -> u64 {
    3000
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff() -> u64 {
    100
}

fn default_timezone() -> String {
    "Asia/Tokyo".to_string()
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("otenki-meshi")
        .join("audit")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
        }
    }
}

impl Default for VenuesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_venues_base_url(),
            page_size: default_page_size(),
            max_venues: default_max_venues(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: default_attempt_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            table_path: None,
            timezone: default_timezone(),
            fallback_coordinate: None,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: default_audit_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl OtenkiConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|path| path.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Add environment variable overrides, e.g. OTENKI_SERVER__PORT
        builder = builder.add_source(
            Environment::with_prefix("OTENKI")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: OtenkiConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("otenki-meshi").join("config.toml"))
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_request_budget()?;
        Ok(())
    }

    /// Parsed time zone for time-of-day bucketing
    pub fn timezone(&self) -> Result<Tz> {
        self.recommendation
            .timezone
            .parse::<Tz>()
            .map_err(|_| {
                OtenkiError::config(format!(
                    "Unknown time zone '{}'",
                    self.recommendation.timezone
                ))
                .into()
            })
    }

    pub fn tier_table(&self) -> Result<TierTable> {
        Ok(TierTable::new(self.search.tiers.clone())?)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.upstream)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        for (name, key) in [
            ("weather.api_key", &self.weather.api_key),
            ("venues.api_key", &self.venues.api_key),
        ] {
            if key.as_ref().is_some_and(|k| k.trim().is_empty()) {
                return Err(OtenkiError::config(format!(
                    "{name} cannot be empty if provided. Either remove it or provide a valid key."
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.upstream.max_retries > 1 {
            return Err(OtenkiError::config("Upstream max retries cannot exceed 1").into());
        }

        if self.upstream.attempt_timeout_ms == 0 || self.upstream.attempt_timeout_ms > 60_000 {
            return Err(OtenkiError::config(
                "Upstream attempt timeout must be between 1 and 60000 ms",
            )
            .into());
        }

        if self.upstream.retry_backoff_ms > 5_000 {
            return Err(OtenkiError::config("Retry backoff cannot exceed 5000 ms").into());
        }

        if self.server.request_timeout_ms == 0 || self.server.request_timeout_ms > 300_000 {
            return Err(OtenkiError::config(
                "Request timeout must be between 1 and 300000 ms",
            )
            .into());
        }

        if !(1..=100).contains(&self.venues.page_size) {
            return Err(OtenkiError::config("Venue page size must be between 1 and 100").into());
        }

        if self.venues.max_venues == 0 || self.venues.max_venues > 50 {
            return Err(OtenkiError::config("Maximum venues must be between 1 and 50").into());
        }

        self.tier_table()?;

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(OtenkiError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(OtenkiError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Weather", &self.weather.base_url),
            ("Venue", &self.venues.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(OtenkiError::config(format!(
                    "{name} API base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        self.timezone()?;

        Ok(())
    }

    /// Worst case is one weather call plus every tier, each with its retry
    fn validate_request_budget(&self) -> Result<()> {
        let calls = 1 + u32::try_from(self.search.tiers.len()).unwrap_or(u32::MAX);
        let worst_case = self.retry_policy().worst_case() * calls;
        if worst_case >= self.request_timeout() {
            return Err(OtenkiError::config(format!(
                "Upstream worst case of {}ms does not fit the {}ms request timeout",
                worst_case.as_millis(),
                self.server.request_timeout_ms
            ))
            .into());
        }
        Ok(())
    }
}
