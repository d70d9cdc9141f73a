//! `OtenkiMeshi` - weather-aware restaurant recommendations
//!
//! Looks up the current weather at the caller's position, picks a fitting
//! food category, and searches for nearby restaurants, widening the search
//! until something turns up.

pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod recommendation;
pub mod response;
pub mod retry;
pub mod search;
pub mod venues;
pub mod weather;
pub mod web;

#[cfg(test)]
mod testing;

// Re-export core types for public API
pub use config::OtenkiConfig;
pub use error::{OtenkiError, UpstreamError};
pub use models::{Coordinate, FoodCategory, TimeOfDayBucket, Venue, WeatherCondition, WeatherSnapshot};
pub use orchestrator::{Orchestrator, Recommendation};
pub use recommendation::{PreferenceTable, RecommendationEngine};
pub use response::{RecommendationResponse, ResponseAssembler};
pub use retry::RetryPolicy;
pub use search::{Exhaustion, FallbackSearchController, RecommendationResult, SearchTier, TierTable};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, OtenkiError>;
