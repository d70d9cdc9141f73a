//! Data models for the OtenkiMeshi service
//!
//! This module contains the core domain models organized by concern:
//! - Location: validated request coordinates
//! - Weather: current conditions as reported by the weather provider
//! - Time of day: local-clock buckets
//! - Venue: food categories and restaurants

pub mod location;
pub mod time_of_day;
pub mod venue;
pub mod weather;

// Re-export all public types for convenient access
pub use location::Coordinate;
pub use time_of_day::TimeOfDayBucket;
pub use venue::{FoodCategory, Venue};
pub use weather::{WeatherCondition, WeatherSnapshot};
