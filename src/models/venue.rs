//! Food categories and the venues found for them

use serde::{Deserialize, Serialize};

/// A kind of food the engine can recommend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodCategory {
    /// Stable identifier, e.g. `cold_noodles`
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Term sent to the venue provider; falls back to the label
    #[serde(default)]
    pub keyword: Option<String>,
    /// Short pitch shown alongside the recommendation
    #[serde(default)]
    pub message: Option<String>,
}

impl FoodCategory {
    pub fn new<I: Into<String>, L: Into<String>>(id: I, label: L) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            keyword: None,
            message: None,
        }
    }

    #[must_use]
    pub fn with_keyword<S: Into<String>>(mut self, keyword: S) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    #[must_use]
    pub fn search_keyword(&self) -> &str {
        self.keyword.as_deref().unwrap_or(&self.label)
    }
}

/// A restaurant returned by the venue provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub address: String,
    /// Genre tag as reported by the provider
    pub genre: String,
    /// Distance from the requested coordinate in meters
    pub distance_m: f64,
}
