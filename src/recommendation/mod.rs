//! Recommendation engine
//!
//! Turns a weather snapshot and a time-of-day bucket into an ordered list of
//! food categories. All preferences live in a versioned [`PreferenceTable`]
//! that is loaded once at start-up; the engine itself is a pure lookup.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{FoodCategory, TimeOfDayBucket, WeatherCondition, WeatherSnapshot};
use crate::{OtenkiError, Result};

const BUILTIN_TABLE: &str = include_str!("default_preferences.json");

/// Temperature band a snapshot falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureBand {
    Cold,
    Mild,
    Hot,
}

/// Cut-offs between the temperature bands, in Celsius
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureBands {
    /// Strictly below this is cold
    pub cold_below: f64,
    /// Strictly above this is hot
    pub hot_above: f64,
}

impl TemperatureBands {
    #[must_use]
    pub fn classify(&self, temperature_c: f64) -> TemperatureBand {
        if temperature_c < self.cold_below {
            TemperatureBand::Cold
        } else if temperature_c > self.hot_above {
            TemperatureBand::Hot
        } else {
            TemperatureBand::Mild
        }
    }
}

/// Conditions under which a rule applies; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    #[serde(default)]
    pub condition: Option<WeatherCondition>,
    #[serde(default)]
    pub band: Option<TemperatureBand>,
    #[serde(default)]
    pub bucket: Option<TimeOfDayBucket>,
}

impl RuleMatch {
    fn matches(
        &self,
        condition: WeatherCondition,
        band: TemperatureBand,
        bucket: TimeOfDayBucket,
    ) -> bool {
        self.condition.is_none_or(|c| c == condition)
            && self.band.is_none_or(|b| b == band)
            && self.bucket.is_none_or(|b| b == bucket)
    }
}

/// Adds scores to categories when its match applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRule {
    #[serde(default)]
    pub when: RuleMatch,
    pub scores: BTreeMap<String, i32>,
}

/// Versioned scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceTable {
    pub version: u32,
    pub bands: TemperatureBands,
    /// Reported when the category filter had to be dropped
    pub generic: FoodCategory,
    /// Category catalog; position is the tie-break priority
    pub categories: Vec<FoodCategory>,
    /// Ordering used when weather is unknown or nothing scored
    pub neutral_order: Vec<String>,
    pub rules: Vec<ScoreRule>,
}

impl PreferenceTable {
    /// The table compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_TABLE)
    }

    /// Parse and validate a JSON table
    pub fn from_json(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json)
            .map_err(|e| OtenkiError::config(format!("Invalid preference table: {e}")))?;
        table.validate()?;
        Ok(table)
    }

    /// Load the table from `path`, or the built-in one when no path is configured
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::builtin()?);
        };

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read preference table: {}", path.display()))?;
        let table = Self::from_json(&json)
            .with_context(|| format!("Failed to load preference table: {}", path.display()))?;
        debug!(
            "Loaded preference table v{} with {} categories from {}",
            table.version,
            table.categories.len(),
            path.display()
        );
        Ok(table)
    }

    /// Validate structural invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(OtenkiError::config(
                "Preference table must define at least one category",
            ));
        }

        let mut ids = HashSet::new();
        for category in &self.categories {
            if category.id.is_empty() {
                return Err(OtenkiError::config("Category ids cannot be empty"));
            }
            if !ids.insert(category.id.as_str()) {
                return Err(OtenkiError::config(format!(
                    "Duplicate category id '{}'",
                    category.id
                )));
            }
        }

        if ids.contains(self.generic.id.as_str()) {
            return Err(OtenkiError::config(format!(
                "Generic category id '{}' collides with a catalog category",
                self.generic.id
            )));
        }

        if self.neutral_order.is_empty() {
            return Err(OtenkiError::config("Neutral ordering cannot be empty"));
        }
        let mut seen = HashSet::new();
        for id in &self.neutral_order {
            if !ids.contains(id.as_str()) {
                return Err(OtenkiError::config(format!(
                    "Neutral ordering references unknown category '{id}'"
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(OtenkiError::config(format!(
                    "Neutral ordering lists '{id}' twice"
                )));
            }
        }

        for rule in &self.rules {
            if let Some(id) = rule.scores.keys().find(|id| !ids.contains(id.as_str())) {
                return Err(OtenkiError::config(format!(
                    "Score rule references unknown category '{id}'"
                )));
            }
        }

        if !self.bands.cold_below.is_finite()
            || !self.bands.hot_above.is_finite()
            || self.bands.cold_below > self.bands.hot_above
        {
            return Err(OtenkiError::config(format!(
                "Temperature bands are inconsistent: cold below {} / hot above {}",
                self.bands.cold_below, self.bands.hot_above
            )));
        }

        Ok(())
    }
}

/// Scores categories against the preference table
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    table: Arc<PreferenceTable>,
    priority: HashMap<String, usize>,
}

impl RecommendationEngine {
    #[must_use]
    pub fn new(table: Arc<PreferenceTable>) -> Self {
        let priority = table
            .categories
            .iter()
            .enumerate()
            .map(|(index, category)| (category.id.clone(), index))
            .collect();
        Self { table, priority }
    }

    #[must_use]
    pub fn table(&self) -> &PreferenceTable {
        &self.table
    }

    #[must_use]
    pub fn generic_category(&self) -> &FoodCategory {
        &self.table.generic
    }

    #[must_use]
    pub fn band_for(&self, weather: &WeatherSnapshot) -> TemperatureBand {
        self.table.bands.classify(weather.temperature_c)
    }

    /// Categories by descending preference. Never empty, never repeats a category.
    #[must_use]
    pub fn recommend(
        &self,
        weather: &WeatherSnapshot,
        bucket: TimeOfDayBucket,
    ) -> Vec<FoodCategory> {
        if weather.condition == WeatherCondition::Unknown {
            debug!("Unknown weather condition, using neutral ordering");
            return self.neutral();
        }

        let band = self.band_for(weather);
        let mut totals = vec![0i32; self.table.categories.len()];
        for rule in self
            .table
            .rules
            .iter()
            .filter(|rule| rule.when.matches(weather.condition, band, bucket))
        {
            for (id, score) in &rule.scores {
                if let Some(&index) = self.priority.get(id) {
                    totals[index] = totals[index].saturating_add(*score);
                }
            }
        }

        let mut ranked: Vec<usize> = (0..totals.len()).filter(|&i| totals[i] > 0).collect();
        if ranked.is_empty() {
            debug!(
                "No category scored for {:?}/{:?}/{:?}, using neutral ordering",
                weather.condition, band, bucket
            );
            return self.neutral();
        }
        ranked.sort_by(|&a, &b| totals[b].cmp(&totals[a]).then(a.cmp(&b)));

        debug!(
            "Ranked {} categories for {:?}/{:?}/{:?}, top: {} ({})",
            ranked.len(),
            weather.condition,
            band,
            bucket,
            self.table.categories[ranked[0]].id,
            totals[ranked[0]]
        );

        ranked
            .into_iter()
            .map(|index| self.table.categories[index].clone())
            .collect()
    }

    fn neutral(&self) -> Vec<FoodCategory> {
        self.table
            .neutral_order
            .iter()
            .filter_map(|id| self.priority.get(id))
            .map(|&index| self.table.categories[index].clone())
            .collect()
    }
}
