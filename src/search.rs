//! Escalating venue search
//!
//! The controller walks an ordered tier table, widening the radius and finally
//! dropping the category filter, until a tier yields venues. Provider failures
//! are absorbed per tier so a flaky venue API degrades to a wider search
//! instead of failing the request.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::models::{Coordinate, FoodCategory, Venue};
use crate::retry::RetryPolicy;
use crate::venues::{VenueQuery, VenueSearchProvider};
use crate::{OtenkiError, Result};

/// One step of the escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTier {
    pub radius_m: u32,
    /// Search for any restaurant instead of the chosen category
    #[serde(default)]
    pub relax_category_filter: bool,
}

impl SearchTier {
    #[must_use]
    pub fn filtered(radius_m: u32) -> Self {
        Self {
            radius_m,
            relax_category_filter: false,
        }
    }

    #[must_use]
    pub fn relaxed(radius_m: u32) -> Self {
        Self {
            radius_m,
            relax_category_filter: true,
        }
    }
}

/// Validated, ordered tier sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    tiers: Vec<SearchTier>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

/// 1 km with the category, 3 km with the category, 3 km with anything
#[must_use]
pub fn default_tiers() -> Vec<SearchTier> {
    vec![
        SearchTier::filtered(1000),
        SearchTier::filtered(3000),
        SearchTier::relaxed(3000),
    ]
}

impl TierTable {
    pub fn new(tiers: Vec<SearchTier>) -> Result<Self> {
        let Some(last) = tiers.last() else {
            return Err(OtenkiError::config("Search tier table cannot be empty"));
        };
        if !last.relax_category_filter {
            return Err(OtenkiError::config(
                "The final search tier must relax the category filter",
            ));
        }

        for (index, pair) in tiers.windows(2).enumerate() {
            if pair[1].radius_m < pair[0].radius_m {
                return Err(OtenkiError::config(format!(
                    "Search tier {} shrinks the radius ({}m < {}m)",
                    index + 1,
                    pair[1].radius_m,
                    pair[0].radius_m
                )));
            }
            if pair[0].relax_category_filter && !pair[1].relax_category_filter {
                return Err(OtenkiError::config(format!(
                    "Search tier {} restores the category filter after it was relaxed",
                    index + 1
                )));
            }
        }

        if tiers.iter().any(|tier| tier.radius_m == 0) {
            return Err(OtenkiError::config("Search radius must be positive"));
        }

        Ok(Self { tiers })
    }

    #[must_use]
    pub fn tiers(&self) -> &[SearchTier] {
        &self.tiers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Why every tier came back without venues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exhaustion {
    /// At least one tier answered, just with nothing
    EmptyResults,
    /// Every tier failed at the provider
    ProviderErrors,
}

impl Exhaustion {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyResults => "empty_results",
            Self::ProviderErrors => "provider_errors",
        }
    }
}

/// Outcome of one escalating search
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationResult {
    /// Category reported to the user; the generic one once the filter is dropped
    pub category: FoodCategory,
    pub venues: Vec<Venue>,
    /// Index of the tier that produced `venues`, or the last tier when exhausted
    pub tier: usize,
    pub radius_m: u32,
    pub filter_relaxed: bool,
    pub exhaustion: Option<Exhaustion>,
    /// Lower-ranked categories, only filled when exhausted
    pub alternates: Vec<FoodCategory>,
}

impl RecommendationResult {
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhaustion.is_some()
    }
}

/// Drives a [`VenueSearchProvider`] through a [`TierTable`]
pub struct FallbackSearchController {
    provider: Arc<dyn VenueSearchProvider>,
    tiers: Arc<TierTable>,
    retry: RetryPolicy,
    generic: FoodCategory,
    max_venues: usize,
}

impl FallbackSearchController {
    pub fn new(
        provider: Arc<dyn VenueSearchProvider>,
        tiers: Arc<TierTable>,
        retry: RetryPolicy,
        generic: FoodCategory,
        max_venues: usize,
    ) -> Self {
        Self {
            provider,
            tiers,
            retry,
            generic,
            max_venues,
        }
    }

    #[must_use]
    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    /// Search for the top category in `categories`, escalating until a tier
    /// yields venues. Never fails; a fruitless search is reported as exhausted.
    #[instrument(name = "fallback_search", skip_all, fields(coordinate = %coordinate.format_coordinates()))]
    pub async fn search(
        &self,
        coordinate: &Coordinate,
        categories: &[FoodCategory],
    ) -> RecommendationResult {
        let primary = categories.first().unwrap_or(&self.generic);
        let mut failed_tiers = 0;

        for (index, tier) in self.tiers.tiers().iter().enumerate() {
            let query = VenueQuery {
                coordinate: *coordinate,
                radius_m: tier.radius_m,
                keyword: (!tier.relax_category_filter)
                    .then(|| primary.search_keyword().to_string()),
            };

            match self
                .retry
                .run("venues", || self.provider.search(&query))
                .await
            {
                Ok(mut venues) if !venues.is_empty() => {
                    venues.truncate(self.max_venues);
                    info!(
                        "Tier {index} ({}m, relaxed: {}) found {} venues for '{}'",
                        tier.radius_m,
                        tier.relax_category_filter,
                        venues.len(),
                        primary.id
                    );
                    return RecommendationResult {
                        category: if tier.relax_category_filter {
                            self.generic.clone()
                        } else {
                            primary.clone()
                        },
                        venues,
                        tier: index,
                        radius_m: tier.radius_m,
                        filter_relaxed: tier.relax_category_filter,
                        exhaustion: None,
                        alternates: Vec::new(),
                    };
                }
                Ok(_) => {
                    debug!("Tier {index} ({}m) returned no venues", tier.radius_m);
                }
                Err(error) => {
                    failed_tiers += 1;
                    warn!("Tier {index} ({}m) failed: {error}", tier.radius_m);
                }
            }
        }

        let exhaustion = if failed_tiers == self.tiers.len() {
            Exhaustion::ProviderErrors
        } else {
            Exhaustion::EmptyResults
        };
        let last_index = self.tiers.len().saturating_sub(1);
        let last = self.tiers.tiers().last().copied().unwrap_or(SearchTier::relaxed(0));
        warn!(
            "All {} search tiers exhausted for '{}' ({})",
            self.tiers.len(),
            primary.id,
            exhaustion.as_str()
        );

        RecommendationResult {
            category: self.generic.clone(),
            venues: Vec::new(),
            tier: last_index,
            radius_m: last.radius_m,
            filter_relaxed: last.relax_category_filter,
            exhaustion: Some(exhaustion),
            alternates: categories.iter().skip(1).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use crate::testing::{ScriptedVenues, venue};
    use rstest::rstest;
    use std::time::Duration;

    fn categories() -> Vec<FoodCategory> {
        vec![
            FoodCategory::new("ramen", "Ramen").with_keyword("ラーメン"),
            FoodCategory::new("curry", "Curry"),
        ]
    }

    fn controller(provider: Arc<ScriptedVenues>, max_venues: usize) -> FallbackSearchController {
        FallbackSearchController::new(
            provider,
            Arc::new(TierTable::default()),
            RetryPolicy {
                max_retries: 1,
                attempt_timeout: Duration::from_millis(50),
                backoff: Duration::ZERO,
            },
            FoodCategory::new("local", "Local recommendation"),
            max_venues,
        )
    }

    fn coordinate() -> Coordinate {
        Coordinate::new(35.690921, 139.700258).unwrap()
    }

    #[tokio::test]
    async fn test_first_tier_hit_stops_search() {
        let provider = Arc::new(ScriptedVenues::new(vec![Ok(vec![venue("a", 120.0)])]));
        let result = controller(provider.clone(), 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.tier, 0);
        assert_eq!(result.radius_m, 1000);
        assert_eq!(result.category.id, "ramen");
        assert!(!result.filter_relaxed);
        assert!(!result.is_exhausted());
        assert!(result.alternates.is_empty());

        let queries = provider.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].keyword.as_deref(), Some("ラーメン"));
    }

    #[tokio::test]
    async fn test_empty_tier_escalates_to_wider_radius() {
        let provider = Arc::new(ScriptedVenues::new(vec![
            Ok(vec![]),
            Ok(vec![venue("a", 2100.0)]),
        ]));
        let result = controller(provider.clone(), 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.tier, 1);
        assert_eq!(result.radius_m, 3000);
        assert_eq!(result.category.id, "ramen");

        let radii: Vec<u32> = provider.queries().iter().map(|q| q.radius_m).collect();
        assert_eq!(radii, vec![1000, 3000]);
    }

    #[tokio::test]
    async fn test_relaxed_tier_reports_generic_category() {
        let provider = Arc::new(ScriptedVenues::new(vec![
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec![venue("any", 2500.0)]),
        ]));
        let result = controller(provider.clone(), 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.tier, 2);
        assert!(result.filter_relaxed);
        assert_eq!(result.category.id, "local");
        assert!(!result.is_exhausted());
        assert_eq!(provider.queries()[2].keyword, None);
    }

    #[tokio::test]
    async fn test_all_tiers_empty_is_exhausted() {
        let provider = Arc::new(ScriptedVenues::new(vec![]));
        let result = controller(provider.clone(), 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.exhaustion, Some(Exhaustion::EmptyResults));
        assert_eq!(result.tier, 2);
        assert_eq!(result.category.id, "local");
        assert!(result.venues.is_empty());
        assert_eq!(result.alternates.len(), 1);
        assert_eq!(result.alternates[0].id, "curry");
        assert_eq!(provider.queries().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_tier_escalates_like_empty() {
        let rejected = || Err(UpstreamError::rejected("venues", "HTTP 400"));
        let provider = Arc::new(ScriptedVenues::new(vec![
            rejected(),
            Ok(vec![venue("a", 1500.0)]),
        ]));
        let result = controller(provider.clone(), 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.tier, 1);
        assert_eq!(provider.queries().len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_within_tier() {
        let provider = Arc::new(ScriptedVenues::new(vec![
            Err(UpstreamError::unavailable("venues", "HTTP 503")),
            Ok(vec![venue("a", 300.0)]),
        ]));
        let result = controller(provider.clone(), 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.tier, 0);
        let radii: Vec<u32> = provider.queries().iter().map(|q| q.radius_m).collect();
        assert_eq!(radii, vec![1000, 1000]);
    }

    #[tokio::test]
    async fn test_second_transient_failure_escalates() {
        let unavailable = || Err(UpstreamError::unavailable("venues", "HTTP 503"));
        let provider = Arc::new(ScriptedVenues::new(vec![
            unavailable(),
            unavailable(),
            Ok(vec![venue("a", 1800.0)]),
        ]));
        let result = controller(provider.clone(), 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.tier, 1);
        assert_eq!(result.category.id, "ramen");
        assert!(!result.is_exhausted());
        let radii: Vec<u32> = provider.queries().iter().map(|q| q.radius_m).collect();
        assert_eq!(radii, vec![1000, 1000, 3000]);
    }

    #[tokio::test]
    async fn test_transient_failures_on_every_tier_are_provider_errors() {
        let unavailable = || Err(UpstreamError::unavailable("venues", "HTTP 502"));
        let timed_out = || {
            Err(UpstreamError::Timeout {
                provider: "venues",
                timeout_ms: 50,
            })
        };
        let provider = Arc::new(ScriptedVenues::new(vec![
            timed_out(),
            unavailable(),
            unavailable(),
            timed_out(),
            unavailable(),
            unavailable(),
            Ok(vec![venue("late", 100.0)]),
        ]));
        let result = controller(provider.clone(), 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.exhaustion, Some(Exhaustion::ProviderErrors));
        assert!(result.venues.is_empty());
        let radii: Vec<u32> = provider.queries().iter().map(|q| q.radius_m).collect();
        assert_eq!(radii, vec![1000, 1000, 3000, 3000, 3000, 3000]);
    }

    #[tokio::test]
    async fn test_every_tier_failing_is_provider_errors() {
        let rejected = || Err(UpstreamError::rejected("venues", "HTTP 401"));
        let provider = Arc::new(ScriptedVenues::new(vec![rejected(), rejected(), rejected()]));
        let result = controller(provider, 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.exhaustion, Some(Exhaustion::ProviderErrors));
        assert!(result.venues.is_empty());
    }

    #[tokio::test]
    async fn test_mixed_failure_and_empty_is_empty_results() {
        let provider = Arc::new(ScriptedVenues::new(vec![
            Err(UpstreamError::rejected("venues", "HTTP 400")),
            Ok(vec![]),
            Err(UpstreamError::rejected("venues", "HTTP 400")),
        ]));
        let result = controller(provider, 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.exhaustion, Some(Exhaustion::EmptyResults));
    }

    #[tokio::test]
    async fn test_results_truncated_to_max_venues() {
        let venues = (0..8).map(|i| venue(&format!("v{i}"), f64::from(i) * 10.0)).collect();
        let provider = Arc::new(ScriptedVenues::new(vec![Ok(venues)]));
        let result = controller(provider, 5)
            .search(&coordinate(), &categories())
            .await;

        assert_eq!(result.venues.len(), 5);
        assert_eq!(result.venues[0].id, "v0");
    }

    #[test]
    fn test_default_tiers_are_valid() {
        let table = TierTable::new(default_tiers()).unwrap();
        assert_eq!(table, TierTable::default());
        assert_eq!(table.len(), 3);
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::final_not_relaxed(vec![SearchTier::filtered(1000)])]
    #[case::shrinking(vec![SearchTier::filtered(3000), SearchTier::relaxed(1000)])]
    #[case::relaxed_in_middle(vec![
        SearchTier::relaxed(1000),
        SearchTier::filtered(2000),
        SearchTier::relaxed(3000)
    ])]
    #[case::zero_radius(vec![SearchTier::relaxed(0)])]
    fn test_invalid_tier_tables(#[case] tiers: Vec<SearchTier>) {
        assert!(TierTable::new(tiers).is_err());
    }
}
