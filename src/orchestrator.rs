//! Per-request control flow
//!
//! weather -> engine -> fallback search -> response, then the audit entry is
//! handed off to a background task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::Result;
use crate::audit::{self, AuditEntry, AuditSink, ResultSummary};
use crate::models::{Coordinate, TimeOfDayBucket};
use crate::recommendation::RecommendationEngine;
use crate::response::{RecommendationResponse, ResponseAssembler};
use crate::retry::RetryPolicy;
use crate::search::{FallbackSearchController, RecommendationResult};
use crate::weather::WeatherProvider;

/// Everything produced for one request
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub response: RecommendationResponse,
    pub audit: AuditEntry,
    pub result: RecommendationResult,
}

pub struct Orchestrator {
    weather: Arc<dyn WeatherProvider>,
    engine: RecommendationEngine,
    search: FallbackSearchController,
    retry: RetryPolicy,
    audit: Arc<dyn AuditSink>,
    timezone: Tz,
}

impl Orchestrator {
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        engine: RecommendationEngine,
        search: FallbackSearchController,
        retry: RetryPolicy,
        audit: Arc<dyn AuditSink>,
        timezone: Tz,
    ) -> Self {
        Self {
            weather,
            engine,
            search,
            retry,
            audit,
            timezone,
        }
    }

    /// Resolve a recommendation without recording it.
    ///
    /// A weather failure is fatal: no venue search is attempted.
    #[instrument(name = "recommend", skip(self, coordinate), fields(coordinate = %coordinate.format_coordinates()))]
    pub async fn recommend(&self, coordinate: Coordinate, now: DateTime<Utc>) -> Result<Recommendation> {
        let weather = self
            .retry
            .run("weather", || self.weather.current(&coordinate))
            .await
            .inspect_err(|e| warn!("Weather lookup failed: {e}"))?;

        let bucket = TimeOfDayBucket::at(now, self.timezone);
        let categories = self.engine.recommend(&weather, bucket);
        let result = self.search.search(&coordinate, &categories).await;

        let request_id = Uuid::new_v4();
        let response = ResponseAssembler::assemble(request_id, &weather, bucket, &result);
        info!(
            %request_id,
            "{} {} at {}: '{}' from tier {} ({} venues)",
            weather.condition.as_str(),
            weather.format_temperature(),
            bucket.as_str(),
            result.category.id,
            result.tier,
            result.venues.len()
        );

        let audit = AuditEntry {
            request_id,
            timestamp: now,
            coordinate,
            weather,
            time_of_day: bucket,
            result: ResultSummary::from(&result),
        };

        Ok(Recommendation {
            response,
            audit,
            result,
        })
    }

    /// Resolve a recommendation and record it in the background
    pub async fn handle(
        &self,
        coordinate: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<RecommendationResponse> {
        let recommendation = self.recommend(coordinate, now).await?;
        audit::dispatch(self.audit.clone(), recommendation.audit);
        Ok(recommendation.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OtenkiError;
    use crate::error::UpstreamError;
    use crate::models::{WeatherCondition, WeatherSnapshot};
    use crate::recommendation::PreferenceTable;
    use crate::search::{Exhaustion, TierTable};
    use crate::testing::{FixedWeather, MemoryAuditSink, ScriptedVenues, venue};
    use chrono::TimeZone;
    use std::time::Duration;

    struct Harness {
        orchestrator: Orchestrator,
        weather: Arc<FixedWeather>,
        venues: Arc<ScriptedVenues>,
        sink: Arc<MemoryAuditSink>,
    }

    fn harness(
        weather: std::result::Result<WeatherSnapshot, UpstreamError>,
        script: Vec<std::result::Result<Vec<crate::models::Venue>, UpstreamError>>,
    ) -> Harness {
        let weather = Arc::new(FixedWeather::new(weather));
        let venues = Arc::new(ScriptedVenues::new(script));
        let sink = Arc::new(MemoryAuditSink::default());
        let retry = RetryPolicy {
            max_retries: 1,
            attempt_timeout: Duration::from_millis(50),
            backoff: Duration::ZERO,
        };
        let engine = RecommendationEngine::new(Arc::new(PreferenceTable::builtin().unwrap()));
        let search = FallbackSearchController::new(
            venues.clone(),
            Arc::new(TierTable::default()),
            retry,
            engine.generic_category().clone(),
            5,
        );
        let orchestrator = Orchestrator::new(
            weather.clone(),
            engine,
            search,
            retry,
            sink.clone(),
            chrono_tz::Asia::Tokyo,
        );
        Harness {
            orchestrator,
            weather,
            venues,
            sink,
        }
    }

    fn shinjuku() -> Coordinate {
        Coordinate::new(35.690921, 139.700258).unwrap()
    }

    /// 12:30 in Tokyo
    fn lunchtime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 3, 30, 0).unwrap()
    }

    /// 19:00 in Tokyo
    fn dinnertime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap()
    }

    async fn wait_for_audit(sink: &MemoryAuditSink) -> Vec<AuditEntry> {
        for _ in 0..100 {
            let entries = sink.entries();
            if !entries.is_empty() {
                return entries;
            }
            tokio::task::yield_now().await;
        }
        sink.entries()
    }

    #[tokio::test]
    async fn test_cold_clear_lunch_finds_ramen_nearby() {
        let h = harness(
            Ok(WeatherSnapshot::new(WeatherCondition::Clear, 5.0)),
            vec![Ok(vec![venue("r1", 240.0), venue("r2", 610.0)])],
        );

        let rec = h.orchestrator.recommend(shinjuku(), lunchtime()).await.unwrap();

        assert_eq!(rec.response.category.id, "ramen");
        assert_eq!(rec.response.tier, 0);
        assert_eq!(rec.response.time_of_day, TimeOfDayBucket::Lunch);
        assert_eq!(rec.response.venues.len(), 2);
        assert_eq!(rec.audit.request_id, rec.response.request_id);
        assert_eq!(rec.audit.result.category_id, "ramen");
        assert_eq!(h.venues.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_hot_clear_dinner_escalates_to_second_tier() {
        let h = harness(
            Ok(WeatherSnapshot::new(WeatherCondition::Clear, 30.0)),
            vec![Ok(vec![]), Ok(vec![venue("n1", 2200.0)])],
        );

        let rec = h.orchestrator.recommend(shinjuku(), dinnertime()).await.unwrap();

        assert_eq!(rec.response.category.id, "cold_noodles");
        assert_eq!(rec.response.tier, 1);
        assert_eq!(rec.response.search_radius_m, 3000);
        assert!(!rec.response.filter_relaxed);
    }

    #[tokio::test]
    async fn test_rural_search_exhausts_with_one_audit_entry() {
        let h = harness(Ok(WeatherSnapshot::new(WeatherCondition::Cloudy, 18.0)), vec![]);

        let response = h.orchestrator.handle(shinjuku(), lunchtime()).await.unwrap();

        assert!(response.exhausted);
        assert_eq!(response.exhaustion, Some(Exhaustion::EmptyResults));
        assert_eq!(response.tier, 2);
        assert_eq!(response.category.id, "local");
        assert!(response.venues.is_empty());
        assert!(!response.alternates.is_empty());

        let entries = wait_for_audit(&h.sink).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request_id, response.request_id);
        assert_eq!(entries[0].result.exhaustion, Some(Exhaustion::EmptyResults));
    }

    #[tokio::test]
    async fn test_weather_failure_is_fatal_without_venue_calls() {
        let h = harness(
            Err(UpstreamError::unavailable("weather", "HTTP 503")),
            vec![Ok(vec![venue("r1", 100.0)])],
        );

        let err = h.orchestrator.handle(shinjuku(), lunchtime()).await.unwrap_err();

        assert!(matches!(err, OtenkiError::Upstream { .. }));
        // Transient failure is retried exactly once
        assert_eq!(h.weather.calls(), 2);
        assert!(h.venues.queries().is_empty());
        tokio::task::yield_now().await;
        assert!(h.sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_weather_is_not_retried() {
        let h = harness(Err(UpstreamError::rejected("weather", "HTTP 401")), vec![]);

        assert!(h.orchestrator.recommend(shinjuku(), lunchtime()).await.is_err());
        assert_eq!(h.weather.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_weather_uses_neutral_category() {
        let h = harness(
            Ok(WeatherSnapshot::new(WeatherCondition::Unknown, 15.0)),
            vec![Ok(vec![venue("c1", 90.0)])],
        );

        let rec = h.orchestrator.recommend(shinjuku(), lunchtime()).await.unwrap();

        assert_eq!(rec.response.category.id, "cafe");
        assert_eq!(h.venues.queries()[0].keyword.as_deref(), Some("カフェ"));
    }
}
