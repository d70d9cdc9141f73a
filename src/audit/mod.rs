//! Request audit trail
//!
//! Every completed recommendation produces exactly one [`AuditEntry`]. Entries
//! are written after the response is final, on a detached task, so a slow or
//! broken store never delays or fails a request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Coordinate, TimeOfDayBucket, WeatherSnapshot};
use crate::search::{Exhaustion, RecommendationResult};

pub mod store;

pub use store::FjallAuditSink;

/// What the search settled on, without the venue payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub category_id: String,
    pub tier: usize,
    pub filter_relaxed: bool,
    pub exhaustion: Option<Exhaustion>,
    pub venue_count: usize,
}

impl From<&RecommendationResult> for ResultSummary {
    fn from(result: &RecommendationResult) -> Self {
        Self {
            category_id: result.category.id.clone(),
            tier: result.tier,
            filter_relaxed: result.filter_relaxed,
            exhaustion: result.exhaustion,
            venue_count: result.venues.len(),
        }
    }
}

/// Immutable record of one resolved request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub coordinate: Coordinate,
    pub weather: WeatherSnapshot,
    pub time_of_day: TimeOfDayBucket,
    pub result: ResultSummary,
}

/// Destination for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist `entry`. Called once per request; failures are not retried.
    async fn record(&self, entry: &AuditEntry) -> anyhow::Result<()>;
}

/// Write `entry` in the background. Failures are logged and dropped.
pub fn dispatch(sink: Arc<dyn AuditSink>, entry: AuditEntry) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = sink.record(&entry).await {
            warn!(request_id = %entry.request_id, "Failed to record audit entry: {e:#}");
        }
    })
}

/// Emits each entry as a structured log event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        info!(
            target: "otenki_meshi::audit",
            request_id = %entry.request_id,
            timestamp = %entry.timestamp.to_rfc3339(),
            lat = entry.coordinate.latitude(),
            lon = entry.coordinate.longitude(),
            condition = entry.weather.condition.as_str(),
            temperature_c = entry.weather.temperature_c,
            time_of_day = entry.time_of_day.as_str(),
            category = %entry.result.category_id,
            tier = entry.result.tier,
            filter_relaxed = entry.result.filter_relaxed,
            exhaustion = entry.result.exhaustion.map(|e| e.as_str()),
            venue_count = entry.result.venue_count,
            "recommendation served"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_entry() -> AuditEntry {
    use crate::models::WeatherCondition;

    AuditEntry {
        request_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        coordinate: Coordinate::new(35.690921, 139.700258).unwrap(),
        weather: WeatherSnapshot::new(WeatherCondition::Clear, 5.0),
        time_of_day: TimeOfDayBucket::Lunch,
        result: ResultSummary {
            category_id: "ramen".to_string(),
            tier: 0,
            filter_relaxed: false,
            exhaustion: None,
            venue_count: 3,
        },
    }
}
