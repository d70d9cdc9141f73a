//! Test doubles for the provider and audit seams

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::audit::{AuditEntry, AuditSink};
use crate::error::UpstreamError;
use crate::models::{Coordinate, Venue, WeatherSnapshot};
use crate::venues::{VenueQuery, VenueSearchProvider};
use crate::weather::WeatherProvider;

pub fn venue(id: &str, distance_m: f64) -> Venue {
    Venue {
        id: id.to_string(),
        name: format!("Shop {id}"),
        address: "Tokyo".to_string(),
        genre: "Ramen".to_string(),
        distance_m,
    }
}

/// Replays canned outcomes in order, then answers with nothing
pub struct ScriptedVenues {
    script: Mutex<VecDeque<Result<Vec<Venue>, UpstreamError>>>,
    queries: Mutex<Vec<VenueQuery>>,
}

impl ScriptedVenues {
    pub fn new(script: Vec<Result<Vec<Venue>, UpstreamError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<VenueQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl VenueSearchProvider for ScriptedVenues {
    async fn search(&self, query: &VenueQuery) -> Result<Vec<Venue>, UpstreamError> {
        self.queries.lock().unwrap().push(query.clone());
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

/// Always answers with the same snapshot or error
pub struct FixedWeather {
    outcome: Result<WeatherSnapshot, UpstreamError>,
    calls: AtomicUsize,
}

impl FixedWeather {
    pub fn new(outcome: Result<WeatherSnapshot, UpstreamError>) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for FixedWeather {
    async fn current(&self, _coordinate: &Coordinate) -> Result<WeatherSnapshot, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Keeps entries in memory; optionally refuses every write
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    fail: bool,
}

impl MemoryAuditSink {
    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("audit store unavailable");
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
