#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use otenki_meshi::api::AppState;
use otenki_meshi::audit::{AuditEntry, AuditSink};
use otenki_meshi::venues::{VenueQuery, VenueSearchProvider};
use otenki_meshi::weather::WeatherProvider;
use otenki_meshi::{
    Coordinate, FallbackSearchController, Orchestrator, PreferenceTable, RecommendationEngine,
    RetryPolicy, TierTable, UpstreamError, Venue, WeatherSnapshot,
};

pub struct StubWeather {
    pub outcome: Result<WeatherSnapshot, UpstreamError>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

#[async_trait]
impl WeatherProvider for StubWeather {
    async fn current(&self, _coordinate: &Coordinate) -> Result<WeatherSnapshot, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

/// Returns `venues` from the given tier onwards, nothing before it
pub struct StubVenues {
    pub hit_from_call: usize,
    pub venues: Vec<Venue>,
    pub queries: Mutex<Vec<VenueQuery>>,
}

#[async_trait]
impl VenueSearchProvider for StubVenues {
    async fn search(&self, query: &VenueQuery) -> Result<Vec<Venue>, UpstreamError> {
        let mut queries = self.queries.lock().unwrap();
        queries.push(query.clone());
        if queries.len() > self.hit_from_call {
            Ok(self.venues.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub entries: Mutex<Vec<AuditEntry>>,
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn record(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub weather: Arc<StubWeather>,
    pub venues: Arc<StubVenues>,
    pub sink: Arc<RecordingSink>,
}

impl TestApp {
    pub fn new(
        weather: Result<WeatherSnapshot, UpstreamError>,
        hit_from_call: usize,
        venues: Vec<Venue>,
        fallback_coordinate: Option<Coordinate>,
    ) -> Self {
        Self::build(weather, Duration::ZERO, hit_from_call, venues, fallback_coordinate)
    }

    /// Weather answers only after `delay`
    pub fn with_slow_weather(weather: Result<WeatherSnapshot, UpstreamError>, delay: Duration) -> Self {
        Self::build(weather, delay, 0, Vec::new(), None)
    }

    fn build(
        weather: Result<WeatherSnapshot, UpstreamError>,
        delay: Duration,
        hit_from_call: usize,
        venues: Vec<Venue>,
        fallback_coordinate: Option<Coordinate>,
    ) -> Self {
        let weather = Arc::new(StubWeather {
            outcome: weather,
            delay,
            calls: AtomicUsize::new(0),
        });
        let venues = Arc::new(StubVenues {
            hit_from_call,
            venues,
            queries: Mutex::new(Vec::new()),
        });
        let sink = Arc::new(RecordingSink::default());
        let retry = RetryPolicy {
            max_retries: 1,
            attempt_timeout: Duration::from_millis(200),
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

        Self {
            state: AppState {
                orchestrator: Arc::new(orchestrator),
                fallback_coordinate,
            },
            weather,
            venues,
            sink,
        }
    }

    pub fn weather_calls(&self) -> usize {
        self.weather.calls.load(Ordering::SeqCst)
    }

    pub fn venue_calls(&self) -> usize {
        self.venues.queries.lock().unwrap().len()
    }

    /// Audit writes run on a detached task; give it a chance to finish
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        for _ in 0..100 {
            if !self.sink.entries.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.sink.entries.lock().unwrap().clone()
    }
}

pub fn venue(id: &str, distance_m: f64) -> Venue {
    Venue {
        id: id.to_string(),
        name: format!("Shop {id}"),
        address: "Shinjuku, Tokyo".to_string(),
        genre: "Ramen".to_string(),
        distance_m,
    }
}
