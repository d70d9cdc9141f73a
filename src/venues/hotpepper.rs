//! HotPepper Gourmet search adapter

use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument};

use super::{VenueQuery, VenueSearchProvider};
use crate::config::VenuesConfig;
use crate::error::UpstreamError;
use crate::models::{Coordinate, Venue};

const PROVIDER: &str = "venues";
const API_KEY_ENV: &str = "HOTPEPPER_API_KEY";

/// Radius in meters for each `range` code the API accepts
const RANGE_METERS: [u32; 5] = [300, 500, 1000, 2000, 3000];

/// Sort by recommendation, as the API defines order 4
const ORDER_RECOMMENDED: u8 = 4;

/// Smallest `range` code whose radius covers `radius_m`, capped at the widest
#[must_use]
pub fn range_code(radius_m: u32) -> u8 {
    let index = RANGE_METERS
        .iter()
        .position(|&meters| meters >= radius_m)
        .unwrap_or(RANGE_METERS.len() - 1);
    (index + 1) as u8
}

/// Client for the HotPepper gourmet search endpoint
pub struct HotPepperClient {
    client: Client,
    base_url: String,
    api_key: String,
    page_size: u32,
}

impl HotPepperClient {
    pub fn new<B: Into<String>, K: Into<String>>(
        base_url: B,
        api_key: K,
        page_size: u32,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("otenki-meshi/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            page_size,
        })
    }

    /// Build from configuration, falling back to `HOTPEPPER_API_KEY`
    pub fn from_config(config: &VenuesConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("Missing venue API key (venues.api_key or {API_KEY_ENV})"))?;
        Self::new(config.base_url.as_str(), api_key, config.page_size)
    }

    fn url(&self, query: &VenueQuery) -> String {
        let mut url = format!(
            "{}/?key={}&lat={}&lng={}&range={}&order={}&count={}&format=json",
            self.base_url,
            urlencoding::encode(&self.api_key),
            query.coordinate.latitude(),
            query.coordinate.longitude(),
            range_code(query.radius_m),
            ORDER_RECOMMENDED,
            self.page_size
        );
        if let Some(keyword) = &query.keyword {
            url.push_str("&keyword=");
            url.push_str(&urlencoding::encode(keyword));
        }
        url
    }
}

#[async_trait]
impl VenueSearchProvider for HotPepperClient {
    #[instrument(name = "venue_search", level = "debug", skip(self))]
    async fn search(&self, query: &VenueQuery) -> Result<Vec<Venue>, UpstreamError> {
        let response = self
            .client
            .get(self.url(query))
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::from_status(PROVIDER, status));
        }

        let body: GourmetResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(PROVIDER, &e))?;

        let venues = body.results.into_venues(&query.coordinate, query.radius_m)?;
        debug!(
            "{} venues within {}m of {}",
            venues.len(),
            query.radius_m,
            query.coordinate.format_coordinates()
        );
        Ok(venues)
    }
}

#[derive(Debug, Deserialize)]
struct GourmetResponse {
    results: GourmetResults,
}

#[derive(Debug, Deserialize)]
struct GourmetResults {
    #[serde(default)]
    error: Vec<ApiError>,
    #[serde(default)]
    shop: Vec<Shop>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: u32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Shop {
    id: String,
    name: String,
    #[serde(default)]
    address: String,
    #[serde(deserialize_with = "number_or_string")]
    lat: f64,
    #[serde(deserialize_with = "number_or_string")]
    lng: f64,
    #[serde(default)]
    genre: Option<Genre>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

/// Coordinates have been served both as JSON numbers and as strings
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl GourmetResults {
    fn into_venues(self, origin: &Coordinate, radius_m: u32) -> Result<Vec<Venue>, UpstreamError> {
        if let Some(error) = self.error.first() {
            // 1000 is the API's own server error; everything else is a bad request or key
            return Err(if error.code == 1000 {
                UpstreamError::unavailable(PROVIDER, format!("{} ({})", error.message, error.code))
            } else {
                UpstreamError::rejected(PROVIDER, format!("{} ({})", error.message, error.code))
            });
        }

        let mut venues: Vec<Venue> = self
            .shop
            .into_iter()
            .filter_map(|shop| {
                let location = Coordinate::new(shop.lat, shop.lng).ok()?;
                let distance_m = origin.distance_meters(&location);
                (distance_m <= f64::from(radius_m)).then(|| Venue {
                    id: shop.id,
                    name: shop.name,
                    address: shop.address,
                    genre: shop.genre.map(|g| g.name).unwrap_or_default(),
                    distance_m,
                })
            })
            .collect();
        venues.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        Ok(venues)
    }
}
