//! Restaurant search around a coordinate

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::models::{Coordinate, Venue};

pub mod hotpepper;

pub use hotpepper::HotPepperClient;

/// One search request against a venue provider
#[derive(Debug, Clone, PartialEq)]
pub struct VenueQuery {
    pub coordinate: Coordinate,
    pub radius_m: u32,
    /// Category filter; `None` accepts any restaurant
    pub keyword: Option<String>,
}

/// Source of restaurants near a coordinate
#[async_trait]
pub trait VenueSearchProvider: Send + Sync {
    /// Venues within `query.radius_m` matching the keyword, nearest first
    async fn search(&self, query: &VenueQuery) -> Result<Vec<Venue>, UpstreamError>;
}
