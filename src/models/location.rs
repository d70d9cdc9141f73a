//! Coordinate model for the requesting user's position

use serde::{Deserialize, Serialize};

use crate::{OtenkiError, Result};

/// Validated geographic coordinate
///
/// Fields are private so every value in the system has passed range checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CoordinateRecord", into = "CoordinateRecord")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize, Deserialize)]
struct CoordinateRecord {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting non-finite or out-of-range values
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(OtenkiError::validation(format!(
                "Latitude must be between -90 and 90, got: {latitude}"
            )));
        }

        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(OtenkiError::validation(format!(
                "Longitude must be between -180 and 180, got: {longitude}"
            )));
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parse raw query-string values
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self> {
        let lat = latitude
            .trim()
            .parse::<f64>()
            .map_err(|_| OtenkiError::validation(format!("Invalid latitude: {latitude}")))?;
        let lon = longitude
            .trim()
            .parse::<f64>()
            .map_err(|_| OtenkiError::validation(format!("Invalid longitude: {longitude}")))?;
        Self::new(lat, lon)
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Great-circle distance in meters
    #[must_use]
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        haversine::distance(
            haversine::Location {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            haversine::Location {
                latitude: other.latitude,
                longitude: other.longitude,
            },
            haversine::Units::Kilometers,
        ) * 1000.0
    }
}

impl TryFrom<CoordinateRecord> for Coordinate {
    type Error = OtenkiError;

    fn try_from(record: CoordinateRecord) -> Result<Self> {
        Self::new(record.latitude, record.longitude)
    }
}

impl From<Coordinate> for CoordinateRecord {
    fn from(coordinate: Coordinate) -> Self {
        Self {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
        }
    }
}
