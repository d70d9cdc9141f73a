//! HTTP handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::models::Coordinate;
use crate::orchestrator::Orchestrator;
use crate::response::RecommendationResponse;
use crate::{OtenkiError, VERSION};

/// Shared, read-only request context
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Stand-in position for requests that send no coordinate
    pub fallback_coordinate: Option<Coordinate>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    lat: Option<String>,
    #[serde(alias = "lng")]
    lon: Option<String>,
}

impl RecommendationQuery {
    fn coordinate(&self, fallback: Option<Coordinate>) -> crate::Result<Coordinate> {
        match (self.lat.as_deref(), self.lon.as_deref()) {
            (Some(lat), Some(lon)) => Coordinate::parse(lat, lon),
            (None, None) => fallback.ok_or_else(|| {
                OtenkiError::validation("lat and lon query parameters are required")
            }),
            (Some(_), None) => Err(OtenkiError::validation("lon query parameter is required")),
            (None, Some(_)) => Err(OtenkiError::validation("lat query parameter is required")),
        }
    }
}

/// Error body: `{ "error": <code>, "message": <text> }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

pub struct ApiError(OtenkiError);

impl From<OtenkiError> for ApiError {
    fn from(error: OtenkiError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OtenkiError::Validation { .. } => StatusCode::BAD_REQUEST,
            OtenkiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            OtenkiError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            OtenkiError::Config { .. } => {
                error!("Internal error: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            error: self.0.code().to_string(),
            message: self.0.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/recommendation", get(get_recommendation))
        .route("/health", get(health))
        .with_state(state)
}

async fn get_recommendation(
    State(state): State<AppState>,
    query: Result<Query<RecommendationQuery>, QueryRejection>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let Query(query) = query.map_err(|e| OtenkiError::validation(e.body_text()))?;
    let coordinate = query
        .coordinate(state.fallback_coordinate)
        .inspect_err(|e| debug!("Rejected request: {e}"))?;

    let response = state.orchestrator.handle(coordinate, Utc::now()).await?;
    Ok(Json(response))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": VERSION }))
}
