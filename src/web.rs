use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::error_handling::HandleErrorLayer;
use axum::http::{Method, header};
use axum::{BoxError, Router};
use tower::ServiceBuilder;
use tower::timeout::error::Elapsed;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::OtenkiError;
use crate::api::{self, ApiError, AppState};
use crate::audit::{AuditSink, FjallAuditSink, TracingAuditSink};
use crate::config::OtenkiConfig;
use crate::orchestrator::Orchestrator;
use crate::recommendation::{PreferenceTable, RecommendationEngine};
use crate::search::FallbackSearchController;
use crate::venues::HotPepperClient;
use crate::weather::OpenWeatherClient;

/// Router with the cross-cutting layers every deployment uses
pub fn app(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    api::router(state)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(move |error: BoxError| async move {
                    budget_error(&error, request_timeout)
                }))
                .timeout(request_timeout),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Map a middleware failure to the JSON error body; an elapsed budget is a 408
fn budget_error(error: &BoxError, budget: Duration) -> ApiError {
    if error.is::<Elapsed>() {
        let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        warn!("Request exceeded its {budget_ms}ms budget");
        OtenkiError::Timeout { budget_ms }.into()
    } else {
        OtenkiError::config(format!("Unhandled middleware error: {error}")).into()
    }
}

/// Wire the production providers and sinks from configuration
pub fn build_state(config: &OtenkiConfig) -> Result<AppState> {
    let table = PreferenceTable::load(config.recommendation.table_path.as_deref())?;
    info!(
        "Preference table v{} with {} categories",
        table.version,
        table.categories.len()
    );
    let engine = RecommendationEngine::new(Arc::new(table));
    let retry = config.retry_policy();

    let weather = Arc::new(OpenWeatherClient::from_config(&config.weather)?);
    let venues = Arc::new(HotPepperClient::from_config(&config.venues)?);
    let search = FallbackSearchController::new(
        venues,
        Arc::new(config.tier_table()?),
        retry,
        engine.generic_category().clone(),
        config.venues.max_venues,
    );

    let audit: Arc<dyn AuditSink> = if config.audit.enabled {
        std::fs::create_dir_all(&config.audit.path).with_context(|| {
            format!("Failed to create audit directory: {}", config.audit.path.display())
        })?;
        info!("Recording audit entries in {}", config.audit.path.display());
        Arc::new(FjallAuditSink::open(&config.audit.path)?)
    } else {
        Arc::new(TracingAuditSink)
    };

    let orchestrator = Orchestrator::new(
        weather,
        engine,
        search,
        retry,
        audit,
        config.timezone()?,
    );

    Ok(AppState {
        orchestrator: Arc::new(orchestrator),
        fallback_coordinate: config.recommendation.fallback_coordinate,
    })
}

pub async fn run(config: OtenkiConfig) -> Result<()> {
    let state = build_state(&config)?;
    let app = app(state, config.request_timeout());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Web server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
