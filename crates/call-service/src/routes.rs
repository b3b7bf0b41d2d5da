//! HTTP routes for the call service.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::orchestrator::CallOrchestrator;
use crate::store::CallStore;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Call record store.
    pub store: Arc<dyn CallStore>,

    /// Call lifecycle orchestrator.
    pub orchestrator: Arc<CallOrchestrator>,

    /// Database pool for readiness checks. None when running over the
    /// in-memory store.
    pub pool: Option<PgPool>,

    /// Prometheus handle for the metrics endpoint. None in tests.
    pub metrics_handle: Option<PrometheusHandle>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/api/v1/calls` - call lifecycle API
/// - `/webhooks/bridge-status` - provider status callbacks
/// - `/health`, `/ready`, `/metrics` - operational endpoints
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/v1/calls", post(handlers::start_call))
        .route("/api/v1/calls/:call_id", get(handlers::get_call))
        .route("/api/v1/calls/:call_id/answer", post(handlers::answer_call))
        .route("/api/v1/calls/:call_id/hangup", post(handlers::hangup_call))
        .route(
            "/webhooks/bridge-status",
            post(handlers::bridge_status_webhook),
        )
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    api_routes
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
