//! Health and readiness handlers.
//!
//! `/health` is a pure liveness probe and never touches dependencies.
//! `/ready` pings the database when one is configured.

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// `GET /health` - liveness probe.
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// `GET /ready` - readiness probe.
///
/// Pings the database to verify connectivity. Returns 200 with the check
/// detail when ready, 503 otherwise. Deployments without a database pool
/// (in-memory store) are always ready.
#[instrument(skip_all, name = "call.health.ready")]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let Some(pool) = &state.pool else {
        return (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                database: None,
            }),
        );
    };

    let db_healthy = sqlx::query("SELECT 1").fetch_one(pool).await.is_ok();
    if db_healthy {
        (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                database: Some("healthy"),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                database: Some("unhealthy"),
            }),
        )
    }
}
