//! Prometheus metrics endpoint.

use crate::routes::AppState;
use axum::extract::State;
use std::sync::Arc;

/// `GET /metrics` - Prometheus exposition endpoint.
///
/// Renders the current metrics snapshot. Empty when no recorder was
/// installed (tests).
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
