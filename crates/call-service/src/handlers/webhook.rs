//! Bridge provider status webhook handler.

use crate::models::BridgeStatusWebhook;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{instrument, warn};

/// `POST /webhooks/bridge-status`
///
/// Receives status callbacks from the bridge provider. Always acknowledges
/// with 200: the provider retries on anything else and a retry cannot make a
/// stale or unknown callback more applicable. Failures are logged and the
/// reconciliation is dropped.
#[instrument(skip_all, name = "call.handlers.bridge_status_webhook")]
pub async fn bridge_status_webhook(
    State(state): State<Arc<AppState>>,
    axum::Json(webhook): axum::Json<BridgeStatusWebhook>,
) -> StatusCode {
    if let Err(e) = state.orchestrator.reconcile_bridge_status(&webhook).await {
        warn!(
            target: "call.handlers.webhook",
            error = %e,
            "Failed to reconcile bridge status, acknowledging anyway"
        );
    }
    StatusCode::OK
}
