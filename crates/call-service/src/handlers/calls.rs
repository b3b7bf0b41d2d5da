//! Call lifecycle handlers.
//!
//! Thin HTTP adapters over the orchestrator: extract, delegate, map the
//! result. All state rules live in the orchestrator and the store.

use crate::errors::CallError;
use crate::models::{AnswerCallRequest, CallStatusResponse, StartCallRequest, StartCallResponse};
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use common::types::CallId;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// `POST /api/v1/calls`
///
/// Start a call to an apartment. Returns 201 with the ringing call, 409 when
/// the apartment already has one, 422 when nobody can be reached.
#[instrument(skip_all, name = "call.handlers.start_call")]
pub async fn start_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartCallRequest>,
) -> Result<(StatusCode, Json<StartCallResponse>), CallError> {
    let response = state.orchestrator.start_call(&request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /api/v1/calls/{call_id}/answer`
///
/// Claim the answer for a resident. First answer wins; losers get 409.
#[instrument(skip_all, name = "call.handlers.answer_call", fields(call_id = %call_id))]
pub async fn answer_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<Uuid>,
    Json(request): Json<AnswerCallRequest>,
) -> Result<Json<CallStatusResponse>, CallError> {
    let response = state
        .orchestrator
        .answer_call(CallId(call_id), &request)
        .await?;
    Ok(Json(response))
}

/// `POST /api/v1/calls/{call_id}/hangup`
///
/// End a call. Idempotent: hanging up an ended call is a 200 no-op.
#[instrument(skip_all, name = "call.handlers.hangup_call", fields(call_id = %call_id))]
pub async fn hangup_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<Uuid>,
) -> Result<Json<CallStatusResponse>, CallError> {
    let response = state.orchestrator.hangup_call(CallId(call_id)).await?;
    Ok(Json(response))
}

/// `GET /api/v1/calls/{call_id}`
///
/// Current call state with participants. Clients poll this to detect a
/// remote hangup.
#[instrument(skip_all, name = "call.handlers.get_call", fields(call_id = %call_id))]
pub async fn get_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<Uuid>,
) -> Result<Json<CallStatusResponse>, CallError> {
    let response = state.orchestrator.call_status(CallId(call_id)).await?;
    Ok(Json(response))
}
