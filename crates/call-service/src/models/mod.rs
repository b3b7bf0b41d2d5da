//! Call service models.
//!
//! Contains data types used across the call service: database rows,
//! resolver output, and API request/response types.

use chrono::{DateTime, Utc};
use common::types::{
    ApartmentId, BridgeSessionId, BuildingId, CallId, CallStatus, DoormanId, ParticipantStatus,
    ResidentId,
};
use serde::{Deserialize, Serialize};

/// Call database row.
///
/// Source of truth for a call's lifecycle state.
#[derive(Debug, Clone)]
pub struct CallRow {
    /// Unique call identifier.
    pub call_id: CallId,

    /// Apartment being called.
    pub apartment_id: ApartmentId,

    /// Doorman who initiated the call.
    pub doorman_id: DoormanId,

    /// Building the apartment belongs to.
    pub building_id: BuildingId,

    /// Lifecycle status. Monotonic; see [`CallStatus`].
    pub status: CallStatus,

    /// Provider bridge session, set at most once on ringing → answered.
    pub bridge_session_id: Option<BridgeSessionId>,

    /// Voice channel reference carried in the push signal.
    pub channel_ref: String,

    /// When the call was created.
    pub started_at: DateTime<Utc>,

    /// When a resident answered (None until answered).
    pub answered_at: Option<DateTime<Utc>>,

    /// When the call ended (None until ended).
    pub ended_at: Option<DateTime<Utc>>,

    /// Total duration in seconds, set when the call ends.
    pub duration_seconds: Option<i32>,
}

/// Call participant database row.
///
/// One row per (call, resident) pair; at most one reaches `answered`.
#[derive(Debug, Clone)]
pub struct ParticipantRow {
    /// Owning call.
    pub call_id: CallId,

    /// Resident this invitation targets.
    pub resident_id: ResidentId,

    /// Invitation/response status.
    pub status: ParticipantStatus,

    /// Push address snapshot taken at call start. Not re-resolved mid-call.
    pub device_address: String,

    /// When this resident answered (None unless status is answered).
    pub answered_at: Option<DateTime<Utc>>,
}

/// Display context resolved at call start for the push signal.
///
/// The signal carries human-readable names so a cold device process can show
/// the incoming-call UI without a server round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Human-readable apartment label (e.g. "302", "Bloco B 101").
    pub apartment_label: String,

    /// Display name of the initiating doorman.
    pub doorman_name: String,
}

/// A recipient resolved for an apartment at call start.
///
/// Produced by the participant resolver from residents with an active device
/// address and notifications enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecipient {
    /// Resident profile identifier.
    pub resident_id: ResidentId,

    /// Device push address for signal delivery.
    pub device_address: String,
}

// ============================================================================
// Call API Models
// ============================================================================

/// Request body for POST /api/v1/calls.
#[derive(Debug, Clone, Deserialize)]
pub struct StartCallRequest {
    /// Apartment to ring.
    pub apartment_id: ApartmentId,

    /// Initiating doorman.
    pub doorman_id: DoormanId,

    /// Building context.
    pub building_id: BuildingId,
}

/// Response body for POST /api/v1/calls.
#[derive(Debug, Clone, Serialize)]
pub struct StartCallResponse {
    /// Identifier of the created call.
    pub call_id: CallId,

    /// Always `ringing` on creation.
    pub status: CallStatus,

    /// Residents the signal is fanning out to.
    pub participants: Vec<ParticipantResponse>,
}

/// Request body for POST /api/v1/calls/{id}/answer.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerCallRequest {
    /// Resident claiming the answer.
    pub resident_id: ResidentId,
}

/// Participant as exposed through the API.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantResponse {
    pub resident_id: ResidentId,
    pub status: ParticipantStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
}

impl From<&ParticipantRow> for ParticipantResponse {
    fn from(row: &ParticipantRow) -> Self {
        // Device addresses are sensitive and never leave the service.
        Self {
            resident_id: row.resident_id,
            status: row.status,
            answered_at: row.answered_at,
        }
    }
}

/// Response body for GET /api/v1/calls/{id}.
#[derive(Debug, Clone, Serialize)]
pub struct CallStatusResponse {
    pub call_id: CallId,
    pub apartment_id: ApartmentId,
    pub building_id: BuildingId,
    pub status: CallStatus,
    pub channel_ref: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i32>,
    pub participants: Vec<ParticipantResponse>,
}

impl CallStatusResponse {
    /// Build the API view of a call and its participants.
    pub fn from_rows(call: &CallRow, participants: &[ParticipantRow]) -> Self {
        Self {
            call_id: call.call_id,
            apartment_id: call.apartment_id,
            building_id: call.building_id,
            status: call.status,
            channel_ref: call.channel_ref.clone(),
            started_at: call.started_at,
            answered_at: call.answered_at,
            ended_at: call.ended_at,
            duration_seconds: call.duration_seconds,
            participants: participants.iter().map(ParticipantResponse::from).collect(),
        }
    }
}

/// Webhook body from the bridge provider's status callback.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeStatusWebhook {
    /// Provider bridge session this update refers to.
    pub bridge_session_id: BridgeSessionId,

    /// Provider status vocabulary (initiated, ringing, answered,
    /// in-progress, completed, busy, no-answer, failed).
    pub status: String,

    /// Call duration in seconds, present on terminal statuses.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<i32>,
}

/// Readiness check response.
///
/// Returned by the `/ready` endpoint (readiness probe).
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// Service readiness status ("ready" or "not_ready").
    pub status: &'static str,

    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
}
