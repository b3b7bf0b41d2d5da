//! Call record store.
//!
//! Source of truth for calls and per-resident participants. The store trait
//! exposes *conditional* state transitions rather than raw updates: the
//! "update only if status = ringing" semantics are the concurrency contract
//! that makes the first answer win and keeps status monotonic, so they live
//! here and not in the orchestrator.
//!
//! `PgCallStore` implements the contract in SQL; `MemoryCallStore` implements
//! it in-process for deterministic tests.

mod memory;
mod postgres;

pub use memory::MemoryCallStore;
pub use postgres::PgCallStore;

use crate::errors::CallError;
use crate::models::{CallContext, CallRow, ParticipantRow, ResolvedRecipient};
use chrono::{DateTime, Utc};
use common::types::{ApartmentId, BridgeSessionId, BuildingId, CallId, DoormanId, ResidentId};

/// Durable store for calls and participants.
#[async_trait::async_trait]
pub trait CallStore: Send + Sync {
    /// Resolve the eligible recipients of an apartment: residents with an
    /// active device address and notifications enabled, one address per
    /// resident (newest registration). Addresses are snapshotted into
    /// participant rows at call start and not re-resolved mid-call.
    async fn resolve_recipients(
        &self,
        apartment_id: ApartmentId,
    ) -> Result<Vec<ResolvedRecipient>, CallError>;

    /// Resolve the display context the push signal carries: the apartment
    /// label and the doorman's name. `None` when either id is unknown.
    async fn get_call_context(
        &self,
        apartment_id: ApartmentId,
        doorman_id: DoormanId,
    ) -> Result<Option<CallContext>, CallError>;

    /// Insert a call in `ringing` status together with one `invited`
    /// participant row per recipient.
    ///
    /// Fails with [`CallError::CallAlreadyActive`] when the apartment
    /// already has a ringing call (first writer wins).
    async fn create_call(
        &self,
        apartment_id: ApartmentId,
        doorman_id: DoormanId,
        building_id: BuildingId,
        channel_ref: &str,
        recipients: &[ResolvedRecipient],
    ) -> Result<CallRow, CallError>;

    /// Fetch a call by id.
    async fn get_call(&self, call_id: CallId) -> Result<Option<CallRow>, CallError>;

    /// Fetch a call by its provider bridge session.
    async fn get_call_by_bridge_session(
        &self,
        bridge_session_id: &BridgeSessionId,
    ) -> Result<Option<CallRow>, CallError>;

    /// Fetch all participants of a call.
    async fn get_participants(&self, call_id: CallId) -> Result<Vec<ParticipantRow>, CallError>;

    /// Claim the ringing → answered transition.
    ///
    /// Conditional update: only succeeds while the call is still `ringing`,
    /// so concurrent claims are serialized and exactly one wins. Returns the
    /// updated row for the winner and `None` for everyone else.
    async fn claim_answer(&self, call_id: CallId) -> Result<Option<CallRow>, CallError>;

    /// Persist the provider bridge session on a call.
    ///
    /// Set at most once: the update applies only while `bridge_session_id`
    /// is still null. Returns whether the write took effect.
    async fn set_bridge_session(
        &self,
        call_id: CallId,
        bridge_session_id: &BridgeSessionId,
    ) -> Result<bool, CallError>;

    /// Record the answering participant and fan in the rest: the responder
    /// becomes `answered`, every sibling still `invited` becomes `missed`.
    async fn record_participant_answer(
        &self,
        call_id: CallId,
        resident_id: ResidentId,
        answered_at: DateTime<Utc>,
    ) -> Result<(), CallError>;

    /// Transition a call to `ended`, recording `ended_at` and duration.
    ///
    /// Conditional update: applies only while the call is not yet `ended`,
    /// making hangup idempotent. Returns the updated row, or `None` when the
    /// call was already ended (no-op). Participant rows are left untouched:
    /// on a timeout nobody answered, so nobody becomes `missed`.
    async fn finish_call(
        &self,
        call_id: CallId,
        ended_at: DateTime<Utc>,
        duration_seconds: Option<i32>,
    ) -> Result<Option<CallRow>, CallError>;
}
