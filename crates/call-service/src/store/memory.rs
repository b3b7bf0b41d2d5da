//! In-memory call record store.
//!
//! Implements the same conditional-transition contract as the Postgres store
//! behind a single mutex, which gives tests the exact serialization the SQL
//! `UPDATE ... WHERE status = ...` statements provide in production.

use crate::errors::CallError;
use crate::models::{CallContext, CallRow, ParticipantRow, ResolvedRecipient};
use crate::store::CallStore;
use chrono::{DateTime, Utc};
use common::types::{
    ApartmentId, BridgeSessionId, BuildingId, CallId, CallStatus, DoormanId, ParticipantStatus,
    ResidentId,
};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    calls: HashMap<CallId, CallRow>,
    participants: HashMap<CallId, Vec<ParticipantRow>>,
    recipients: HashMap<ApartmentId, Vec<ResolvedRecipient>>,
    apartment_labels: HashMap<ApartmentId, String>,
    doorman_names: HashMap<DoormanId, String>,
}

/// In-memory store for tests and local development.
#[derive(Default)]
pub struct MemoryCallStore {
    inner: Mutex<Inner>,
}

impl MemoryCallStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolvable recipient for an apartment (test fixture).
    pub fn add_recipient(
        &self,
        apartment_id: ApartmentId,
        resident_id: ResidentId,
        device_address: impl Into<String>,
    ) {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .recipients
                .entry(apartment_id)
                .or_default()
                .push(ResolvedRecipient {
                    resident_id,
                    device_address: device_address.into(),
                });
        }
    }

    /// Register the display context for an apartment and doorman (test fixture).
    pub fn add_call_context(
        &self,
        apartment_id: ApartmentId,
        apartment_label: impl Into<String>,
        doorman_id: DoormanId,
        doorman_name: impl Into<String>,
    ) {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .apartment_labels
                .insert(apartment_id, apartment_label.into());
            inner.doorman_names.insert(doorman_id, doorman_name.into());
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, CallError> {
        self.inner
            .lock()
            .map_err(|_| CallError::Database("store mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl CallStore for MemoryCallStore {
    async fn resolve_recipients(
        &self,
        apartment_id: ApartmentId,
    ) -> Result<Vec<ResolvedRecipient>, CallError> {
        let inner = self.lock()?;
        Ok(inner
            .recipients
            .get(&apartment_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_call_context(
        &self,
        apartment_id: ApartmentId,
        doorman_id: DoormanId,
    ) -> Result<Option<CallContext>, CallError> {
        let inner = self.lock()?;
        // Fixture data is optional; fall back to generic labels so tests that
        // only care about lifecycle state need no context setup.
        let apartment_label = inner
            .apartment_labels
            .get(&apartment_id)
            .cloned()
            .unwrap_or_else(|| "Apartment".to_string());
        let doorman_name = inner
            .doorman_names
            .get(&doorman_id)
            .cloned()
            .unwrap_or_else(|| "Doorman".to_string());
        Ok(Some(CallContext {
            apartment_label,
            doorman_name,
        }))
    }

    async fn create_call(
        &self,
        apartment_id: ApartmentId,
        doorman_id: DoormanId,
        building_id: BuildingId,
        channel_ref: &str,
        recipients: &[ResolvedRecipient],
    ) -> Result<CallRow, CallError> {
        let mut inner = self.lock()?;

        // Same rule the partial unique index enforces in Postgres.
        let apartment_busy = inner
            .calls
            .values()
            .any(|c| c.apartment_id == apartment_id && c.status == CallStatus::Ringing);
        if apartment_busy {
            return Err(CallError::CallAlreadyActive);
        }

        let call = CallRow {
            call_id: CallId::new(),
            apartment_id,
            doorman_id,
            building_id,
            status: CallStatus::Ringing,
            bridge_session_id: None,
            channel_ref: channel_ref.to_string(),
            started_at: Utc::now(),
            answered_at: None,
            ended_at: None,
            duration_seconds: None,
        };

        let participants = recipients
            .iter()
            .map(|r| ParticipantRow {
                call_id: call.call_id,
                resident_id: r.resident_id,
                status: ParticipantStatus::Invited,
                device_address: r.device_address.clone(),
                answered_at: None,
            })
            .collect();

        inner.participants.insert(call.call_id, participants);
        inner.calls.insert(call.call_id, call.clone());
        Ok(call)
    }

    async fn get_call(&self, call_id: CallId) -> Result<Option<CallRow>, CallError> {
        let inner = self.lock()?;
        Ok(inner.calls.get(&call_id).cloned())
    }

    async fn get_call_by_bridge_session(
        &self,
        bridge_session_id: &BridgeSessionId,
    ) -> Result<Option<CallRow>, CallError> {
        let inner = self.lock()?;
        Ok(inner
            .calls
            .values()
            .find(|c| c.bridge_session_id.as_ref() == Some(bridge_session_id))
            .cloned())
    }

    async fn get_participants(&self, call_id: CallId) -> Result<Vec<ParticipantRow>, CallError> {
        let inner = self.lock()?;
        Ok(inner.participants.get(&call_id).cloned().unwrap_or_default())
    }

    async fn claim_answer(&self, call_id: CallId) -> Result<Option<CallRow>, CallError> {
        let mut inner = self.lock()?;
        match inner.calls.get_mut(&call_id) {
            Some(call) if call.status == CallStatus::Ringing => {
                call.status = CallStatus::Answered;
                call.answered_at = Some(Utc::now());
                Ok(Some(call.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_bridge_session(
        &self,
        call_id: CallId,
        bridge_session_id: &BridgeSessionId,
    ) -> Result<bool, CallError> {
        let mut inner = self.lock()?;
        match inner.calls.get_mut(&call_id) {
            Some(call) if call.bridge_session_id.is_none() => {
                call.bridge_session_id = Some(bridge_session_id.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_participant_answer(
        &self,
        call_id: CallId,
        resident_id: ResidentId,
        answered_at: DateTime<Utc>,
    ) -> Result<(), CallError> {
        let mut inner = self.lock()?;
        if let Some(participants) = inner.participants.get_mut(&call_id) {
            for participant in participants.iter_mut() {
                if participant.resident_id == resident_id {
                    participant.status = ParticipantStatus::Answered;
                    participant.answered_at = Some(answered_at);
                } else if participant.status == ParticipantStatus::Invited {
                    participant.status = ParticipantStatus::Missed;
                }
            }
        }
        Ok(())
    }

    async fn finish_call(
        &self,
        call_id: CallId,
        ended_at: DateTime<Utc>,
        duration_seconds: Option<i32>,
    ) -> Result<Option<CallRow>, CallError> {
        let mut inner = self.lock()?;
        match inner.calls.get_mut(&call_id) {
            Some(call) if call.status != CallStatus::Ended => {
                call.status = CallStatus::Ended;
                call.ended_at = Some(ended_at);
                call.duration_seconds = duration_seconds
                    .or_else(|| i32::try_from((ended_at - call.started_at).num_seconds()).ok());
                Ok(Some(call.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ids() -> (ApartmentId, DoormanId, BuildingId) {
        (
            ApartmentId(Uuid::new_v4()),
            DoormanId(Uuid::new_v4()),
            BuildingId(Uuid::new_v4()),
        )
    }

    fn recipient() -> ResolvedRecipient {
        ResolvedRecipient {
            resident_id: ResidentId(Uuid::new_v4()),
            device_address: "ExponentPushToken[test]".to_string(),
        }
    }

    #[tokio::test]
    async fn test_second_ringing_call_for_apartment_rejected() {
        let store = MemoryCallStore::new();
        let (apartment, doorman, building) = ids();
        let recipients = vec![recipient()];

        store
            .create_call(apartment, doorman, building, "call-1", &recipients)
            .await
            .unwrap();

        let result = store
            .create_call(apartment, doorman, building, "call-2", &recipients)
            .await;
        assert!(matches!(result, Err(CallError::CallAlreadyActive)));
    }

    #[tokio::test]
    async fn test_new_call_allowed_after_previous_ended() {
        let store = MemoryCallStore::new();
        let (apartment, doorman, building) = ids();
        let recipients = vec![recipient()];

        let call = store
            .create_call(apartment, doorman, building, "call-1", &recipients)
            .await
            .unwrap();
        store
            .finish_call(call.call_id, Utc::now(), None)
            .await
            .unwrap();

        let second = store
            .create_call(apartment, doorman, building, "call-2", &recipients)
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_claim_answer_only_succeeds_once() {
        let store = MemoryCallStore::new();
        let (apartment, doorman, building) = ids();
        let call = store
            .create_call(apartment, doorman, building, "call-1", &[recipient()])
            .await
            .unwrap();

        let first = store.claim_answer(call.call_id).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().status, CallStatus::Answered);

        let second = store.claim_answer(call.call_id).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_bridge_session_set_at_most_once() {
        let store = MemoryCallStore::new();
        let (apartment, doorman, building) = ids();
        let call = store
            .create_call(apartment, doorman, building, "call-1", &[recipient()])
            .await
            .unwrap();

        let first = BridgeSessionId("BS-1".to_string());
        let second = BridgeSessionId("BS-2".to_string());
        assert!(store
            .set_bridge_session(call.call_id, &first)
            .await
            .unwrap());
        assert!(!store
            .set_bridge_session(call.call_id, &second)
            .await
            .unwrap());

        let stored = store.get_call(call.call_id).await.unwrap().unwrap();
        assert_eq!(stored.bridge_session_id, Some(first));
    }

    #[tokio::test]
    async fn test_finish_call_is_idempotent() {
        let store = MemoryCallStore::new();
        let (apartment, doorman, building) = ids();
        let call = store
            .create_call(apartment, doorman, building, "call-1", &[recipient()])
            .await
            .unwrap();

        let first = store
            .finish_call(call.call_id, Utc::now(), Some(12))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .finish_call(call.call_id, Utc::now(), Some(99))
            .await
            .unwrap();
        assert!(second.is_none());

        let stored = store.get_call(call.call_id).await.unwrap().unwrap();
        assert_eq!(stored.duration_seconds, Some(12));
    }

    #[tokio::test]
    async fn test_answer_fanin_marks_siblings_missed() {
        let store = MemoryCallStore::new();
        let (apartment, doorman, building) = ids();
        let winner = recipient();
        let loser = recipient();
        let call = store
            .create_call(
                apartment,
                doorman,
                building,
                "call-1",
                &[winner.clone(), loser.clone()],
            )
            .await
            .unwrap();

        store
            .record_participant_answer(call.call_id, winner.resident_id, Utc::now())
            .await
            .unwrap();

        let participants = store.get_participants(call.call_id).await.unwrap();
        let by_id = |id| {
            participants
                .iter()
                .find(|p| p.resident_id == id)
                .unwrap()
                .status
        };
        assert_eq!(by_id(winner.resident_id), ParticipantStatus::Answered);
        assert_eq!(by_id(loser.resident_id), ParticipantStatus::Missed);
    }
}
