//! Call orchestrator.
//!
//! Owns the call lifecycle: creates the record, fans the signal out through
//! the ring notifier, claims the answer transition, requests the voice bridge,
//! and reconciles provider status callbacks. All state transitions go through
//! the store's conditional updates, so concurrent answers, hangups, timeouts
//! and webhooks serialize on the database row and status only ever moves
//! forward.
//!
//! Bridge provider failures are non-fatal to signaling state: an answered
//! call stays answered even when the voice path could not be set up.

use crate::errors::CallError;
use crate::models::{
    AnswerCallRequest, BridgeStatusWebhook, CallRow, CallStatusResponse, ParticipantResponse,
    StartCallRequest, StartCallResponse,
};
use crate::observability::metrics;
use crate::services::{BridgeProvider, PushGateway};
use crate::store::CallStore;
use crate::tasks::{run_ring_notifier, NotifierRegistry};
use chrono::Utc;
use common::signal::CallSignal;
use common::types::{CallId, CallStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Coordinates call lifecycle transitions across the store, the ring
/// notifier, and the external providers.
pub struct CallOrchestrator {
    store: Arc<dyn CallStore>,
    push: Arc<dyn PushGateway>,
    bridge: Arc<dyn BridgeProvider>,
    registry: Arc<NotifierRegistry>,
    ring_retry_interval: Duration,
    ring_timeout: Duration,
}

impl CallOrchestrator {
    /// Create an orchestrator.
    pub fn new(
        store: Arc<dyn CallStore>,
        push: Arc<dyn PushGateway>,
        bridge: Arc<dyn BridgeProvider>,
        registry: Arc<NotifierRegistry>,
        ring_retry_interval: Duration,
        ring_timeout: Duration,
    ) -> Self {
        Self {
            store,
            push,
            bridge,
            registry,
            ring_retry_interval,
            ring_timeout,
        }
    }

    /// Start a call to an apartment.
    ///
    /// Resolves recipients, creates the call in `ringing` with one `invited`
    /// participant per recipient, and starts the ring notifier.
    ///
    /// # Errors
    ///
    /// - `CallError::NoRecipients` when no resident can be reached; no call
    ///   row is created
    /// - `CallError::CallAlreadyActive` when the apartment already has a
    ///   ringing call
    /// - `CallError::NotFound` when the apartment or doorman is unknown
    #[instrument(skip_all, name = "call.orchestrator.start_call", fields(apartment_id = %request.apartment_id))]
    pub async fn start_call(
        &self,
        request: &StartCallRequest,
    ) -> Result<StartCallResponse, CallError> {
        let recipients = self.store.resolve_recipients(request.apartment_id).await?;
        if recipients.is_empty() {
            return Err(CallError::NoRecipients);
        }

        let context = self
            .store
            .get_call_context(request.apartment_id, request.doorman_id)
            .await?
            .ok_or_else(|| CallError::NotFound("Apartment or doorman not found".to_string()))?;

        let channel_ref = format!("intercom-{}", Uuid::new_v4());
        let call = self
            .store
            .create_call(
                request.apartment_id,
                request.doorman_id,
                request.building_id,
                &channel_ref,
                &recipients,
            )
            .await?;

        let signal = CallSignal::new(
            call.call_id,
            context.doorman_name,
            context.apartment_label,
            &call.channel_ref,
        );

        let token = self.registry.register(call.call_id);
        tokio::spawn(run_ring_notifier(
            self.store.clone(),
            self.push.clone(),
            self.registry.clone(),
            call.call_id,
            signal,
            self.ring_retry_interval,
            self.ring_timeout,
            token,
        ));

        metrics::record_call_started();
        info!(
            target: "call.orchestrator",
            call_id = %call.call_id,
            recipient_count = recipients.len(),
            "Call started, ringing"
        );

        let participants = self.store.get_participants(call.call_id).await?;
        Ok(StartCallResponse {
            call_id: call.call_id,
            status: call.status,
            participants: participants.iter().map(ParticipantResponse::from).collect(),
        })
    }

    /// Answer a call on behalf of a resident.
    ///
    /// Claims the ringing → answered transition first; only the winner of a
    /// concurrent answer race proceeds to stop the notifier, request the
    /// voice bridge, and record participant outcomes. Losers get
    /// `CallError::CallNotRinging`.
    ///
    /// Bridge failures are logged and do not fail the request: the call is
    /// answered as far as signaling is concerned.
    #[instrument(skip_all, name = "call.orchestrator.answer_call", fields(call_id = %call_id, resident_id = %request.resident_id))]
    pub async fn answer_call(
        &self,
        call_id: CallId,
        request: &AnswerCallRequest,
    ) -> Result<CallStatusResponse, CallError> {
        let Some(call) = self.store.claim_answer(call_id).await? else {
            // Lost the race, or the call never existed / already ended.
            return match self.store.get_call(call_id).await? {
                Some(_) => Err(CallError::CallNotRinging),
                None => Err(CallError::NotFound("Call not found".to_string())),
            };
        };

        self.registry.cancel(call_id);

        let answered_at = call.answered_at.unwrap_or_else(Utc::now);
        self.store
            .record_participant_answer(call_id, request.resident_id, answered_at)
            .await?;

        self.establish_bridge(&call).await;

        info!(
            target: "call.orchestrator",
            call_id = %call_id,
            resident_id = %request.resident_id,
            "Call answered"
        );

        self.call_status(call_id).await
    }

    /// Request the voice bridge for an answered call and persist the session.
    ///
    /// Best-effort: failures are logged and signaling state is left as-is.
    async fn establish_bridge(&self, call: &CallRow) {
        let doorman_leg = format!("doorman-{}", call.doorman_id);
        match self
            .bridge
            .request_bridge(&doorman_leg, &call.channel_ref)
            .await
        {
            Ok(session) => {
                metrics::record_bridge_request("bridge", "success");
                let stored = match self.store.set_bridge_session(call.call_id, &session).await {
                    Ok(stored) => stored,
                    Err(e) => {
                        warn!(
                            target: "call.orchestrator",
                            call_id = %call.call_id,
                            error = %e,
                            "Failed to persist bridge session"
                        );
                        return;
                    }
                };
                if !stored {
                    // A session was already recorded; tear the spare one down
                    // so the provider does not keep a dangling bridge.
                    warn!(
                        target: "call.orchestrator",
                        call_id = %call.call_id,
                        "Bridge session already set, tearing down duplicate"
                    );
                    if let Err(e) = self.bridge.teardown_bridge(&session).await {
                        warn!(
                            target: "call.orchestrator",
                            call_id = %call.call_id,
                            error = %e,
                            "Failed to tear down duplicate bridge session"
                        );
                    }
                }
            }
            Err(e) => {
                metrics::record_bridge_request("bridge", "error");
                warn!(
                    target: "call.orchestrator",
                    call_id = %call.call_id,
                    error = %e,
                    "Bridge request failed, call stays answered without voice path"
                );
            }
        }
    }

    /// Hang a call up. Idempotent: hanging up an already-ended call is a
    /// no-op success.
    #[instrument(skip_all, name = "call.orchestrator.hangup_call", fields(call_id = %call_id))]
    pub async fn hangup_call(&self, call_id: CallId) -> Result<CallStatusResponse, CallError> {
        if self.store.get_call(call_id).await?.is_none() {
            return Err(CallError::NotFound("Call not found".to_string()));
        }

        self.registry.cancel(call_id);

        match self.store.finish_call(call_id, Utc::now(), None).await? {
            Some(ended) => {
                let ring_duration = ended
                    .ended_at
                    .map(|t| t - ended.started_at)
                    .and_then(|d| d.to_std().ok())
                    .unwrap_or_default();
                metrics::record_call_ended("hangup", ring_duration);
                self.teardown_bridge_best_effort(&ended).await;
                info!(
                    target: "call.orchestrator",
                    call_id = %call_id,
                    "Call ended by hangup"
                );
            }
            None => {
                info!(
                    target: "call.orchestrator",
                    call_id = %call_id,
                    "Hangup on already-ended call, nothing to do"
                );
            }
        }

        self.call_status(call_id).await
    }

    /// Tear the provider bridge down if one was established. Best-effort.
    async fn teardown_bridge_best_effort(&self, call: &CallRow) {
        let Some(session) = &call.bridge_session_id else {
            return;
        };
        match self.bridge.teardown_bridge(session).await {
            Ok(()) => metrics::record_bridge_request("teardown", "success"),
            Err(e) => {
                metrics::record_bridge_request("teardown", "error");
                warn!(
                    target: "call.orchestrator",
                    call_id = %call.call_id,
                    error = %e,
                    "Bridge teardown failed"
                );
            }
        }
    }

    /// Current call state with participants.
    #[instrument(skip_all, name = "call.orchestrator.call_status", fields(call_id = %call_id))]
    pub async fn call_status(&self, call_id: CallId) -> Result<CallStatusResponse, CallError> {
        let call = self
            .store
            .get_call(call_id)
            .await?
            .ok_or_else(|| CallError::NotFound("Call not found".to_string()))?;
        let participants = self.store.get_participants(call_id).await?;
        Ok(CallStatusResponse::from_rows(&call, &participants))
    }

    /// Reconcile a bridge provider status callback.
    ///
    /// Provider callbacks may arrive late, duplicated, or out of order; only
    /// forward-progress transitions are applied, everything else is logged
    /// and absorbed. Callers always acknowledge with 200 regardless.
    #[instrument(skip_all, name = "call.orchestrator.reconcile_bridge_status")]
    pub async fn reconcile_bridge_status(
        &self,
        webhook: &BridgeStatusWebhook,
    ) -> Result<(), CallError> {
        let Some(target) = map_provider_status(&webhook.status) else {
            metrics::record_webhook("invalid");
            warn!(
                target: "call.orchestrator",
                provider_status = %webhook.status,
                "Unknown provider status in webhook, ignoring"
            );
            return Ok(());
        };

        let Some(call) = self
            .store
            .get_call_by_bridge_session(&webhook.bridge_session_id)
            .await?
        else {
            metrics::record_webhook("unknown_session");
            warn!(
                target: "call.orchestrator",
                "Webhook for unknown bridge session, ignoring"
            );
            return Ok(());
        };

        if !call.status.is_forward_progress(target) {
            metrics::record_webhook("stale");
            info!(
                target: "call.orchestrator",
                call_id = %call.call_id,
                current = call.status.as_str(),
                reported = target.as_str(),
                "Stale webhook, ignoring"
            );
            return Ok(());
        }

        match target {
            CallStatus::Answered => {
                // The provider saw the bridge come up before our own answer
                // path finished; the conditional claim absorbs the race.
                self.store.claim_answer(call.call_id).await?;
                metrics::record_webhook("applied");
            }
            CallStatus::Ended => {
                self.registry.cancel(call.call_id);
                if let Some(ended) = self
                    .store
                    .finish_call(call.call_id, Utc::now(), webhook.duration)
                    .await?
                {
                    let ring_duration = ended
                        .ended_at
                        .map(|t| t - ended.started_at)
                        .and_then(|d| d.to_std().ok())
                        .unwrap_or_default();
                    metrics::record_call_ended("provider", ring_duration);
                }
                metrics::record_webhook("applied");
                info!(
                    target: "call.orchestrator",
                    call_id = %call.call_id,
                    provider_status = %webhook.status,
                    "Call ended by provider callback"
                );
            }
            // Ringing is never forward progress from any state.
            CallStatus::Ringing => {}
        }

        Ok(())
    }
}

/// Map the provider status vocabulary onto the call lifecycle.
fn map_provider_status(status: &str) -> Option<CallStatus> {
    match status {
        "initiated" | "ringing" => Some(CallStatus::Ringing),
        "answered" | "in-progress" => Some(CallStatus::Answered),
        "completed" | "busy" | "no-answer" | "failed" => Some(CallStatus::Ended),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::services::{MockBridgeProvider, MockPushGateway};
    use crate::store::MemoryCallStore;
    use common::types::{ApartmentId, BridgeSessionId, BuildingId, DoormanId, ResidentId};

    struct Fixture {
        store: Arc<MemoryCallStore>,
        push: Arc<MockPushGateway>,
        bridge: Arc<MockBridgeProvider>,
        orchestrator: Arc<CallOrchestrator>,
        apartment_id: ApartmentId,
        doorman_id: DoormanId,
        building_id: BuildingId,
        resident_id: ResidentId,
        other_resident_id: ResidentId,
    }

    fn fixture_with_bridge(bridge: MockBridgeProvider) -> Fixture {
        let store = Arc::new(MemoryCallStore::new());
        let push = Arc::new(MockPushGateway::accepting());
        let bridge = Arc::new(bridge);
        let registry = Arc::new(NotifierRegistry::new());

        let apartment_id = ApartmentId(Uuid::new_v4());
        let doorman_id = DoormanId(Uuid::new_v4());
        let resident_id = ResidentId(Uuid::new_v4());
        let other_resident_id = ResidentId(Uuid::new_v4());
        store.add_recipient(apartment_id, resident_id, "addr-1");
        store.add_recipient(apartment_id, other_resident_id, "addr-2");
        store.add_call_context(apartment_id, "302", doorman_id, "Carlos");

        let orchestrator = Arc::new(CallOrchestrator::new(
            store.clone(),
            push.clone(),
            bridge.clone(),
            registry,
            Duration::from_secs(2),
            Duration::from_secs(45),
        ));

        Fixture {
            store,
            push,
            bridge,
            orchestrator,
            apartment_id,
            doorman_id,
            building_id: BuildingId(Uuid::new_v4()),
            resident_id,
            other_resident_id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_bridge(MockBridgeProvider::accepting())
    }

    fn start_request(f: &Fixture) -> StartCallRequest {
        StartCallRequest {
            apartment_id: f.apartment_id,
            doorman_id: f.doorman_id,
            building_id: f.building_id,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_call_rings_and_fans_out() {
        let f = fixture();
        let response = f.orchestrator.start_call(&start_request(&f)).await.unwrap();

        assert_eq!(response.status, CallStatus::Ringing);
        assert_eq!(response.participants.len(), 2);
        assert!(response
            .participants
            .iter()
            .all(|p| p.status == common::types::ParticipantStatus::Invited));

        // The notifier's first round goes out immediately.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(f.push.call_count(), 2);

        let sent = f.push.sent();
        let (_, signal) = sent.first().unwrap();
        assert_eq!(signal.caller_name, "Carlos");
        assert_eq!(signal.apartment_label, "302");
        assert!(signal.is_valid());

        f.orchestrator.hangup_call(response.call_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_call_with_no_recipients_creates_nothing() {
        let f = fixture();
        let empty_apartment = ApartmentId(Uuid::new_v4());
        let result = f
            .orchestrator
            .start_call(&StartCallRequest {
                apartment_id: empty_apartment,
                doorman_id: f.doorman_id,
                building_id: f.building_id,
            })
            .await;
        assert!(matches!(result, Err(CallError::NoRecipients)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_to_same_apartment_conflicts() {
        let f = fixture();
        let first = f.orchestrator.start_call(&start_request(&f)).await.unwrap();

        let second = f.orchestrator.start_call(&start_request(&f)).await;
        assert!(matches!(second, Err(CallError::CallAlreadyActive)));

        f.orchestrator.hangup_call(first.call_id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_answers_one_winner_one_bridge() {
        let f = fixture();
        let call = f.orchestrator.start_call(&start_request(&f)).await.unwrap();

        let first = f
            .orchestrator
            .answer_call(
                call.call_id,
                &AnswerCallRequest {
                    resident_id: f.resident_id,
                },
            )
            .await;
        let second = f
            .orchestrator
            .answer_call(
                call.call_id,
                &AnswerCallRequest {
                    resident_id: f.other_resident_id,
                },
            )
            .await;

        let winner = first.unwrap();
        assert_eq!(winner.status, CallStatus::Answered);
        assert!(matches!(second, Err(CallError::CallNotRinging)));

        // Exactly one bridge for the winning answer.
        assert_eq!(f.bridge.call_count(), 1);

        // Winner answered, the other resident missed.
        let participants = f.store.get_participants(call.call_id).await.unwrap();
        let answered = participants
            .iter()
            .filter(|p| p.status == common::types::ParticipantStatus::Answered)
            .count();
        let missed = participants
            .iter()
            .filter(|p| p.status == common::types::ParticipantStatus::Missed)
            .count();
        assert_eq!((answered, missed), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_failure_does_not_fail_answer() {
        let f = fixture_with_bridge(MockBridgeProvider::failing());
        let call = f.orchestrator.start_call(&start_request(&f)).await.unwrap();

        let response = f
            .orchestrator
            .answer_call(
                call.call_id,
                &AnswerCallRequest {
                    resident_id: f.resident_id,
                },
            )
            .await
            .unwrap();

        assert_eq!(response.status, CallStatus::Answered);
        let stored = f.store.get_call(call.call_id).await.unwrap().unwrap();
        assert!(stored.bridge_session_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_persists_bridge_session() {
        let f = fixture();
        let call = f.orchestrator.start_call(&start_request(&f)).await.unwrap();

        f.orchestrator
            .answer_call(
                call.call_id,
                &AnswerCallRequest {
                    resident_id: f.resident_id,
                },
            )
            .await
            .unwrap();

        let stored = f.store.get_call(call.call_id).await.unwrap().unwrap();
        assert!(stored.bridge_session_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hangup_is_idempotent_and_tears_bridge_down() {
        let f = fixture();
        let call = f.orchestrator.start_call(&start_request(&f)).await.unwrap();
        f.orchestrator
            .answer_call(
                call.call_id,
                &AnswerCallRequest {
                    resident_id: f.resident_id,
                },
            )
            .await
            .unwrap();

        let first = f.orchestrator.hangup_call(call.call_id).await.unwrap();
        assert_eq!(first.status, CallStatus::Ended);
        assert_eq!(f.bridge.torn_down().len(), 1);

        // Second hangup is a no-op success, no second teardown.
        let second = f.orchestrator.hangup_call(call.call_id).await.unwrap();
        assert_eq!(second.status, CallStatus::Ended);
        assert_eq!(f.bridge.torn_down().len(), 1);
    }

    #[tokio::test]
    async fn test_hangup_unknown_call_is_not_found() {
        let f = fixture();
        let result = f.orchestrator.hangup_call(CallId::new()).await;
        assert!(matches!(result, Err(CallError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_after_hangup_is_rejected() {
        let f = fixture();
        let call = f.orchestrator.start_call(&start_request(&f)).await.unwrap();
        f.orchestrator.hangup_call(call.call_id).await.unwrap();

        let result = f
            .orchestrator
            .answer_call(
                call.call_id,
                &AnswerCallRequest {
                    resident_id: f.resident_id,
                },
            )
            .await;
        assert!(matches!(result, Err(CallError::CallNotRinging)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_webhook_completed_ends_answered_call() {
        let f = fixture();
        let call = f.orchestrator.start_call(&start_request(&f)).await.unwrap();
        f.orchestrator
            .answer_call(
                call.call_id,
                &AnswerCallRequest {
                    resident_id: f.resident_id,
                },
            )
            .await
            .unwrap();
        let session = f
            .store
            .get_call(call.call_id)
            .await
            .unwrap()
            .unwrap()
            .bridge_session_id
            .unwrap();

        f.orchestrator
            .reconcile_bridge_status(&BridgeStatusWebhook {
                bridge_session_id: session,
                status: "completed".to_string(),
                duration: Some(34),
            })
            .await
            .unwrap();

        let stored = f.store.get_call(call.call_id).await.unwrap().unwrap();
        assert_eq!(stored.status, CallStatus::Ended);
        assert_eq!(stored.duration_seconds, Some(34));
    }

    #[tokio::test(start_paused = true)]
    async fn test_webhook_never_regresses_ended_call() {
        let f = fixture();
        let call = f.orchestrator.start_call(&start_request(&f)).await.unwrap();
        f.orchestrator
            .answer_call(
                call.call_id,
                &AnswerCallRequest {
                    resident_id: f.resident_id,
                },
            )
            .await
            .unwrap();
        let session = f
            .store
            .get_call(call.call_id)
            .await
            .unwrap()
            .unwrap()
            .bridge_session_id
            .unwrap();
        f.orchestrator.hangup_call(call.call_id).await.unwrap();
        let ended = f.store.get_call(call.call_id).await.unwrap().unwrap();

        // A late "ringing" (or any) callback must leave the ended call alone.
        for status in ["ringing", "answered", "completed"] {
            f.orchestrator
                .reconcile_bridge_status(&BridgeStatusWebhook {
                    bridge_session_id: session.clone(),
                    status: status.to_string(),
                    duration: None,
                })
                .await
                .unwrap();
        }

        let after = f.store.get_call(call.call_id).await.unwrap().unwrap();
        assert_eq!(after.status, CallStatus::Ended);
        assert_eq!(after.ended_at, ended.ended_at);
        assert_eq!(after.duration_seconds, ended.duration_seconds);
    }

    #[tokio::test]
    async fn test_webhook_unknown_session_is_absorbed() {
        let f = fixture();
        f.orchestrator
            .reconcile_bridge_status(&BridgeStatusWebhook {
                bridge_session_id: BridgeSessionId("BS-nobody".to_string()),
                status: "completed".to_string(),
                duration: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_provider_status_mapping() {
        assert_eq!(map_provider_status("initiated"), Some(CallStatus::Ringing));
        assert_eq!(map_provider_status("ringing"), Some(CallStatus::Ringing));
        assert_eq!(map_provider_status("answered"), Some(CallStatus::Answered));
        assert_eq!(
            map_provider_status("in-progress"),
            Some(CallStatus::Answered)
        );
        for terminal in ["completed", "busy", "no-answer", "failed"] {
            assert_eq!(map_provider_status(terminal), Some(CallStatus::Ended));
        }
        assert_eq!(map_provider_status("queued"), None);
    }
}
