//! Ring notifier background task.
//!
//! One task per ringing call. Sends the call signal to every still-invited
//! participant immediately and then on every retry tick, until a resident
//! answers, the caller hangs up, or the ring timeout expires. On timeout the
//! task itself ends the call with reason no-answer; participant rows stay
//! `invited` because nobody missed an answered call.
//!
//! Push delivery is best-effort: a failed send is logged and retried on the
//! next tick. The task re-reads call status from the store each tick and
//! exits as soon as the call is no longer ringing, so a crashed or missed
//! cancellation cannot keep a dead call ringing.
//!
//! # Graceful Shutdown
//!
//! The task supports shutdown via a cancellation token held in the
//! [`NotifierRegistry`]. Answer and hangup cancel the token; cancellation is
//! idempotent.

use crate::observability::metrics;
use crate::services::PushGateway;
use crate::store::CallStore;
use chrono::Utc;
use common::signal::CallSignal;
use common::types::{CallId, CallStatus, ParticipantStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Registry of cancellation tokens for running ring notifiers, keyed by call.
#[derive(Default)]
pub struct NotifierRegistry {
    inner: Mutex<HashMap<CallId, CancellationToken>>,
}

impl NotifierRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notifier for a call, returning its cancellation token.
    ///
    /// Replaces any previous token for the call (the old task observes the
    /// status change and exits on its next tick).
    pub fn register(&self, call_id: CallId) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut inner) = self.inner.lock() {
            inner.insert(call_id, token.clone());
        }
        token
    }

    /// Cancel the notifier for a call, if one is running. Idempotent.
    pub fn cancel(&self, call_id: CallId) {
        let token = match self.inner.lock() {
            Ok(mut inner) => inner.remove(&call_id),
            Err(_) => None,
        };
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// Drop the registration for a call without cancelling (task exited on
    /// its own).
    fn deregister(&self, call_id: CallId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.remove(&call_id);
        }
    }

    /// Number of notifiers currently registered.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.len()).unwrap_or(0)
    }

    /// Whether no notifier is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run the ring notifier loop for one call.
///
/// Exits when the call leaves `ringing`, the token is cancelled, or the ring
/// timeout expires (in which case this task ends the call first).
///
/// # Arguments
///
/// * `store` - Call record store
/// * `push` - Push gateway for signal delivery
/// * `registry` - Registry to deregister from on exit
/// * `call_id` - Call being rung
/// * `signal` - Signal payload, identical on every delivery
/// * `retry_interval` - Delay between delivery rounds
/// * `ring_timeout` - Total time to ring before ending with no-answer
/// * `cancel_token` - Cancelled by answer or hangup
#[allow(clippy::too_many_arguments)]
pub async fn run_ring_notifier(
    store: Arc<dyn CallStore>,
    push: Arc<dyn PushGateway>,
    registry: Arc<NotifierRegistry>,
    call_id: CallId,
    signal: CallSignal,
    retry_interval: Duration,
    ring_timeout: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "call.task.ring_notifier",
        call_id = %call_id,
        "Ring notifier started"
    );

    let deadline = tokio::time::Instant::now() + ring_timeout;
    let mut interval = tokio::time::interval(retry_interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Re-read status each tick so answer/hangup from any path
                // stops the ringing even if cancellation was missed.
                match store.get_call(call_id).await {
                    Ok(Some(call)) if call.status == CallStatus::Ringing => {}
                    Ok(_) => {
                        debug!(
                            target: "call.task.ring_notifier",
                            call_id = %call_id,
                            "Call no longer ringing, notifier exiting"
                        );
                        break;
                    }
                    Err(e) => {
                        warn!(
                            target: "call.task.ring_notifier",
                            call_id = %call_id,
                            error = %e,
                            "Failed to read call status, retrying next tick"
                        );
                        continue;
                    }
                }

                send_round(store.as_ref(), push.as_ref(), call_id, &signal).await;
            }
            _ = tokio::time::sleep_until(deadline) => {
                handle_timeout(store.as_ref(), call_id, ring_timeout).await;
                break;
            }
            _ = cancel_token.cancelled() => {
                debug!(
                    target: "call.task.ring_notifier",
                    call_id = %call_id,
                    "Ring notifier cancelled"
                );
                break;
            }
        }
    }

    registry.deregister(call_id);
    info!(
        target: "call.task.ring_notifier",
        call_id = %call_id,
        "Ring notifier exited"
    );
}

/// Send the signal to every participant still waiting on an answer.
async fn send_round(
    store: &dyn CallStore,
    push: &dyn PushGateway,
    call_id: CallId,
    signal: &CallSignal,
) {
    let participants = match store.get_participants(call_id).await {
        Ok(participants) => participants,
        Err(e) => {
            warn!(
                target: "call.task.ring_notifier",
                call_id = %call_id,
                error = %e,
                "Failed to load participants for delivery round"
            );
            return;
        }
    };

    for participant in participants
        .iter()
        .filter(|p| p.status == ParticipantStatus::Invited)
    {
        match push.send_signal(&participant.device_address, signal).await {
            Ok(()) => metrics::record_push_attempt("success"),
            Err(e) => {
                metrics::record_push_attempt("error");
                warn!(
                    target: "call.task.ring_notifier",
                    call_id = %call_id,
                    resident_id = %participant.resident_id,
                    error = %e,
                    "Push delivery failed, will retry next tick"
                );
            }
        }
    }
}

/// End the call with reason no-answer after the ring timeout.
async fn handle_timeout(store: &dyn CallStore, call_id: CallId, ring_timeout: Duration) {
    match store.finish_call(call_id, Utc::now(), Some(0)).await {
        Ok(Some(_)) => {
            metrics::record_call_ended("no_answer", ring_timeout);
            info!(
                target: "call.task.ring_notifier",
                call_id = %call_id,
                "Ring timeout expired, call ended with no answer"
            );
        }
        // Someone answered or hung up in the same instant; their transition
        // won and this one matched zero rows.
        Ok(None) => {
            debug!(
                target: "call.task.ring_notifier",
                call_id = %call_id,
                "Ring timeout raced a concurrent transition, nothing to do"
            );
        }
        Err(e) => {
            warn!(
                target: "call.task.ring_notifier",
                call_id = %call_id,
                error = %e,
                "Failed to end timed-out call"
            );
        }
    }
}
