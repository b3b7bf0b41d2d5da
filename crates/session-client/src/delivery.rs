//! Background delivery hook.
//!
//! Push payloads can arrive while the app is backgrounded or fully cold; the
//! platform hands the raw JSON payload to a process-entry hook long before
//! any UI exists. [`DeliveryHook`] parses the payload, filters out anything
//! that is not an intercom call signal, and forwards the rest to the
//! coordinator. It needs nothing beyond the coordinator handle, so it can be
//! registered at process entry.

use crate::coordinator::{CoordinatorHandle, SignalOutcome};
use crate::errors::SessionError;
use common::signal::{CallSignal, SIGNAL_TYPE_INTERCOM_CALL};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Process-entry hook for raw push payloads.
#[derive(Clone)]
pub struct DeliveryHook {
    handle: CoordinatorHandle,
}

impl DeliveryHook {
    /// Register a hook against a running coordinator.
    #[must_use]
    pub fn register(handle: CoordinatorHandle) -> Self {
        Self { handle }
    }

    /// Deliver a raw push payload.
    ///
    /// Payloads without the intercom type tag belong to other features and
    /// are ignored without error. Returns the outcome for intercom payloads.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::CoordinatorClosed` if the coordinator task has
    /// stopped.
    pub async fn deliver(&self, payload: &Value) -> Result<Option<SignalOutcome>, SessionError> {
        let type_tag = payload.get("type").and_then(Value::as_str);
        if type_tag != Some(SIGNAL_TYPE_INTERCOM_CALL) {
            debug!(
                target: "session.delivery",
                type_tag = type_tag.unwrap_or("<none>"),
                "Ignoring non-intercom payload"
            );
            return Ok(None);
        }

        let signal: CallSignal = match serde_json::from_value(payload.clone()) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(target: "session.delivery", error = %e, "Dropping unparseable call payload");
                return Ok(Some(SignalOutcome::Invalid));
            }
        };

        let outcome = self.handle.signal_received(signal).await?;
        info!(
            target: "session.delivery",
            outcome = ?outcome,
            "Delivered call signal from background payload"
        );
        Ok(Some(outcome))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::control::mock::MockControlClient;
    use crate::coordinator::{CallCoordinator, CoordinatorConfig};
    use crate::native::mock::MockNativeUi;
    use crate::storage::MemorySessionStorage;
    use common::types::{CallId, ResidentId};
    use std::sync::Arc;
    use uuid::Uuid;

    fn hook() -> DeliveryHook {
        let handle = CallCoordinator::spawn(
            Arc::new(MemorySessionStorage::new()),
            Arc::new(MockControlClient::accepting()),
            Arc::new(MockNativeUi::new()),
            CoordinatorConfig::new(ResidentId(Uuid::new_v4())),
        );
        DeliveryHook::register(handle)
    }

    #[tokio::test]
    async fn test_intercom_payload_creates_session() {
        let hook = hook();
        let payload = serde_json::to_value(CallSignal::new(
            CallId::new(),
            "Carlos",
            "302",
            "channel-1",
        ))
        .unwrap();

        let outcome = hook.deliver(&payload).await.unwrap();
        assert_eq!(outcome, Some(SignalOutcome::Created));
        assert!(hook.handle.session().await.unwrap().is_some());
        hook.handle.shutdown();
    }

    #[tokio::test]
    async fn test_foreign_payload_is_ignored() {
        let hook = hook();
        let payload = serde_json::json!({"type": "chat_message", "body": "hi"});

        let outcome = hook.deliver(&payload).await.unwrap();
        assert_eq!(outcome, None);
        assert!(hook.handle.session().await.unwrap().is_none());
        hook.handle.shutdown();
    }

    #[tokio::test]
    async fn test_unparseable_intercom_payload_is_invalid() {
        let hook = hook();
        // Right type tag, missing every required field.
        let payload = serde_json::json!({"type": "intercom_call"});

        let outcome = hook.deliver(&payload).await.unwrap();
        assert_eq!(outcome, Some(SignalOutcome::Invalid));
        hook.handle.shutdown();
    }
}
