//! Native call UI bridge.
//!
//! The platform's call UI (full-screen incoming call, lock-screen controls)
//! is driven through the [`NativeCallUi`] trait and raises user intent back
//! as [`NativeEvent`]s. The UI layer can emit events before the coordinator
//! has finished initializing — a cold process answering from the lock screen
//! does exactly that — so the [`NativeEventBridge`] queues early events and
//! replays them in order once the coordinator attaches.
//!
//! The bridge never touches session state; it only reads identifiers and
//! forwards intent.

use common::types::CallId;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Platform call UI operations, invoked by the coordinator.
pub trait NativeCallUi: Send + Sync {
    /// Present the incoming-call UI for a session.
    fn display_incoming(&self, call_id: CallId, caller_name: &str, subtitle: &str);

    /// Mark the call answered; the native UI stays up as the in-call surface.
    fn mark_answered(&self, call_id: CallId);

    /// Dismiss the call UI with a terminal reason.
    fn report_ended(&self, call_id: CallId, reason: &str);
}

/// User intent raised by the native call UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    /// User accepted the call.
    Answer { call_id: CallId },
    /// User hung up or dismissed the call.
    End { call_id: CallId },
    /// User declined the incoming call.
    Decline { call_id: CallId },
    /// User toggled mute (informational; audio is handled by the voice
    /// layer).
    Mute { call_id: CallId, muted: bool },
    /// DTMF digit pressed during the call.
    Dtmf { call_id: CallId, digit: char },
}

impl NativeEvent {
    /// The call this event refers to.
    #[must_use]
    pub fn call_id(&self) -> CallId {
        match self {
            NativeEvent::Answer { call_id }
            | NativeEvent::End { call_id }
            | NativeEvent::Decline { call_id }
            | NativeEvent::Mute { call_id, .. }
            | NativeEvent::Dtmf { call_id, .. } => *call_id,
        }
    }
}

enum BridgeState {
    /// Coordinator not attached yet; events wait here.
    Buffering(Vec<NativeEvent>),
    /// Events flow straight through to the coordinator.
    Attached(mpsc::Sender<NativeEvent>),
}

/// Queueing forwarder between the native UI layer and the coordinator.
pub struct NativeEventBridge {
    state: Mutex<BridgeState>,
}

impl Default for NativeEventBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEventBridge {
    /// Create a detached bridge that buffers events.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BridgeState::Buffering(Vec::new())),
        }
    }

    /// Raise an event from the native UI.
    ///
    /// Buffered while detached; forwarded immediately once attached. Events
    /// are dropped (with a log) only if the coordinator has gone away.
    pub fn raise(&self, event: NativeEvent) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match &mut *state {
            BridgeState::Buffering(queue) => {
                debug!(
                    target: "session.native",
                    call_id = %event.call_id(),
                    "Coordinator not ready, queueing native event"
                );
                queue.push(event);
            }
            BridgeState::Attached(tx) => {
                if tx.try_send(event).is_err() {
                    warn!(target: "session.native", "Dropping native event, coordinator unavailable");
                }
            }
        }
    }

    /// Attach the coordinator's event channel, replaying queued events in
    /// arrival order.
    pub fn attach(&self, tx: mpsc::Sender<NativeEvent>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let BridgeState::Buffering(queue) = &mut *state {
            for event in queue.drain(..) {
                if tx.try_send(event).is_err() {
                    warn!(target: "session.native", "Dropping queued native event, coordinator unavailable");
                }
            }
        }
        *state = BridgeState::Attached(tx);
    }
}

/// Banner state for the in-app overlay fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayBanner {
    /// Call the banner belongs to.
    pub call_id: CallId,
    /// Caller display name.
    pub caller_name: String,
    /// Subtitle line (apartment label).
    pub subtitle: String,
    /// Whether the call has been answered.
    pub answered: bool,
}

/// In-app overlay fallback for runtimes without native call presentation.
///
/// Holds the banner the in-app UI should render; the UI layer polls
/// [`current`](Self::current) and raises user intent through the
/// [`NativeEventBridge`] exactly as the native layer would.
#[derive(Default)]
pub struct OverlayCallUi {
    banner: Mutex<Option<OverlayBanner>>,
}

impl OverlayCallUi {
    /// Create an overlay with no banner showing.
    pub fn new() -> Self {
        Self::default()
    }

    /// The banner to render, if a call is in progress.
    pub fn current(&self) -> Option<OverlayBanner> {
        self.banner.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl NativeCallUi for OverlayCallUi {
    fn display_incoming(&self, call_id: CallId, caller_name: &str, subtitle: &str) {
        if let Ok(mut banner) = self.banner.lock() {
            *banner = Some(OverlayBanner {
                call_id,
                caller_name: caller_name.to_string(),
                subtitle: subtitle.to_string(),
                answered: false,
            });
        }
    }

    fn mark_answered(&self, call_id: CallId) {
        if let Ok(mut banner) = self.banner.lock() {
            if let Some(b) = banner.as_mut() {
                if b.call_id == call_id {
                    b.answered = true;
                }
            }
        }
    }

    fn report_ended(&self, call_id: CallId, reason: &str) {
        debug!(
            target: "session.native",
            call_id = %call_id,
            reason,
            "Overlay banner dismissed"
        );
        if let Ok(mut banner) = self.banner.lock() {
            if banner.as_ref().is_some_and(|b| b.call_id == call_id) {
                *banner = None;
            }
        }
    }
}

/// Mock native UI for testing.
pub mod mock {

    use super::*;

    /// Recorded native UI invocation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum UiCall {
        DisplayIncoming {
            call_id: CallId,
            caller_name: String,
        },
        MarkAnswered {
            call_id: CallId,
        },
        ReportEnded {
            call_id: CallId,
            reason: String,
        },
    }

    /// Mock UI that records every invocation.
    #[derive(Default)]
    pub struct MockNativeUi {
        calls: Mutex<Vec<UiCall>>,
    }

    impl MockNativeUi {
        /// Create an empty mock.
        pub fn new() -> Self {
            Self::default()
        }

        /// All recorded invocations, in order.
        pub fn calls(&self) -> Vec<UiCall> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    impl NativeCallUi for MockNativeUi {
        fn display_incoming(&self, call_id: CallId, caller_name: &str, _subtitle: &str) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(UiCall::DisplayIncoming {
                    call_id,
                    caller_name: caller_name.to_string(),
                });
            }
        }

        fn mark_answered(&self, call_id: CallId) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(UiCall::MarkAnswered { call_id });
            }
        }

        fn report_ended(&self, call_id: CallId, reason: &str) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(UiCall::ReportEnded {
                    call_id,
                    reason: reason.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_raised_before_attach_are_replayed_in_order() {
        let bridge = NativeEventBridge::new();
        let first = CallId::new();

        bridge.raise(NativeEvent::Answer { call_id: first });
        bridge.raise(NativeEvent::Mute {
            call_id: first,
            muted: true,
        });

        let (tx, mut rx) = mpsc::channel(8);
        bridge.attach(tx);

        assert_eq!(
            rx.recv().await.unwrap(),
            NativeEvent::Answer { call_id: first }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            NativeEvent::Mute {
                call_id: first,
                muted: true
            }
        );
    }

    #[tokio::test]
    async fn test_events_after_attach_flow_through() {
        let bridge = NativeEventBridge::new();
        let (tx, mut rx) = mpsc::channel(8);
        bridge.attach(tx);

        let call_id = CallId::new();
        bridge.raise(NativeEvent::End { call_id });
        assert_eq!(rx.recv().await.unwrap(), NativeEvent::End { call_id });
    }

    #[test]
    fn test_event_call_id_accessor() {
        let call_id = CallId::new();
        assert_eq!(NativeEvent::Dtmf { call_id, digit: '5' }.call_id(), call_id);
    }

    #[test]
    fn test_overlay_banner_lifecycle() {
        let overlay = OverlayCallUi::new();
        let call_id = CallId::new();
        assert!(overlay.current().is_none());

        overlay.display_incoming(call_id, "Carlos", "Interfone · Apto 302");
        let banner = overlay.current().unwrap();
        assert_eq!(banner.caller_name, "Carlos");
        assert!(!banner.answered);

        overlay.mark_answered(call_id);
        assert!(overlay.current().unwrap().answered);

        // An end for a different call leaves the banner up.
        overlay.report_ended(CallId::new(), "remote");
        assert!(overlay.current().is_some());

        overlay.report_ended(call_id, "local");
        assert!(overlay.current().is_none());
    }
}
