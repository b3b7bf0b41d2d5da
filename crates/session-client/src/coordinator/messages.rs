//! Message types for the session coordinator.
//!
//! All communication with the coordinator task uses strongly-typed message
//! passing via `tokio::sync::mpsc`. Request-reply commands carry a
//! `tokio::sync::oneshot` response channel; lifecycle notifications fan out
//! on a `tokio::sync::broadcast` channel.

use crate::errors::SessionError;
use crate::session::{CallSession, EndReason};
use common::signal::CallSignal;
use common::types::CallId;
use tokio::sync::oneshot;

/// Commands sent to the coordinator task.
#[derive(Debug)]
pub enum Command {
    /// Run startup recovery. Subscribers registered before this command is
    /// sent are guaranteed to observe recovery events.
    Initialize {
        /// Response channel for the recovery result.
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// An incoming-call signal arrived (push channel or delivery hook).
    SignalReceived {
        signal: CallSignal,
        /// Response channel for the signal outcome.
        respond_to: oneshot::Sender<Result<SignalOutcome, SessionError>>,
    },

    /// The user answered the active session.
    Answer {
        /// Response channel for confirmation.
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// End the active session. Idempotent.
    End {
        reason: EndReason,
        /// Response channel for confirmation.
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// A remote end signal arrived (push or status poll).
    RemoteEnded { call_id: CallId },

    /// Internal: the background answer notification succeeded.
    AnswerAcknowledged { call_id: CallId },

    /// Internal: the background answer notification exhausted its retries.
    AnswerFailed { call_id: CallId },

    /// Get a snapshot of the active session.
    Snapshot {
        /// Response channel for the session copy.
        respond_to: oneshot::Sender<Option<CallSession>>,
    },
}

/// Outcome of delivering a signal to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// A new session was created and is ringing.
    Created,
    /// The call is already known on this device; nothing changed.
    Duplicate,
    /// A different session is active; the new call was ignored.
    Busy,
    /// The payload failed shape validation and was dropped.
    Invalid,
}

/// Session lifecycle events broadcast to subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session was created from a signal, or recovered from storage at
    /// startup.
    SessionCreated {
        session: CallSession,
        /// True when the session was restored from persisted storage.
        recovered: bool,
    },

    /// The user answered; server notification is in flight.
    SessionAnswered { call_id: CallId },

    /// The server acknowledged the answer; the call is live.
    SessionActive { call_id: CallId },

    /// The session ended.
    SessionEnded { call_id: CallId, reason: EndReason },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_outcome_equality() {
        assert_eq!(SignalOutcome::Duplicate, SignalOutcome::Duplicate);
        assert_ne!(SignalOutcome::Created, SignalOutcome::Busy);
    }

    #[test]
    fn test_session_event_clone() {
        let event = SessionEvent::SessionEnded {
            call_id: CallId::new(),
            reason: EndReason::Remote,
        };
        let cloned = event.clone();
        assert!(matches!(cloned, SessionEvent::SessionEnded { .. }));
    }
}
