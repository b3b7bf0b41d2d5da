//! Device-local call session state.
//!
//! One session at a time, exclusively owned by the coordinator. The session
//! is persisted on every phase change so a killed process can recover an
//! unresolved call at next start.

use chrono::{DateTime, Utc};
use common::signal::CallSignal;
use common::types::CallId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which side initiated the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    /// Doorman calling this device.
    Incoming,
    /// This device calling out (reserved; the intercom only rings inward
    /// today).
    Outgoing,
}

/// Local lifecycle phase of a call session.
///
/// Phases only move forward: pending → ringing → connecting → active →
/// ended, with ended reachable from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    /// Session created, native UI not yet shown.
    Pending,
    /// Incoming call presented, waiting on the user.
    Ringing,
    /// User answered locally; server notification in flight.
    Connecting,
    /// Server acknowledged the answer; voice path is live.
    Active,
    /// Call is over.
    Ended,
}

impl CallPhase {
    /// Returns the string representation of the phase.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CallPhase::Pending => "pending",
            CallPhase::Ringing => "ringing",
            CallPhase::Connecting => "connecting",
            CallPhase::Active => "active",
            CallPhase::Ended => "ended",
        }
    }

    /// Whether the session still needs a resolution (answer or end).
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        !matches!(self, CallPhase::Ended)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// User hung up or dismissed the call locally.
    Local,
    /// User declined the incoming call.
    Declined,
    /// The other side or the server ended the call.
    Remote,
    /// The session was discarded because its recovery window expired.
    Expired,
}

impl EndReason {
    /// Returns the string representation of the reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Local => "local",
            EndReason::Declined => "declined",
            EndReason::Remote => "remote",
            EndReason::Expired => "expired",
        }
    }
}

/// A device-local call session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSession {
    /// Session identifier; equals the server call identifier.
    pub call_id: CallId,

    /// Call direction.
    pub direction: CallDirection,

    /// Display name of the calling doorman.
    pub caller_name: String,

    /// Human-readable apartment label.
    pub apartment_label: String,

    /// Voice channel reference from the signal.
    pub channel_ref: String,

    /// Current local phase.
    pub phase: CallPhase,

    /// When the session was created on this device.
    pub created_at: DateTime<Utc>,
}

impl CallSession {
    /// Create an incoming session from a received signal, in phase ringing.
    #[must_use]
    pub fn from_signal(signal: &CallSignal) -> Self {
        Self {
            call_id: signal.call_id,
            direction: CallDirection::Incoming,
            caller_name: signal.caller_name.clone(),
            apartment_label: signal.apartment_label.clone(),
            channel_ref: signal.channel_ref.clone(),
            phase: CallPhase::Ringing,
            created_at: Utc::now(),
        }
    }

    /// Age of the session relative to `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// Subtitle shown under the caller name in the native call UI.
    #[must_use]
    pub fn subtitle(&self) -> String {
        format!("Interfone · Apto {}", self.apartment_label)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signal() -> CallSignal {
        CallSignal::new(CallId::new(), "Carlos", "302", "channel-1")
    }

    #[test]
    fn test_session_from_signal_rings() {
        let signal = signal();
        let session = CallSession::from_signal(&signal);
        assert_eq!(session.call_id, signal.call_id);
        assert_eq!(session.phase, CallPhase::Ringing);
        assert_eq!(session.direction, CallDirection::Incoming);
        assert!(session.phase.is_unresolved());
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let session = CallSession::from_signal(&signal());
        let json = serde_json::to_string(&session).unwrap();
        let restored: CallSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_ended_phase_is_resolved() {
        let mut session = CallSession::from_signal(&signal());
        session.phase = CallPhase::Ended;
        assert!(!session.phase.is_unresolved());
    }

    #[test]
    fn test_age() {
        let session = CallSession::from_signal(&signal());
        let later = session.created_at + chrono::Duration::seconds(30);
        assert_eq!(session.age(later), Duration::from_secs(30));
        // Clock going backwards saturates to zero.
        let earlier = session.created_at - chrono::Duration::seconds(5);
        assert_eq!(session.age(earlier), Duration::ZERO);
    }
}
