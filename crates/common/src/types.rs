//! Common data types for Interfone components.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an intercom call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub Uuid);

impl CallId {
    /// Create a new random call ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for an apartment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApartmentId(pub Uuid);

impl std::fmt::Display for ApartmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a resident profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidentId(pub Uuid);

impl std::fmt::Display for ResidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a doorman profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoormanId(pub Uuid);

impl std::fmt::Display for DoormanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingId(pub Uuid);

impl std::fmt::Display for BuildingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Provider-side identifier for an established voice bridge.
///
/// Opaque string assigned by the telephony provider; set on a call at most
/// once, on the ringing → answered transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BridgeSessionId(pub String);

impl std::fmt::Display for BridgeSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Call status enumeration.
///
/// Transitions are monotonic: ringing → answered → ended, or ringing → ended
/// directly on timeout or hangup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Call is fanning out to residents and waiting for an answer.
    Ringing,

    /// A resident answered; the voice bridge is up or being set up.
    Answered,

    /// Call is over (hangup, timeout, or provider-reported completion).
    Ended,
}

impl CallStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ringing => "ringing",
            CallStatus::Answered => "answered",
            CallStatus::Ended => "ended",
        }
    }

    /// Parse a status from its database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ringing" => Some(CallStatus::Ringing),
            "answered" => Some(CallStatus::Answered),
            "ended" => Some(CallStatus::Ended),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` is forward progress.
    ///
    /// Used by webhook reconciliation: provider callbacks may arrive out of
    /// order and must never regress an ended call.
    #[must_use]
    pub fn is_forward_progress(&self, next: CallStatus) -> bool {
        matches!(
            (self, next),
            (CallStatus::Ringing, CallStatus::Answered)
                | (CallStatus::Ringing, CallStatus::Ended)
                | (CallStatus::Answered, CallStatus::Ended)
        )
    }
}

/// Per-resident participation status within a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Resident was signaled and has not responded.
    Invited,

    /// Resident answered the call (at most one per call).
    Answered,

    /// Another resident answered first.
    Missed,
}

impl ParticipantStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Invited => "invited",
            ParticipantStatus::Answered => "answered",
            ParticipantStatus::Missed => "missed",
        }
    }

    /// Parse a status from its database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invited" => Some(ParticipantStatus::Invited),
            "answered" => Some(ParticipantStatus::Answered),
            "missed" => Some(ParticipantStatus::Missed),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_call_status_round_trip() {
        for status in [CallStatus::Ringing, CallStatus::Answered, CallStatus::Ended] {
            assert_eq!(CallStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CallStatus::parse("busy"), None);
    }

    #[test]
    fn test_status_never_regresses() {
        assert!(CallStatus::Ringing.is_forward_progress(CallStatus::Answered));
        assert!(CallStatus::Ringing.is_forward_progress(CallStatus::Ended));
        assert!(CallStatus::Answered.is_forward_progress(CallStatus::Ended));

        assert!(!CallStatus::Ended.is_forward_progress(CallStatus::Ringing));
        assert!(!CallStatus::Ended.is_forward_progress(CallStatus::Answered));
        assert!(!CallStatus::Answered.is_forward_progress(CallStatus::Ringing));
        assert!(!CallStatus::Ringing.is_forward_progress(CallStatus::Ringing));
    }

    #[test]
    fn test_participant_status_round_trip() {
        for status in [
            ParticipantStatus::Invited,
            ParticipantStatus::Answered,
            ParticipantStatus::Missed,
        ] {
            assert_eq!(ParticipantStatus::parse(status.as_str()), Some(status));
        }
    }
}
