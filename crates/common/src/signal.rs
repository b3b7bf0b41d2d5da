//! Incoming-call push signal payload.
//!
//! This is the wire format the server fans out to resident devices and the
//! client session coordinator consumes, both on the foreground path and on
//! the background delivery hook. The shape must stay parseable by a fully
//! cold process, so it carries everything the native incoming-call UI needs.

use crate::types::CallId;
use serde::{Deserialize, Serialize};

/// Payload type tag for intercom call signals.
pub const SIGNAL_TYPE_INTERCOM_CALL: &str = "intercom_call";

/// Incoming-call signal delivered through the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSignal {
    /// Payload discriminator, always [`SIGNAL_TYPE_INTERCOM_CALL`].
    #[serde(rename = "type")]
    pub signal_type: String,

    /// Server-side call identifier; doubles as the client session identifier.
    pub call_id: CallId,

    /// Display name of the calling doorman.
    pub caller_name: String,

    /// Human-readable apartment label (e.g. "302", "Bloco B 101").
    pub apartment_label: String,

    /// Reference to the voice channel the call will use once answered.
    pub channel_ref: String,
}

impl CallSignal {
    /// Build a signal for a call.
    #[must_use]
    pub fn new(
        call_id: CallId,
        caller_name: impl Into<String>,
        apartment_label: impl Into<String>,
        channel_ref: impl Into<String>,
    ) -> Self {
        Self {
            signal_type: SIGNAL_TYPE_INTERCOM_CALL.to_string(),
            call_id,
            caller_name: caller_name.into(),
            apartment_label: apartment_label.into(),
            channel_ref: channel_ref.into(),
        }
    }

    /// Validate the payload shape.
    ///
    /// A signal must carry the intercom type tag, a caller name, and an
    /// apartment label. Anything else is dropped by the receiver.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.signal_type == SIGNAL_TYPE_INTERCOM_CALL
            && !self.caller_name.is_empty()
            && !self.apartment_label.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_serializes_with_type_tag() {
        let signal = CallSignal::new(CallId::new(), "Carlos", "302", "call-abc");
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["type"], "intercom_call");
        assert_eq!(json["apartment_label"], "302");
    }

    #[test]
    fn test_signal_validation() {
        let signal = CallSignal::new(CallId::new(), "Carlos", "302", "call-abc");
        assert!(signal.is_valid());

        let mut bad_type = signal.clone();
        bad_type.signal_type = "chat_message".to_string();
        assert!(!bad_type.is_valid());

        let mut no_caller = signal.clone();
        no_caller.caller_name.clear();
        assert!(!no_caller.is_valid());

        let mut no_label = signal;
        no_label.apartment_label.clear();
        assert!(!no_label.is_valid());
    }
}
