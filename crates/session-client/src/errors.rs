//! Session client error types.

use thiserror::Error;

/// Errors raised by the session coordinator and its collaborators.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An operation required an active session and none exists.
    #[error("No active call session")]
    NoActiveSession,

    /// The session is not in a phase that permits the operation.
    #[error("Invalid phase for this action: {actual}")]
    InvalidPhase {
        /// Current phase, as its wire string.
        actual: &'static str,
    },

    /// Persisted session storage failed.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Server notification failed. Retried best-effort; local state is
    /// never rolled back because of this.
    #[error("Control plane error: {0}")]
    ControlPlane(String),

    /// The coordinator task has exited and its channel is closed.
    #[error("Coordinator is closed")]
    CoordinatorClosed,
}
