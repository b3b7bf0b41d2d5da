//! Call service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients are intentionally generic to avoid
//! leaking internal details. Actual errors are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Call service error type.
///
/// Maps to appropriate HTTP status codes:
/// - Database, Internal: 500 Internal Server Error
/// - NotFound: 404 Not Found
/// - CallAlreadyActive, CallNotRinging: 409 Conflict
/// - NoRecipients: 422 Unprocessable Entity
/// - BadRequest: 400 Bad Request
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The apartment already has a ringing call.
    #[error("Apartment already has an active call")]
    CallAlreadyActive,

    /// The call is not in the ringing state (answer race lost, or a
    /// transition attempted on a finished call).
    #[error("Call is not ringing")]
    CallNotRinging,

    /// No resident of the apartment has a usable push address.
    #[error("No reachable recipients for apartment")]
    NoRecipients,

    /// Push gateway delivery failure. Never surfaced to API clients; the
    /// notifier logs it and keeps retrying.
    #[error("Push gateway error: {0}")]
    PushGateway(String),

    /// Bridge provider failure. Non-fatal to signaling state: answer and
    /// hangup log it and proceed.
    #[error("Bridge provider error: {0}")]
    BridgeProvider(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl CallError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            CallError::Database(_)
            | CallError::PushGateway(_)
            | CallError::BridgeProvider(_)
            | CallError::Internal => 500,
            CallError::NotFound(_) => 404,
            CallError::CallAlreadyActive | CallError::CallNotRinging => 409,
            CallError::NoRecipients => 422,
            CallError::BadRequest(_) => 400,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for CallError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            CallError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "call.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            CallError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            CallError::CallAlreadyActive => (
                StatusCode::CONFLICT,
                "CALL_ALREADY_ACTIVE",
                "This apartment already has a call in progress".to_string(),
            ),
            CallError::CallNotRinging => (
                StatusCode::CONFLICT,
                "CALL_NOT_RINGING",
                "Call is not available for this action".to_string(),
            ),
            CallError::NoRecipients => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "NO_RECIPIENTS",
                "No one can be reached in this apartment".to_string(),
            ),
            CallError::PushGateway(err) | CallError::BridgeProvider(err) => {
                tracing::error!(target: "call.provider", error = %err, "Provider operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PROVIDER_ERROR",
                    "An internal provider error occurred".to_string(),
                )
            }
            CallError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            CallError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for CallError {
    fn from(err: sqlx::Error) -> Self {
        CallError::Database(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(CallError::NoRecipients.status_code(), 422);
        assert_eq!(CallError::CallAlreadyActive.status_code(), 409);
        assert_eq!(CallError::CallNotRinging.status_code(), 409);
        assert_eq!(CallError::NotFound("x".into()).status_code(), 404);
        assert_eq!(CallError::Database("x".into()).status_code(), 500);
        assert_eq!(CallError::BadRequest("x".into()).status_code(), 400);
    }

    #[test]
    fn test_database_error_message_is_generic() {
        let response = CallError::Database("password=hunter2".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
