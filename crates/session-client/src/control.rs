//! Control-plane client: device-to-server call notifications.
//!
//! Notifications are best-effort and never gate local UI transitions. The
//! coordinator retries answer notification in the background and fires
//! hangup notification once, absorbing failures.

use crate::errors::SessionError;
use common::types::{CallId, CallStatus, ResidentId};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, instrument, warn};

/// Default timeout for control-plane requests in seconds.
const CONTROL_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Server-side call operations the client invokes.
#[async_trait::async_trait]
pub trait ControlClient: Send + Sync {
    /// Tell the server this resident answered the call.
    async fn notify_answer(
        &self,
        call_id: CallId,
        resident_id: ResidentId,
    ) -> Result<(), SessionError>;

    /// Tell the server the call ended on this device.
    async fn notify_hangup(&self, call_id: CallId) -> Result<(), SessionError>;

    /// Fetch the server-side call status (remote-hangup detection).
    async fn fetch_status(&self, call_id: CallId) -> Result<CallStatus, SessionError>;
}

#[derive(Debug, Serialize)]
struct AnswerBody {
    resident_id: ResidentId,
}

/// HTTP control-plane client against the call service API.
#[derive(Clone)]
pub struct HttpControlClient {
    client: Client,
    base_url: String,
}

impl HttpControlClient {
    /// Create a control client.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ControlPlane` if the HTTP client cannot be
    /// built.
    pub fn new(base_url: String) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(CONTROL_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "session.control", error = %e, "Failed to build HTTP client");
                SessionError::ControlPlane(e.to_string())
            })?;

        Ok(Self { client, base_url })
    }

    async fn check(&self, response: reqwest::Response) -> Result<(), SessionError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            warn!(target: "session.control", status = %status, "Server rejected notification");
            Err(SessionError::ControlPlane(format!(
                "server returned {status}"
            )))
        }
    }
}

#[async_trait::async_trait]
impl ControlClient for HttpControlClient {
    #[instrument(skip_all, fields(call_id = %call_id))]
    async fn notify_answer(
        &self,
        call_id: CallId,
        resident_id: ResidentId,
    ) -> Result<(), SessionError> {
        let url = format!("{}/api/v1/calls/{}/answer", self.base_url, call_id);
        let response = self
            .client
            .post(&url)
            .json(&AnswerBody { resident_id })
            .send()
            .await
            .map_err(|e| SessionError::ControlPlane(e.to_string()))?;
        self.check(response).await
    }

    #[instrument(skip_all, fields(call_id = %call_id))]
    async fn notify_hangup(&self, call_id: CallId) -> Result<(), SessionError> {
        let url = format!("{}/api/v1/calls/{}/hangup", self.base_url, call_id);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| SessionError::ControlPlane(e.to_string()))?;
        self.check(response).await
    }

    #[instrument(skip_all, fields(call_id = %call_id))]
    async fn fetch_status(&self, call_id: CallId) -> Result<CallStatus, SessionError> {
        let url = format!("{}/api/v1/calls/{}", self.base_url, call_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SessionError::ControlPlane(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::ControlPlane(format!(
                "server returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SessionError::ControlPlane(e.to_string()))?;
        body.get("status")
            .and_then(Value::as_str)
            .and_then(CallStatus::parse)
            .ok_or_else(|| SessionError::ControlPlane("missing status in response".to_string()))
    }
}

/// Mock control client for testing.
pub mod mock {

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock control client that records notifications.
    pub struct MockControlClient {
        answers: Mutex<Vec<(CallId, ResidentId)>>,
        hangups: Mutex<Vec<CallId>>,
        /// Number of answer attempts (including failed ones).
        answer_attempts: AtomicUsize,
        /// Fail this many answer attempts before succeeding.
        fail_first_answers: usize,
        /// Whether every request fails.
        return_error: bool,
        /// Status reported by fetch_status.
        status: Mutex<CallStatus>,
    }

    impl MockControlClient {
        /// Create a mock that accepts everything.
        pub fn accepting() -> Self {
            Self {
                answers: Mutex::new(Vec::new()),
                hangups: Mutex::new(Vec::new()),
                answer_attempts: AtomicUsize::new(0),
                fail_first_answers: 0,
                return_error: false,
                status: Mutex::new(CallStatus::Ringing),
            }
        }

        /// Create a mock that fails everything.
        pub fn failing() -> Self {
            Self {
                return_error: true,
                ..Self::accepting()
            }
        }

        /// Create a mock whose first `n` answer attempts fail.
        pub fn failing_first_answers(n: usize) -> Self {
            Self {
                fail_first_answers: n,
                ..Self::accepting()
            }
        }

        /// Set the status reported by `fetch_status`.
        pub fn set_status(&self, status: CallStatus) {
            if let Ok(mut slot) = self.status.lock() {
                *slot = status;
            }
        }

        /// Successful answer notifications.
        pub fn answers(&self) -> Vec<(CallId, ResidentId)> {
            self.answers.lock().map(|a| a.clone()).unwrap_or_default()
        }

        /// Successful hangup notifications.
        pub fn hangups(&self) -> Vec<CallId> {
            self.hangups.lock().map(|h| h.clone()).unwrap_or_default()
        }

        /// Total answer attempts, successful or not.
        pub fn answer_attempts(&self) -> usize {
            self.answer_attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ControlClient for MockControlClient {
        async fn notify_answer(
            &self,
            call_id: CallId,
            resident_id: ResidentId,
        ) -> Result<(), SessionError> {
            let attempt = self.answer_attempts.fetch_add(1, Ordering::SeqCst);
            if self.return_error || attempt < self.fail_first_answers {
                return Err(SessionError::ControlPlane(
                    "Mock control client error".to_string(),
                ));
            }
            if let Ok(mut answers) = self.answers.lock() {
                answers.push((call_id, resident_id));
            }
            Ok(())
        }

        async fn notify_hangup(&self, call_id: CallId) -> Result<(), SessionError> {
            if self.return_error {
                return Err(SessionError::ControlPlane(
                    "Mock control client error".to_string(),
                ));
            }
            if let Ok(mut hangups) = self.hangups.lock() {
                hangups.push(call_id);
            }
            Ok(())
        }

        async fn fetch_status(&self, _call_id: CallId) -> Result<CallStatus, SessionError> {
            if self.return_error {
                return Err(SessionError::ControlPlane(
                    "Mock control client error".to_string(),
                ));
            }
            Ok(self
                .status
                .lock()
                .map(|s| *s)
                .unwrap_or(CallStatus::Ringing))
        }
    }
}
