//! Push gateway HTTP client for call signal delivery.
//!
//! The gateway fans a data push out to a single device address; the ring
//! notifier calls this once per participant per retry tick. Delivery is
//! best-effort: a failed send is logged and retried on the next tick, never
//! surfaced to API clients.
//!
//! # Security
//!
//! - Device addresses are never logged
//! - Timeouts prevent hanging connections

use crate::errors::CallError;
use common::signal::CallSignal;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, instrument, warn};

/// Default timeout for push gateway requests in seconds.
const PUSH_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Request body for the gateway's send endpoint.
#[derive(Debug, Clone, Serialize)]
struct PushSendRequest<'a> {
    /// Opaque device push address.
    device_address: &'a str,

    /// Data payload delivered to the device.
    payload: &'a CallSignal,
}

/// Push gateway for delivering call signals to resident devices.
#[async_trait::async_trait]
pub trait PushGateway: Send + Sync {
    /// Deliver a call signal to one device address.
    async fn send_signal(&self, device_address: &str, signal: &CallSignal)
        -> Result<(), CallError>;
}

/// HTTP client for the push gateway.
#[derive(Clone)]
pub struct HttpPushGateway {
    /// HTTP client with configured timeouts.
    client: Client,

    /// Base URL for the push gateway.
    base_url: String,
}

impl HttpPushGateway {
    /// Create a new push gateway client.
    ///
    /// # Errors
    ///
    /// Returns `CallError::Internal` if the HTTP client cannot be built.
    pub fn new(base_url: String) -> Result<Self, CallError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PUSH_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "call.services.push_client", error = %e, "Failed to build HTTP client");
                CallError::Internal
            })?;

        Ok(Self { client, base_url })
    }
}

#[async_trait::async_trait]
impl PushGateway for HttpPushGateway {
    #[instrument(skip_all, fields(call_id = %signal.call_id))]
    async fn send_signal(
        &self,
        device_address: &str,
        signal: &CallSignal,
    ) -> Result<(), CallError> {
        let url = format!("{}/api/v1/push/send", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&PushSendRequest {
                device_address,
                payload: signal,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(target: "call.services.push_client", error = %e, "Push gateway request failed");
                CallError::PushGateway("Push gateway is unavailable".to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            warn!(target: "call.services.push_client", status = %status, "Push gateway rejected send");
            Err(CallError::PushGateway(format!(
                "Push gateway returned {status}"
            )))
        }
    }
}

/// Mock push gateway for testing.
pub mod mock {

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock push gateway that records deliveries in memory.
    pub struct MockPushGateway {
        /// Signals delivered, in order, with their target addresses.
        sent: Mutex<Vec<(String, CallSignal)>>,
        /// Number of calls made.
        call_count: AtomicUsize,
        /// Whether to return errors.
        return_error: bool,
    }

    impl MockPushGateway {
        /// Create a mock that accepts every send.
        pub fn accepting() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                return_error: false,
            }
        }

        /// Create a mock that fails every send.
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                return_error: true,
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Get the deliveries recorded so far.
        pub fn sent(&self) -> Vec<(String, CallSignal)> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl PushGateway for MockPushGateway {
        async fn send_signal(
            &self,
            device_address: &str,
            signal: &CallSignal,
        ) -> Result<(), CallError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if self.return_error {
                return Err(CallError::PushGateway(
                    "Mock push gateway error".to_string(),
                ));
            }

            if let Ok(mut sent) = self.sent.lock() {
                sent.push((device_address.to_string(), signal.clone()));
            }
            Ok(())
        }
    }
}
