//! Voice bridge provider HTTP client.
//!
//! Once a resident answers, the orchestrator asks the provider to bridge the
//! doorman's intercom leg with the resident's device leg. Bridge failures are
//! non-fatal to signaling state: the call stays `answered` and the parties can
//! retry, so callers log the error and proceed.
//!
//! # Security
//!
//! - Provider token sent as a bearer credential, never logged
//! - Timeouts prevent hanging connections

use crate::errors::CallError;
use common::types::BridgeSessionId;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, instrument, warn};

/// Default timeout for provider requests in seconds.
const BRIDGE_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Request body for the provider's bridge endpoint.
#[derive(Debug, Clone, Serialize)]
struct BridgeRequest<'a> {
    /// Doorman's voice channel reference.
    party_a: &'a str,

    /// Resident's voice channel reference.
    party_b: &'a str,
}

/// Response from the provider's bridge endpoint.
#[derive(Debug, Clone, Deserialize)]
struct BridgeResponse {
    /// Provider-assigned session identifier.
    bridge_session_id: String,
}

/// Voice bridge provider.
#[async_trait::async_trait]
pub trait BridgeProvider: Send + Sync {
    /// Bridge two voice legs, returning the provider session identifier.
    async fn request_bridge(
        &self,
        party_a: &str,
        party_b: &str,
    ) -> Result<BridgeSessionId, CallError>;

    /// Tear a bridge session down.
    async fn teardown_bridge(&self, bridge_session_id: &BridgeSessionId)
        -> Result<(), CallError>;
}

/// HTTP client for the voice bridge provider.
#[derive(Clone)]
pub struct HttpBridgeProvider {
    /// HTTP client with configured timeouts.
    client: Client,

    /// Base URL for the provider API.
    base_url: String,

    /// Provider API token.
    token: String,
}

impl HttpBridgeProvider {
    /// Create a new bridge provider client.
    ///
    /// # Errors
    ///
    /// Returns `CallError::Internal` if the HTTP client cannot be built.
    pub fn new(base_url: String, token: String) -> Result<Self, CallError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(BRIDGE_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "call.services.bridge_client", error = %e, "Failed to build HTTP client");
                CallError::Internal
            })?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }
}

#[async_trait::async_trait]
impl BridgeProvider for HttpBridgeProvider {
    #[instrument(skip_all)]
    async fn request_bridge(
        &self,
        party_a: &str,
        party_b: &str,
    ) -> Result<BridgeSessionId, CallError> {
        let url = format!("{}/api/v1/bridges", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&BridgeRequest { party_a, party_b })
            .send()
            .await
            .map_err(|e| {
                warn!(target: "call.services.bridge_client", error = %e, "Bridge request failed");
                CallError::BridgeProvider("Bridge provider is unavailable".to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            let body: BridgeResponse = response.json().await.map_err(|e| {
                error!(target: "call.services.bridge_client", error = %e, "Failed to parse provider response");
                CallError::BridgeProvider("Invalid provider response".to_string())
            })?;
            Ok(BridgeSessionId(body.bridge_session_id))
        } else {
            warn!(target: "call.services.bridge_client", status = %status, "Provider rejected bridge request");
            Err(CallError::BridgeProvider(format!(
                "Bridge provider returned {status}"
            )))
        }
    }

    #[instrument(skip_all)]
    async fn teardown_bridge(
        &self,
        bridge_session_id: &BridgeSessionId,
    ) -> Result<(), CallError> {
        let url = format!(
            "{}/api/v1/bridges/{}",
            self.base_url, bridge_session_id.0
        );

        let response = self
            .client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| {
                warn!(target: "call.services.bridge_client", error = %e, "Bridge teardown failed");
                CallError::BridgeProvider("Bridge provider is unavailable".to_string())
            })?;

        let status = response.status();
        // 404 means the session already ended provider-side; treat as done.
        if status.is_success() || status.as_u16() == 404 {
            Ok(())
        } else {
            warn!(target: "call.services.bridge_client", status = %status, "Provider rejected teardown");
            Err(CallError::BridgeProvider(format!(
                "Bridge provider returned {status}"
            )))
        }
    }
}

/// Mock bridge provider for testing.
pub mod mock {

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock bridge provider that hands out sequential session ids.
    pub struct MockBridgeProvider {
        /// Bridges requested, as (party_a, party_b) pairs.
        bridged: Mutex<Vec<(String, String)>>,
        /// Sessions torn down.
        torn_down: Mutex<Vec<BridgeSessionId>>,
        /// Number of bridge requests made.
        call_count: AtomicUsize,
        /// Whether to return errors.
        return_error: bool,
    }

    impl MockBridgeProvider {
        /// Create a mock that accepts every request.
        pub fn accepting() -> Self {
            Self {
                bridged: Mutex::new(Vec::new()),
                torn_down: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                return_error: false,
            }
        }

        /// Create a mock that fails every request.
        pub fn failing() -> Self {
            Self {
                bridged: Mutex::new(Vec::new()),
                torn_down: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                return_error: true,
            }
        }

        /// Get the number of bridge requests made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Get the bridged pairs recorded so far.
        pub fn bridged(&self) -> Vec<(String, String)> {
            self.bridged.lock().map(|b| b.clone()).unwrap_or_default()
        }

        /// Get the sessions torn down so far.
        pub fn torn_down(&self) -> Vec<BridgeSessionId> {
            self.torn_down.lock().map(|t| t.clone()).unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl BridgeProvider for MockBridgeProvider {
        async fn request_bridge(
            &self,
            party_a: &str,
            party_b: &str,
        ) -> Result<BridgeSessionId, CallError> {
            let count = self.call_count.fetch_add(1, Ordering::SeqCst);

            if self.return_error {
                return Err(CallError::BridgeProvider(
                    "Mock bridge provider error".to_string(),
                ));
            }

            if let Ok(mut bridged) = self.bridged.lock() {
                bridged.push((party_a.to_string(), party_b.to_string()));
            }
            Ok(BridgeSessionId(format!("BS-mock-{count}")))
        }

        async fn teardown_bridge(
            &self,
            bridge_session_id: &BridgeSessionId,
        ) -> Result<(), CallError> {
            if self.return_error {
                return Err(CallError::BridgeProvider(
                    "Mock bridge provider error".to_string(),
                ));
            }

            if let Ok(mut torn_down) = self.torn_down.lock() {
                torn_down.push(bridge_session_id.clone());
            }
            Ok(())
        }
    }
}
