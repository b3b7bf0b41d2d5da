//! Test server harness for end-to-end testing.
//!
//! Provides `TestCallServer` for spawning real call service instances in
//! tests: the full Axum router over the in-memory store, with the push
//! gateway and bridge provider mocked out.

use call_service::orchestrator::CallOrchestrator;
use call_service::routes::{self, AppState};
use call_service::services::{MockBridgeProvider, MockPushGateway};
use call_service::store::MemoryCallStore;
use call_service::tasks::NotifierRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default ring retry interval for test servers. Long enough that a test
/// asserting on first-round pushes never races a resend.
const TEST_RING_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Default ring timeout for test servers.
const TEST_RING_TIMEOUT: Duration = Duration::from_secs(45);

/// Test harness for spawning the call service in integration tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_start_call_e2e() -> Result<(), anyhow::Error> {
///     let server = TestCallServer::spawn().await?;
///     server.store().add_recipient(apartment_id, resident_id, "device-1");
///     server.store().add_call_context(apartment_id, "302", doorman_id, "Carlos");
///
///     let client = reqwest::Client::new();
///     let response = client
///         .post(format!("{}/api/v1/calls", server.url()))
///         .json(&body)
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 201);
///     Ok(())
/// }
/// ```
pub struct TestCallServer {
    addr: SocketAddr,
    store: Arc<MemoryCallStore>,
    push: Arc<MockPushGateway>,
    bridge: Arc<MockBridgeProvider>,
    registry: Arc<NotifierRegistry>,
    _handle: JoinHandle<()>,
}

impl TestCallServer {
    /// Spawn a test server with default ring timing.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind a local port.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_timing(TEST_RING_RETRY_INTERVAL, TEST_RING_TIMEOUT).await
    }

    /// Spawn a test server with explicit ring timing.
    ///
    /// The server binds to a random available port on 127.0.0.1 and runs
    /// until the harness is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind a local port.
    pub async fn spawn_with_timing(
        ring_retry_interval: Duration,
        ring_timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let store = Arc::new(MemoryCallStore::new());
        let push = Arc::new(MockPushGateway::accepting());
        let bridge = Arc::new(MockBridgeProvider::accepting());
        let registry = Arc::new(NotifierRegistry::new());

        let orchestrator = Arc::new(CallOrchestrator::new(
            store.clone(),
            push.clone(),
            bridge.clone(),
            registry.clone(),
            ring_retry_interval,
            ring_timeout,
        ));

        let state = Arc::new(AppState {
            store: store.clone(),
            orchestrator,
            pool: None,
            metrics_handle: None,
        });
        let app = routes::build_routes(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {e}"))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {e}"))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(target: "call_test_utils", error = %e, "Test server exited");
            }
        });

        Ok(Self {
            addr,
            store,
            push,
            bridge,
            registry,
            _handle: handle,
        })
    }

    /// Base URL of the running server.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The in-memory store, for seeding fixtures and inspecting rows.
    #[must_use]
    pub fn store(&self) -> &MemoryCallStore {
        &self.store
    }

    /// The mock push gateway, for asserting on sent signals.
    #[must_use]
    pub fn push(&self) -> &MockPushGateway {
        &self.push
    }

    /// The mock bridge provider, for asserting on bridge sessions.
    #[must_use]
    pub fn bridge(&self) -> &MockBridgeProvider {
        &self.bridge
    }

    /// The notifier registry, for asserting ring tasks were stopped.
    #[must_use]
    pub fn registry(&self) -> &NotifierRegistry {
        &self.registry
    }
}
