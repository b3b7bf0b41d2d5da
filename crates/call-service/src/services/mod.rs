//! Service layer for the call service.
//!
//! This module contains clients that talk to external providers on behalf of
//! the orchestrator and the ring notifier.
//!
//! # Components
//!
//! - `push_client` - HTTP client for the push gateway (signal delivery)
//! - `bridge_client` - HTTP client for the voice bridge provider

pub mod bridge_client;
pub mod push_client;

pub use bridge_client::{BridgeProvider, HttpBridgeProvider};
pub use push_client::{HttpPushGateway, PushGateway};
// Mocks exposed for integration tests
#[allow(unused_imports)]
pub use bridge_client::mock::MockBridgeProvider;
#[allow(unused_imports)]
pub use push_client::mock::MockPushGateway;
