//! Test utilities for call service integration tests.
//!
//! Provides `TestCallServer` for spawning real call service instances in
//! tests, backed by the in-memory store and mock providers.

pub mod server_harness;

pub use server_harness::TestCallServer;
