//! Observability setup for the call service.

pub mod metrics;
