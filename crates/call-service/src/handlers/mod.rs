//! HTTP handlers for the call service.

pub mod calls;
pub mod health;
pub mod metrics;
pub mod webhook;

pub use calls::{answer_call, get_call, hangup_call, start_call};
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use webhook::bridge_status_webhook;
