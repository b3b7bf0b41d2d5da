//! Metrics definitions for the call service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `call_` prefix for the call service
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `reason`: end reasons (answered, hangup, no_answer, provider)
//! - `status`: 2 values (success, error)
//! - `outcome`: webhook outcomes (applied, stale, unknown_session, invalid)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the Prometheus recorder fails to install (e.g., already
/// installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("call_ring".to_string()),
            &[1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0, 45.0, 60.0],
        )
        .map_err(|e| format!("Failed to set ring duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record a call being started.
///
/// Metric: `call_calls_started_total`
pub fn record_call_started() {
    counter!("call_calls_started_total").increment(1);
}

/// Record a call ending, with the reason and how long it rang.
///
/// Metric: `call_calls_ended_total`, `call_ring_duration_seconds`
/// Labels: `reason` (answered, hangup, no_answer)
pub fn record_call_ended(reason: &'static str, ring_duration: Duration) {
    counter!("call_calls_ended_total", "reason" => reason).increment(1);
    histogram!("call_ring_duration_seconds", "reason" => reason)
        .record(ring_duration.as_secs_f64());
}

/// Record one push delivery attempt.
///
/// Metric: `call_push_attempts_total`
/// Labels: `status` (success, error)
pub fn record_push_attempt(status: &'static str) {
    counter!("call_push_attempts_total", "status" => status).increment(1);
}

/// Record one bridge provider request.
///
/// Metric: `call_bridge_requests_total`
/// Labels: `operation` (bridge, teardown), `status` (success, error)
pub fn record_bridge_request(operation: &'static str, status: &'static str) {
    counter!("call_bridge_requests_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record a bridge status webhook outcome.
///
/// Metric: `call_webhooks_total`
/// Labels: `outcome` (applied, stale, unknown_session, invalid)
pub fn record_webhook(outcome: &'static str) {
    counter!("call_webhooks_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests execute the recording functions for coverage. With no
    // recorder installed the metrics crate falls back to a no-op recorder,
    // which is sufficient here.

    #[test]
    fn test_record_call_lifecycle_metrics() {
        record_call_started();
        record_call_ended("answered", Duration::from_secs(4));
        record_call_ended("no_answer", Duration::from_secs(45));
        record_call_ended("hangup", Duration::from_secs(12));
    }

    #[test]
    fn test_record_provider_metrics() {
        record_push_attempt("success");
        record_push_attempt("error");
        record_bridge_request("bridge", "success");
        record_bridge_request("teardown", "error");
    }

    #[test]
    fn test_record_webhook_outcomes() {
        record_webhook("applied");
        record_webhook("stale");
        record_webhook("unknown_session");
        record_webhook("invalid");
    }
}
