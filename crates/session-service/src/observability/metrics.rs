//! Metrics definitions for the session service
//!
//! All metrics follow Prometheus naming conventions:
//! - `session_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for durations
//!
//! # Cardinality
//!
//! - `status`: success, error, rejected, lost_race
//! - `reason`: the six refresh reasons plus `none`
//! - `error_category`: 4 values
//! - `operation`: bounded by code

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the global Prometheus recorder with a scrape endpoint on `addr`.
///
/// Can only succeed once per process. Must be called from within a Tokio
/// runtime.
pub fn install_metrics_exporter(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        // Issuance signs in-process; a store round trip only on rotation.
        .set_buckets_for_metric(
            Matcher::Prefix("session_access_token_issuance".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set issuance buckets: {e}"))?
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record access token issuance duration and outcome
///
/// Metric: `session_access_token_issuance_duration_seconds`,
/// `session_access_token_issuance_total`
/// Labels: `status`
pub fn record_token_issuance(status: &str, duration: Duration) {
    histogram!("session_access_token_issuance_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("session_access_token_issuance_total", "status" => status.to_string()).increment(1);
}

/// Record access token verification outcome
///
/// Metric: `session_access_token_validations_total`
/// Labels: `status`, `reason`
pub fn record_token_validation(status: &str, reason: Option<&str>) {
    let reason = reason.unwrap_or("none");
    counter!(
        "session_access_token_validations_total",
        "status" => status.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

// ============================================================================
// Key Management Metrics
// ============================================================================

/// Record a rotation attempt
///
/// Metric: `session_signing_key_rotations_total`
/// Labels: `status` (success, lost_race, error)
pub fn record_key_rotation(status: &str) {
    counter!("session_signing_key_rotations_total", "status" => status.to_string()).increment(1);
}

/// Metric: `session_signing_key_age_seconds`
pub fn set_signing_key_age_seconds(age_seconds: f64) {
    gauge!("session_signing_key_age_seconds").set(age_seconds);
}

/// Metric: `session_retired_signing_keys_purged_total`
pub fn record_retired_keys_purged(count: u64) {
    counter!("session_retired_signing_keys_purged_total").increment(count);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record an operational error
///
/// Metric: `session_errors_total`
/// Labels: `operation`, `error_category`
pub fn record_error(operation: &str, error_category: &str) {
    counter!(
        "session_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string()
    )
    .increment(1);
}
