//! Token authority metrics
//!
//! Enable with the `metrics` feature flag. Requires a `metrics` recorder
//! to be installed (e.g., via `metrics-exporter-prometheus`).
//!
//! ## Metrics Provided
//!
//! - `warden_tokens_issued_total` - Counter for issued tokens (labels: operation)
//! - `warden_token_validations_total` - Counter for validations (labels: status, reason)
//! - `warden_token_refreshes_total` - Counter for refreshes (labels: status, reason)
//! - `warden_token_revocations_total` - Counter for blocklist inserts (labels: reason)
//! - `warden_token_validation_duration_seconds` - Histogram for validation time

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static INIT: Once = Once::new();

/// Initialize metric descriptions. Call once at startup.
///
/// This function is idempotent - it's safe to call multiple times.
#[cfg(feature = "metrics")]
pub fn init_metrics() {
    INIT.call_once(|| {
        describe_counter!("warden_tokens_issued_total", "Total tokens issued");
        describe_counter!(
            "warden_token_validations_total",
            "Total token validations (success and failure)"
        );
        describe_counter!(
            "warden_token_refreshes_total",
            "Total refresh attempts (success and failure)"
        );
        describe_counter!(
            "warden_token_revocations_total",
            "Total token ids added to the blocklist"
        );
        describe_histogram!(
            "warden_token_validation_duration_seconds",
            "Token validation duration in seconds"
        );
    });
}

/// Record an issued token (`operation` is "issue" or "refresh")
#[cfg(feature = "metrics")]
pub(crate) fn record_issued(operation: &'static str) {
    counter!("warden_tokens_issued_total", "operation" => operation).increment(1);
}

/// Record a validation outcome; `reason` is the error kind or "ok"
#[cfg(feature = "metrics")]
pub(crate) fn record_validation(reason: &'static str, duration_seconds: f64) {
    let status = if reason == "ok" { "success" } else { "failure" };
    counter!(
        "warden_token_validations_total",
        "status" => status,
        "reason" => reason
    )
    .increment(1);
    histogram!("warden_token_validation_duration_seconds").record(duration_seconds);
}

/// Record a refresh outcome; `reason` is the error kind or "ok"
#[cfg(feature = "metrics")]
pub(crate) fn record_refresh(reason: &'static str) {
    let status = if reason == "ok" { "success" } else { "failure" };
    counter!(
        "warden_token_refreshes_total",
        "status" => status,
        "reason" => reason
    )
    .increment(1);
}

/// Record a blocklist insert
#[cfg(feature = "metrics")]
pub(crate) fn record_revocation(reason: &'static str) {
    counter!("warden_token_revocations_total", "reason" => reason).increment(1);
}

// No-op versions when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
#[allow(missing_docs)]
pub fn init_metrics() {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_issued(_operation: &'static str) {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_validation(_reason: &'static str, _duration_seconds: f64) {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_refresh(_reason: &'static str) {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_revocation(_reason: &'static str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_idempotent() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_record_functions_do_not_panic() {
        init_metrics();
        record_issued("issue");
        record_validation("ok", 0.0001);
        record_validation("expired", 0.0002);
        record_refresh("revoked");
        record_revocation("logout");
    }
}
