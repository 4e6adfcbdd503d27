//! Prometheus metrics for the scheduler service.
//!
//! All metric names carry the `scheduler_` prefix. Label values are bounded:
//! - `capability`: ownable, participatable
//! - `outcome`: fixed per-metric vocabularies below
//! - `endpoint`: normalized, ids replaced with `{id}`
//! - `operation`: static repository operation names

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder and return the handle used to
/// serve `/metrics`.
///
/// # Errors
///
/// Returns error if a recorder is already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("scheduler_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("scheduler_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("scheduler_finalize_duration".to_string()),
            &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000],
        )
        .map_err(|e| format!("Failed to set finalize buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `scheduler_http_requests_total`, `scheduler_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("scheduler_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("scheduler_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Replace numeric path segments with `{id}` and fold unknown paths into
/// `/other`.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/metrics" | "/api/v1/meetings" | "/api/v1/users" => {
            return path.to_string()
        }
        _ => {}
    }

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["api", "v1", resource @ ("meetings" | "users"), id] if is_id(id) => {
            format!("/api/v1/{resource}/{{id}}")
        }
        ["api", "v1", "meetings", id, "finalize"] if is_id(id) => {
            "/api/v1/meetings/{id}/finalize".to_string()
        }
        _ => "/other".to_string(),
    }
}

fn is_id(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record a guard decision.
///
/// Metric: `scheduler_access_decisions_total`
/// Labels: `capability`, `outcome` (allowed, admin_bypass, denied,
/// unauthenticated, misconfigured)
pub fn record_access_decision(capability: &'static str, outcome: &'static str) {
    counter!("scheduler_access_decisions_total",
        "capability" => capability,
        "outcome" => outcome
    )
    .increment(1);
}

// ============================================================================
// Finalize Metrics
// ============================================================================

/// Record a finalize attempt.
///
/// Metric: `scheduler_finalize_total`, `scheduler_finalize_duration_seconds`
/// Labels: `outcome` (finalized, already_finalized, overlap, not_found,
/// participant_missing, denied, error)
pub fn record_finalize(outcome: &'static str, duration: Duration) {
    histogram!("scheduler_finalize_duration_seconds",
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());

    counter!("scheduler_finalize_total",
        "outcome" => outcome
    )
    .increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record a database query.
///
/// Metric: `scheduler_db_queries_total`, `scheduler_db_query_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("scheduler_db_query_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("scheduler_db_queries_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}
