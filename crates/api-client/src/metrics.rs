//! Client metrics
//!
//! Recorded through the `metrics` facade; the embedding binary decides whether
//! a recorder is installed. Without one every call is a no-op.
//!
//! - `client_requests_total` (counter): labels `status`, `method`
//! - `client_request_duration_seconds` (histogram): label `status`
//! - `client_token_refresh_total` (counter): label `outcome`
//! - `client_replayed_requests_total` (counter): label `outcome`

/// Record a finished call. `status` is the HTTP status, or the error kind when
/// no response arrived.
pub fn record_request(status: &str, method: &str, duration_secs: f64) {
    metrics::counter!(
        "client_requests_total",
        "status" => status.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
    metrics::histogram!("client_request_duration_seconds", "status" => status.to_string())
        .record(duration_secs);
}

/// Record the outcome of one refresh exchange (`success`, `rejected`, `network`).
pub fn record_refresh(outcome: &str) {
    metrics::counter!("client_token_refresh_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record one replayed call (`success`, `failure`, `rejected`).
pub fn record_replay(outcome: &str) {
    metrics::counter!("client_replayed_requests_total", "outcome" => outcome.to_string())
        .increment(1);
}
