//! Prometheus metrics exposition
//!
//! - `token_manager_requests_total` (counter): labels `status`, `method`
//! - `token_manager_request_duration_seconds` (histogram): label `status`
//! - `token_manager_token_exchanges_total` (counter): label `outcome`
//! - `token_manager_logins_total` (counter): label `outcome`, recorded by
//!   the session manager

use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::{Instrument, debug, info_span};

const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("token_manager_request_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The request duration histogram gets explicit buckets so it renders
/// `_bucket` lines rather than a summary.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed request with status code and HTTP method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("token_manager_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!("token_manager_request_duration_seconds", "status" => status_str)
        .record(duration_secs);
}

/// Record the outcome of an authorization code exchange.
pub fn record_exchange(outcome: &'static str) {
    metrics::counter!("token_manager_token_exchanges_total", "outcome" => outcome).increment(1);
}

/// Route template for logging. Token paths carry the access token itself,
/// which must never reach logs.
fn loggable_path(path: &str) -> &str {
    if path.starts_with("/api/token/") {
        if path.ends_with("/remark") {
            "/api/token/{token}/remark"
        } else {
            "/api/token/{token}"
        }
    } else {
        path
    }
}

/// Per-request middleware: assigns a request id, opens a tracing span,
/// records metrics and echoes the id in `x-request-id`.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let method = request.method().to_string();
    let path = loggable_path(request.uri().path()).to_owned();
    let span = info_span!("request", %request_id, %method, %path);
    let started = Instant::now();

    let mut response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    let elapsed = started.elapsed().as_secs_f64();
    record_request(status, &method, elapsed);
    span.in_scope(|| debug!(status, duration_secs = elapsed, "request completed"));

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
