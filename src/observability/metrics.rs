//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, route
//! - `proxy_request_duration_seconds` (histogram): time to response head, by route
//! - `proxy_admission_in_flight` (gauge): admission permits held
//! - `proxy_admission_rejected_total` (counter): waits abandoned before a permit freed
//! - `proxy_upstream_errors_total` (counter): failed upstream exchanges by kind
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed exporter it is a no-op
//! - The Prometheus exporter serves its own HTTP listener, separate from proxied traffic

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within the tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "metrics endpoint listening");
    Ok(())
}

/// Record a finished request. `route` is the matched prefix, or "none".
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let route = route.to_string();
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.clone()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn admission_entered() {
    gauge!("proxy_admission_in_flight").increment(1.0);
}

pub fn admission_left() {
    gauge!("proxy_admission_in_flight").decrement(1.0);
}

pub fn record_admission_rejected() {
    counter!("proxy_admission_rejected_total").increment(1);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}
