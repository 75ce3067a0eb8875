//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): requests by method, status, route
//! - `router_request_duration_seconds` (histogram): end-to-end latency
//! - `router_match_total` (counter): match outcomes by kind and memo hit or miss
//! - `router_meta_cache_total` (counter): meta tier lookups by tier and outcome
//! - `delivery_responses_total` (counter): file responses by kind and status
//! - `transcode_duration_seconds` (histogram): image transcode latency by format
//! - `rate_limited_total` (counter): requests rejected by `rate_limit`
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::Label;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
        Label::new("route", route.to_string()),
    ];
    ::metrics::counter!("router_requests_total", labels.clone()).increment(1);
    ::metrics::histogram!("router_request_duration_seconds", labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_match(kind: &'static str, memoized: bool) {
    let cached = if memoized { "hit" } else { "miss" };
    ::metrics::counter!("router_match_total", "kind" => kind, "cached" => cached).increment(1);
}

pub fn record_meta_cache(tier: &'static str, outcome: &'static str) {
    ::metrics::counter!("router_meta_cache_total", "tier" => tier, "outcome" => outcome).increment(1);
}

pub fn record_delivery(kind: &'static str, status: u16) {
    ::metrics::counter!("delivery_responses_total", "kind" => kind, "status" => status.to_string())
        .increment(1);
}

pub fn record_transcode(format: &'static str, start: Instant) {
    ::metrics::histogram!("transcode_duration_seconds", "format" => format)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    ::metrics::counter!("rate_limited_total").increment(1);
}
