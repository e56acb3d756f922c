//! Prometheus metrics for application observability.
//!
//! Metrics are exposed via a dedicated HTTP listener (default: `0.0.0.0:9090`).
//! Recording functions are no-ops until [`init_metrics`] installs the exporter,
//! so they are safe to call from tests.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `items_created_total` - Items created
//! - `items_deleted_total` - Items deleted
//! - `rate_limit_rejections_total` - Requests rejected with 429
//! - `auth_failures_total` - Requests rejected with 401 (label: reason = missing | invalid)
//!
//! ## Gauges
//! - `items_stored` - Items currently held by the store
//! - `rate_limit_tracked_clients` - Distinct client identities with a rate window

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const ITEMS_CREATED_TOTAL: &str = "items_created_total";
    pub const ITEMS_DELETED_TOTAL: &str = "items_deleted_total";
    pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "rate_limit_rejections_total";
    pub const AUTH_FAILURES_TOTAL: &str = "auth_failures_total";
    pub const ITEMS_STORED: &str = "items_stored";
    pub const RATE_LIMIT_TRACKED_CLIENTS: &str = "rate_limit_tracked_clients";
}

/// Initialize the Prometheus metrics exporter.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (e.g., port in use).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(names::ITEMS_CREATED_TOTAL, "Total number of items created");
    describe_counter!(names::ITEMS_DELETED_TOTAL, "Total number of items deleted");
    describe_counter!(
        names::RATE_LIMIT_REJECTIONS_TOTAL,
        "Total number of requests rejected by the rate limiter"
    );
    describe_counter!(
        names::AUTH_FAILURES_TOTAL,
        "Total number of requests rejected for a missing or invalid API key"
    );

    describe_gauge!(names::ITEMS_STORED, "Number of items currently stored");
    describe_gauge!(
        names::RATE_LIMIT_TRACKED_CLIENTS,
        "Number of client identities with a rate limit window"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

pub fn record_item_created() {
    counter!(names::ITEMS_CREATED_TOTAL).increment(1);
}

pub fn record_item_deleted() {
    counter!(names::ITEMS_DELETED_TOTAL).increment(1);
}

pub fn record_rate_limit_rejection() {
    counter!(names::RATE_LIMIT_REJECTIONS_TOTAL).increment(1);
}

/// Record an authentication failure; `reason` is `"missing"` or `"invalid"`.
pub fn record_auth_failure(reason: &'static str) {
    counter!(names::AUTH_FAILURES_TOTAL, "reason" => reason).increment(1);
}

pub fn set_items_stored(count: usize) {
    gauge!(names::ITEMS_STORED).set(count as f64);
}

pub fn set_tracked_clients(count: usize) {
    gauge!(names::RATE_LIMIT_TRACKED_CLIENTS).set(count as f64);
}
