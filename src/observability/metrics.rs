//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dynamic_config_reloads_total` (counter): attempts by site, status
//! - `dynamic_config_reload_duration_seconds` (histogram): end-to-end attempt latency
//! - `dynamic_config_validation_duration_seconds` (histogram): checker runtime by outcome
//! - `dynamic_config_reloads_in_flight` (gauge): attempts currently running
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Prometheus listener is optional and configured separately from the API

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to start metrics exporter: {0}")]
pub struct MetricsError(String);

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError(e.to_string()))?;

    describe_counter!(
        "dynamic_config_reloads_total",
        "Reload attempts by site and response status"
    );
    describe_histogram!(
        "dynamic_config_reload_duration_seconds",
        "Reload attempt duration in seconds"
    );
    describe_histogram!(
        "dynamic_config_validation_duration_seconds",
        "External validator runtime in seconds"
    );
    describe_gauge!(
        "dynamic_config_reloads_in_flight",
        "Reload attempts currently in progress"
    );

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished reload attempt.
pub fn record_reload(site: &str, status: u16, start: Instant) {
    counter!(
        "dynamic_config_reloads_total",
        "site" => site.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "dynamic_config_reload_duration_seconds",
        "site" => site.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one validator run.
pub fn record_validation(outcome: &'static str, start: Instant) {
    histogram!(
        "dynamic_config_validation_duration_seconds",
        "outcome" => outcome
    )
    .record(start.elapsed().as_secs_f64());
}

/// Tracks one in-flight attempt for as long as it is held.
pub struct InFlightGuard(());

impl InFlightGuard {
    pub fn enter() -> Self {
        gauge!("dynamic_config_reloads_in_flight").increment(1.0);
        Self(())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("dynamic_config_reloads_in_flight").decrement(1.0);
    }
}
