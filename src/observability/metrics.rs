//! Metrics collection and exposition.
//!
//! # Metrics
//! - `backend_status_probes_total` (counter): probes by outcome
//! - `backend_status_probe_duration_seconds` (histogram): probe latency
//! - `backend_status_online` (gauge): 1=online, 0=offline
//! - `backend_status_consecutive_failures` (gauge): current failure streak
//! - `backend_status_next_probe_delay_seconds` (gauge): scheduled delay
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::probe::ProbeError;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_probe(outcome: &Result<(), ProbeError>, elapsed: Duration) {
    let label = match outcome {
        Ok(()) => "success",
        Err(e) => e.kind(),
    };
    counter!("backend_status_probes_total", "outcome" => label).increment(1);
    histogram!("backend_status_probe_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_availability(is_online: bool, consecutive_failures: u32) {
    gauge!("backend_status_online").set(if is_online { 1.0 } else { 0.0 });
    gauge!("backend_status_consecutive_failures").set(f64::from(consecutive_failures));
}

pub fn record_next_delay(delay: Duration) {
    gauge!("backend_status_next_probe_delay_seconds").set(delay.as_secs_f64());
}
