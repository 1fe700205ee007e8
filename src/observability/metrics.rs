//! Metrics collection and exposition.
//!
//! # Metrics
//! - `flaglevel_events_total` (counter): lifecycle events handled, by kind
//! - `flaglevel_transitions_total` (counter): level changes applied, by target level
//! - `flaglevel_resolution_failures_total` (counter): failed resolutions, by flag
//! - `flaglevel_sink_failures_total` (counter): failed sink updates, by sink
//! - `flaglevel_current_level` (gauge): severity of the active level, 0=error .. 6=silly
//!
//! Recording is a no-op until [`init_metrics`] installs an exporter.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::flag::FlagEvent;
use crate::level::LogLevel;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

pub fn record_event(event: FlagEvent) {
    counter!("flaglevel_events_total", "kind" => event.as_str()).increment(1);
}

pub fn record_transition(to: LogLevel) {
    counter!("flaglevel_transitions_total", "to" => to.as_str()).increment(1);
    record_current_level(to);
}

pub fn record_current_level(level: LogLevel) {
    gauge!("flaglevel_current_level").set(f64::from(level.severity()));
}

pub fn record_resolution_failure(flag: &str) {
    counter!("flaglevel_resolution_failures_total", "flag" => flag.to_string()).increment(1);
}

pub fn record_sink_failure(sink: &str) {
    counter!("flaglevel_sink_failures_total", "sink" => sink.to_string()).increment(1);
}
