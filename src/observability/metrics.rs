//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sipcfg_commits_total` (counter): commits by outcome (ok, rejected, vetoed)
//! - `sipcfg_generations_live` (gauge): generations not yet freed
//! - `sipcfg_generations_freed_total` (counter): generations released
//! - `sipcfg_log_nodes_live` (gauge): callback log nodes not yet reclaimed
//! - `sipcfg_callbacks_fired_total` (counter): per-worker callbacks executed
//! - `sipcfg_workers_attached` (gauge): cursors currently attached
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Prometheus exporter is optional and owned by the daemon binary

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_commit(outcome: &'static str) {
    counter!("sipcfg_commits_total", "outcome" => outcome).increment(1);
}

pub fn record_generations_live(live: usize) {
    gauge!("sipcfg_generations_live").set(live as f64);
}

pub fn record_generation_freed() {
    counter!("sipcfg_generations_freed_total").increment(1);
}

pub fn record_log_nodes_live(live: usize) {
    gauge!("sipcfg_log_nodes_live").set(live as f64);
}

pub fn record_callback_fired(group: &str) {
    counter!("sipcfg_callbacks_fired_total", "group" => group.to_string()).increment(1);
}

pub fn record_workers_attached(attached: usize) {
    gauge!("sipcfg_workers_attached").set(attached as f64);
}
