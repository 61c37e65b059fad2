//! Metrics collection and exposition.
//!
//! # Metrics
//! - `watch_backend_loop_iterations_total` (counter): worker loop iterations
//! - `watch_backend_workers_launched_total` (counter): launches by worker name
//! - `watch_backend_worker_exits_total` (counter): exits by worker name and outcome
//! - `watch_backend_registered_workers` (gauge): occupied registration slots
//!
//! Only the supervisor installs an exporter. In a worker process the macros
//! hit the no-op recorder.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_loop_iteration() {
    metrics::counter!("watch_backend_loop_iterations_total").increment(1);
}

pub fn record_worker_launched(worker: &str) {
    metrics::counter!("watch_backend_workers_launched_total", "worker" => worker.to_owned())
        .increment(1);
}

/// `outcome` is one of `clean`, `restartable` or `signaled`.
pub fn record_worker_exit(worker: &str, outcome: &'static str) {
    metrics::counter!(
        "watch_backend_worker_exits_total",
        "worker" => worker.to_owned(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn set_registered_workers(count: usize) {
    metrics::gauge!("watch_backend_registered_workers").set(count as f64);
}
