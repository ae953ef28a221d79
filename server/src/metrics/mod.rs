//! Prometheus metrics export
//!
//! Provides metrics endpoint for monitoring and alerting

use std::sync::atomic::{AtomicU64, Ordering};

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Prometheus metrics recorder
static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Terminal sessions currently connected
static ACTIVE_TERMINALS: AtomicU64 = AtomicU64::new(0);

/// Initialize metrics system
pub fn init_metrics() -> anyhow::Result<()> {
    METRICS_HANDLE.get_or_try_init(|| {
        PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("dockhand_exec_connect_seconds".to_string()),
                &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )?
            .install_recorder()
            .map_err(anyhow::Error::from)
    })?;
    Ok(())
}

/// Record a terminal session reaching Connected
pub fn record_terminal_opened(connect_secs: f64) {
    counter!("dockhand_terminals_opened_total").increment(1);
    histogram!("dockhand_exec_connect_seconds").record(connect_secs);
    ACTIVE_TERMINALS.fetch_add(1, Ordering::Relaxed);
    gauge!("dockhand_active_terminals").increment(1.0);
}

/// Record a failed connect attempt
pub fn record_terminal_failed(reason: &'static str) {
    counter!("dockhand_terminals_failed_total", "reason" => reason).increment(1);
}

/// Record a terminal session leaving Connected
pub fn record_terminal_ended(outcome: &'static str) {
    counter!("dockhand_terminals_ended_total", "outcome" => outcome).increment(1);
    // the gauge follows the counter, which never drops below zero
    if release_one(&ACTIVE_TERMINALS) {
        gauge!("dockhand_active_terminals").decrement(1.0);
    }
}

/// Decrement a count unless it is already zero
fn release_one(count: &AtomicU64) -> bool {
    count
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
}

/// Record bytes drained from exec output streams
pub fn record_output_bytes(bytes: usize) {
    counter!("dockhand_exec_output_bytes_total").increment(bytes as u64);
}

/// Record bytes forwarded as terminal input
pub fn record_input_bytes(bytes: usize) {
    counter!("dockhand_exec_input_bytes_total").increment(bytes as u64);
}

/// Record an administration call against the Docker engine
pub fn record_docker_operation(operation: &'static str, success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!("dockhand_docker_operations_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}

/// Number of terminal sessions currently connected
pub fn active_terminals() -> u64 {
    ACTIVE_TERMINALS.load(Ordering::Relaxed)
}

/// Prometheus metrics endpoint handler
pub async fn metrics_handler() -> impl IntoResponse {
    gauge!("dockhand_active_terminals").set(active_terminals() as f64);

    match METRICS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [("Content-Type", "text/plain; version=0.0.4")],
            "metrics recorder not installed\n".to_string(),
        ),
    }
}
