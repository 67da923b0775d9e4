//! Metrics collection and exposition.
//!
//! # Metrics
//! - `httpd_connections_accepted_total` (counter)
//! - `httpd_connections_rejected_total` (counter): by `reason` (value, memory)
//! - `httpd_responses_sent_total` (counter)
//! - `httpd_connections_closed_total` (counter): by `mode` (graceful, abort, error)
//! - `httpd_active_sessions` (gauge)
//!
//! Recording is a no-op until a recorder is installed, so the handler can
//! call these unconditionally.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// How a connection left the session table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    Graceful,
    Abort,
    Error,
}

impl CloseMode {
    fn as_str(self) -> &'static str {
        match self {
            CloseMode::Graceful => "graceful",
            CloseMode::Abort => "abort",
            CloseMode::Error => "error",
        }
    }
}

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_accept() {
    metrics::counter!("httpd_connections_accepted_total").increment(1);
}

pub fn record_reject(reason: &'static str) {
    metrics::counter!("httpd_connections_rejected_total", "reason" => reason).increment(1);
}

pub fn record_response() {
    metrics::counter!("httpd_responses_sent_total").increment(1);
}

pub fn record_close(mode: CloseMode) {
    metrics::counter!("httpd_connections_closed_total", "mode" => mode.as_str()).increment(1);
}

pub fn record_active_sessions(count: usize) {
    metrics::gauge!("httpd_active_sessions").set(count as f64);
}
