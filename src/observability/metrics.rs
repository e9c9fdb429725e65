//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ws_connections_total` (counter): routed sockets by outcome
//! - `ws_active_connections` (gauge): entries in the connection table
//! - `ws_messages_rejected_total` (counter): frames rejected before routing, by code
//! - `ws_auth_timeouts_total` (counter): deferred authentications that expired
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps unit tests quiet

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record the outcome of routing one new socket.
pub fn record_connection(outcome: &'static str) {
    counter!("ws_connections_total", "outcome" => outcome).increment(1);
}

pub fn set_active_connections(count: usize) {
    gauge!("ws_active_connections").set(count as f64);
}

pub fn record_message_rejected(code: u16) {
    counter!("ws_messages_rejected_total", "code" => code.to_string()).increment(1);
}

pub fn record_auth_timeout() {
    counter!("ws_auth_timeouts_total").increment(1);
}
