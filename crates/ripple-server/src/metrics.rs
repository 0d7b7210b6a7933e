//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Server endpoints opened (counter).
pub const WS_ENDPOINTS_OPENED_TOTAL: &str = "ws_endpoints_opened_total";
/// Server endpoints closed (counter).
pub const WS_ENDPOINTS_CLOSED_TOTAL: &str = "ws_endpoints_closed_total";
/// Messages refused by validation (counter).
pub const WS_MESSAGES_REJECTED_TOTAL: &str = "ws_messages_rejected_total";
/// Unexpected handler errors that forced a close (counter).
pub const WS_UNEXPECTED_ERRORS_TOTAL: &str = "ws_unexpected_errors_total";
/// Connections currently being served (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
