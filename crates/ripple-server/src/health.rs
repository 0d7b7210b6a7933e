//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Cumulative number of server endpoints opened.
    pub endpoints_opened: u64,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, endpoints_opened: u64) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        endpoints_opened,
    }
}
