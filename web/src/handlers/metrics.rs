//! Prometheus scrape endpoint.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bookbazaar_runtime::metrics::MetricsServer;

/// Content type of the Prometheus text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Render `server` for a `GET /metrics` scrape.
///
/// Responds `404` when this process did not install the recorder (metrics
/// disabled, or another component owns the global recorder).
#[must_use]
pub fn render_metrics(server: &MetricsServer) -> Response {
    match server.render() {
        Some(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninstalled_recorder_renders_not_found() {
        let response = render_metrics(&MetricsServer::new());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
