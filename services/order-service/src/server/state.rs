//! Application state for the order HTTP server.

use crate::intake::OrderIntakeService;
use bookbazaar_runtime::metrics::MetricsServer;
use std::sync::Arc;

/// State shared across all HTTP handlers; cloned cheaply per request.
#[derive(Clone)]
pub struct AppState {
    /// Validates and publishes orders
    pub intake: OrderIntakeService,

    /// Prometheus recorder rendered on `GET /metrics`
    pub metrics: Arc<MetricsServer>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(intake: OrderIntakeService, metrics: Arc<MetricsServer>) -> Self {
        Self { intake, metrics }
    }
}
