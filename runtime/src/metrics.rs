//! Prometheus metrics for the order relay.
//!
//! Covers both halves of the relay:
//! - Intake and publishing (accepted, rejected, publish failures, latency)
//! - Consumption (consumed, failed, dead-lettered)
//! - Retries
//!
//! # Example
//!
//! ```rust,no_run
//! use bookbazaar_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new();
//! server.start()?;
//!
//! // Serve `server.render()` from an HTTP route such as GET /metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder whose output is rendered by the HTTP layer.
#[derive(Default)]
pub struct MetricsServer {
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a recorder that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g. by another test), this logs a
    /// warning and leaves `handle()` empty.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the recorder hasn't been installed by this instance.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Intake / publish
    describe_counter!("orders_accepted_total", "Orders accepted for asynchronous processing");
    describe_counter!("orders_rejected_total", "Order requests rejected by validation");
    describe_counter!(
        "order_publish_errors_total",
        "Orders that could not be appended to the event log"
    );
    describe_histogram!(
        "order_publish_duration_seconds",
        "Time from append request to broker acknowledgement"
    );

    // Consume
    describe_counter!("order_events_consumed_total", "Order events processed and committed");
    describe_counter!(
        "order_events_failed_total",
        "Order events whose processing failed after local retries"
    );
    describe_counter!(
        "order_events_dead_lettered_total",
        "Order events redirected to the dead-letter topic"
    );

    // Retry
    describe_counter!("retry_attempts_total", "Total number of retry attempts");
    describe_counter!("retry_successes_total", "Operations that succeeded after retrying");
    describe_counter!(
        "retry_exhausted_total",
        "Operations that exhausted their retry budget"
    );
}

/// Publisher-side metrics recorder.
pub struct PublishMetrics;

impl PublishMetrics {
    /// Record an accepted order.
    pub fn record_accepted(duration: Duration) {
        counter!("orders_accepted_total").increment(1);
        histogram!("order_publish_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a validation rejection.
    pub fn record_rejected() {
        counter!("orders_rejected_total").increment(1);
    }

    /// Record a failed append.
    pub fn record_publish_error() {
        counter!("order_publish_errors_total").increment(1);
    }
}

/// Consumer-side metrics recorder.
pub struct ConsumeMetrics;

impl ConsumeMetrics {
    /// Record a processed and committed event.
    pub fn record_consumed() {
        counter!("order_events_consumed_total").increment(1);
    }

    /// Record an event whose processing failed for good.
    pub fn record_failed() {
        counter!("order_events_failed_total").increment(1);
    }

    /// Record an event redirected to the dead-letter topic.
    pub fn record_dead_lettered() {
        counter!("order_events_dead_lettered_total").increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record a successful retry.
    pub fn record_success() {
        counter!("retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}
