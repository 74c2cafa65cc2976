//! Application lifecycle management and graceful shutdown.
//!
//! [`Application::build`] wires the service from a [`Config`]:
//!
//! 1. **Event log**: in-memory or Redpanda, wrapped in a [`RetryingEventLog`]
//! 2. **Intake**: publisher plus intake service behind the HTTP router
//! 3. **Consumer**: the `order-service` group consumer, started immediately
//!
//! # Graceful Shutdown
//!
//! When a shutdown signal is received (Ctrl+C or SIGTERM):
//! 1. HTTP server stops accepting new connections and drains in-flight requests
//! 2. Each consumer stops polling, finishes and commits its current record
//! 3. Consumers get `shutdown_timeout` to exit before they are abandoned

use crate::config::{Config, EventLogBackend};
use crate::intake::OrderIntakeService;
use crate::publisher::OrderPublisher;
use crate::runtime::consumer::{ConsumerBuildError, ConsumerHandle, OrderEventConsumer};
use crate::runtime::handlers::{DeduplicatingHandler, LoggingOrderHandler};
use crate::server::{AppState, build_router};
use bookbazaar_core::environment::{SystemClock, UuidOrderIds};
use bookbazaar_core::event_log::{EventLog, EventLogError};
use bookbazaar_runtime::metrics::{MetricsError, MetricsServer};
use bookbazaar_runtime::{RetryPolicy, RetryingEventLog};
use bookbazaar_testing::InMemoryEventLog;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Failure to start the service.
#[derive(Error, Debug)]
pub enum StartupError {
    /// The event log could not be created.
    #[error("Failed to create event log: {0}")]
    EventLog(#[from] EventLogError),

    /// The configured backend is not compiled into this binary.
    #[error("Event log backend '{0}' is not available in this build (enable the 'redpanda' feature)")]
    BackendUnavailable(EventLogBackend),

    /// The order consumer is misconfigured.
    #[error("Failed to build order consumer: {0}")]
    Consumer(#[from] ConsumerBuildError),

    /// The metrics recorder could not be installed.
    #[error("Failed to start metrics: {0}")]
    Metrics(#[from] MetricsError),

    /// The HTTP listener could not be bound.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Address that could not be bound
        address: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Retries applied inside the event log for transient broker failures.
fn broker_retry_policy() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(3)
        .initial_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(1))
        .build()
}

/// Create the event log selected by `config`.
///
/// # Errors
///
/// Returns [`StartupError`] if the backend cannot be created or was not compiled in.
pub fn build_event_log(config: &Config) -> Result<Arc<dyn EventLog>, StartupError> {
    match config.event_log.backend {
        EventLogBackend::Memory => {
            warn!("Using the in-memory event log: orders are lost on restart");
            Ok(Arc::new(RetryingEventLog::new(InMemoryEventLog::new(), broker_retry_policy())))
        }
        #[cfg(feature = "redpanda")]
        EventLogBackend::Redpanda => {
            let log = bookbazaar_redpanda::RedpandaEventLog::builder()
                .brokers(&config.event_log.brokers)
                .timeout(config.event_log.publish_timeout)
                .build()?;
            Ok(Arc::new(RetryingEventLog::new(log, broker_retry_policy())))
        }
        #[cfg(not(feature = "redpanda"))]
        EventLogBackend::Redpanda => Err(StartupError::BackendUnavailable(EventLogBackend::Redpanda)),
    }
}

/// Running order service: HTTP server plus background consumers.
pub struct Application {
    /// TCP listener for HTTP server
    listener: TcpListener,

    /// Axum router with all HTTP routes
    router: axum::Router,

    /// Started consumers
    consumers: Vec<ConsumerHandle>,

    /// How long consumers get to stop
    shutdown_timeout: Duration,
}

impl Application {
    /// Wire the service from `config` on the given event log, and start its consumer.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if metrics, the consumer, or the listener cannot be set up.
    pub async fn build_with_log(config: &Config, log: Arc<dyn EventLog>) -> Result<Self, StartupError> {
        let mut metrics = MetricsServer::new();
        if config.metrics_enabled {
            metrics.start()?;
        }

        let publisher =
            OrderPublisher::new(Arc::clone(&log), &config.orders.topic).with_timeout(config.event_log.publish_timeout);
        let intake = OrderIntakeService::new(publisher, Arc::new(UuidOrderIds), Arc::new(SystemClock));
        let router = build_router(AppState::new(intake, Arc::new(metrics)));

        let consumer = OrderEventConsumer::builder()
            .name("order-service")
            .topic(&config.orders.topic)
            .group(&config.orders.consumer_group)
            .dead_letter_topic(config.orders.dead_letter_topic.clone())
            .retry_policy(
                RetryPolicy::builder()
                    .max_retries(config.orders.max_retries)
                    .initial_delay(config.orders.retry_delay)
                    .build(),
            )
            .reconnect_delay(config.orders.reconnect_delay)
            .log(log)
            .handler(Arc::new(DeduplicatingHandler::new(LoggingOrderHandler)))
            .build()?;

        let address = config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind { address, source })?;

        Ok(Self {
            listener,
            router,
            consumers: vec![consumer.start()],
            shutdown_timeout: config.server.shutdown_timeout,
        })
    }

    /// Wire the service from `config`, creating the configured event log.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if any component cannot be set up.
    pub async fn build(config: &Config) -> Result<Self, StartupError> {
        let log = build_event_log(config)?;
        Self::build_with_log(config, log).await
    }

    /// Address the HTTP server is bound to.
    ///
    /// # Errors
    ///
    /// Returns error if the listener's address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run until Ctrl+C or SIGTERM, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails.
    pub async fn run(self) -> Result<(), std::io::Error> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` completes, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails.
    pub async fn run_until<F>(self, signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(address = ?self.listener.local_addr().ok(), "HTTP server listening for requests");

        let served = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await;

        info!("HTTP server stopped, stopping consumers...");
        Self::await_shutdown(self.consumers, self.shutdown_timeout).await;
        info!("Graceful shutdown complete");

        served
    }

    async fn await_shutdown(consumers: Vec<ConsumerHandle>, timeout: Duration) {
        for (idx, consumer) in consumers.into_iter().enumerate() {
            match tokio::time::timeout(timeout, consumer.stop()).await {
                Ok(()) => info!(consumer = idx, "Consumer stopped gracefully"),
                Err(_) => warn!(consumer = idx, "Consumer shutdown timed out"),
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
