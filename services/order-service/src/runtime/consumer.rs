//! Order event consumer with an explicit poll loop.
//!
//! `OrderEventConsumer` joins a consumer group on the order topic, decodes each
//! record into an [`OrderPlaced`], and hands it to an [`OrderEventHandler`]. The
//! record's offset is committed only after the handler succeeded, or after the
//! record was safely parked on the dead-letter topic.
//!
//! # Pattern: Subscribe-Poll-Commit Loop
//!
//! ```text
//! loop {
//!     subscribe (Disconnected -> Subscribed):
//!         loop {
//!             poll (Polling)
//!             process (Processing):
//!                 - decode, handle, retry transient failures locally
//!                 - on exhaustion or poison payload: dead-letter
//!             commit
//!         }
//!     on broker error: release the subscription, wait, resubscribe
//! }
//! ```
//!
//! Records that could not be dead-lettered are left uncommitted and the
//! subscription is re-established, so the broker redelivers them.
//!
//! # Example
//!
//! ```rust,ignore
//! let handle = OrderEventConsumer::builder()
//!     .log(log)
//!     .handler(Arc::new(DeduplicatingHandler::new(LoggingOrderHandler)))
//!     .build()?
//!     .start();
//!
//! // ... later
//! handle.stop().await;
//! ```

use bookbazaar_core::event::{Event, OrderPlaced};
use bookbazaar_core::event_log::{EventLog, EventLogError, LogRecord, Subscription};
use bookbazaar_core::handler::{OrderEventHandler, ProcessingError};
use bookbazaar_core::topics;
use bookbazaar_runtime::metrics::ConsumeMetrics;
use bookbazaar_runtime::retry::{RetryPolicy, retry_with_predicate};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Default wait for a record before polling again.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Default delay before resubscribing after a broker failure.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Where the consumer is in its lifecycle.
///
/// ```text
/// Disconnected -> Subscribed -> Polling <-> Processing
///       ^                          |
///       +------ broker error ------+
/// any -> Stopped (stop requested or unrecoverable subscription error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Not a member of the group; (re)subscribing.
    Disconnected,
    /// Joined the group, not yet polling.
    Subscribed,
    /// Waiting for the next record.
    Polling,
    /// Handling a record.
    Processing,
    /// Finished; the subscription was released.
    Stopped,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Subscribed => "subscribed",
            Self::Polling => "polling",
            Self::Processing => "processing",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Error building an [`OrderEventConsumer`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumerBuildError {
    /// A required builder field was not set.
    #[error("Consumer is missing required field '{0}'")]
    Missing(&'static str),
}

/// What to do with a record once processing finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Advance past it.
    Commit,
    /// Leave it uncommitted and resubscribe so it is delivered again.
    Redeliver,
}

/// Why the inner poll loop returned.
enum Exit {
    Shutdown,
    Reconnect(String),
}

/// Consumes `OrderPlaced` envelopes under one consumer group.
///
/// # Configuration
///
/// - `log`: event log to consume from (required)
/// - `handler`: processing for each envelope (required)
/// - `topic`: default `order.placed`
/// - `group`: default `order-service`
/// - `dead_letter_topic`: default `<topic>.dlq`; `None` logs and advances instead
/// - `retry_policy`: local retries of transient handler failures
/// - `poll_timeout`, `reconnect_delay`
pub struct OrderEventConsumer {
    name: String,
    topic: String,
    group: String,
    dead_letter_topic: Option<String>,
    log: Arc<dyn EventLog>,
    handler: Arc<dyn OrderEventHandler>,
    retry_policy: RetryPolicy,
    poll_timeout: Duration,
    reconnect_delay: Duration,
}

impl OrderEventConsumer {
    /// Create a builder for configuring a consumer.
    #[must_use]
    pub fn builder() -> OrderEventConsumerBuilder {
        OrderEventConsumerBuilder::default()
    }

    /// Consumer group this consumer joins.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Topic this consumer reads.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Spawn the poll loop on a tokio task.
    #[must_use]
    pub fn start(self) -> ConsumerHandle {
        let (state_tx, state_rx) = watch::channel(ConsumerState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let name = self.name.clone();

        let task = tokio::spawn(async move {
            self.run(&state_tx, shutdown_rx).await;
        });

        ConsumerHandle {
            name,
            state: state_rx,
            shutdown: shutdown_tx,
            task,
        }
    }

    fn transition(&self, state: &watch::Sender<ConsumerState>, next: ConsumerState) {
        state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            trace!(consumer = %self.name, from = %current, to = %next, "Consumer state changed");
            *current = next;
            true
        });
    }

    async fn run(self, state: &watch::Sender<ConsumerState>, mut shutdown: watch::Receiver<bool>) {
        info!(consumer = %self.name, topic = %self.topic, group = %self.group, "Order consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.transition(state, ConsumerState::Disconnected);

            let subscribed = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.log.subscribe(&self.topic, &self.group) => result,
            };

            let reason = match subscribed {
                Ok(mut subscription) => {
                    info!(consumer = %self.name, topic = %self.topic, group = %self.group, "Subscribed to order topic");
                    self.transition(state, ConsumerState::Subscribed);

                    match self.consume(subscription.as_mut(), state, &mut shutdown).await {
                        Exit::Shutdown => break,
                        Exit::Reconnect(reason) => reason,
                    }
                }
                Err(err) if err.is_transient() || matches!(err, EventLogError::BrokerUnavailable(_)) => err.to_string(),
                Err(err) => {
                    error!(consumer = %self.name, error = %err, "Unrecoverable subscription error, stopping");
                    break;
                }
            };

            self.transition(state, ConsumerState::Disconnected);
            warn!(
                consumer = %self.name,
                reason = %reason,
                "Order consumer disconnected, resubscribing in {:?}",
                self.reconnect_delay
            );

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                () = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.transition(state, ConsumerState::Stopped);
        info!(consumer = %self.name, "Order consumer stopped");
    }

    /// Poll and process until shutdown or a broker error.
    ///
    /// A record being processed is always finished (and committed) before a
    /// shutdown request is honoured.
    async fn consume(
        &self,
        subscription: &mut dyn Subscription,
        state: &watch::Sender<ConsumerState>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Exit {
        loop {
            self.transition(state, ConsumerState::Polling);

            let polled = tokio::select! {
                biased;
                _ = shutdown.changed() => return Exit::Shutdown,
                result = subscription.poll(self.poll_timeout) => result,
            };

            let record = match polled {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) => return Exit::Reconnect(format!("poll failed: {err}")),
            };

            self.transition(state, ConsumerState::Processing);
            trace!(consumer = %self.name, record = %record, "Processing record");

            match self.process(&record).await {
                Disposition::Commit => {
                    if let Err(err) = subscription.commit(&record).await {
                        warn!(
                            consumer = %self.name,
                            record = %record,
                            error = %err,
                            "Failed to commit offset (record may be redelivered)"
                        );
                    }
                }
                Disposition::Redeliver => {
                    return Exit::Reconnect(format!("record {record} left uncommitted for redelivery"));
                }
            }
        }
    }

    async fn process(&self, record: &LogRecord) -> Disposition {
        let event = match OrderPlaced::from_bytes(&record.payload) {
            Ok(event) => event,
            Err(err) => {
                ConsumeMetrics::record_failed();
                warn!(consumer = %self.name, record = %record, error = %err, "Undecodable order record");
                return self.dead_letter(record, &err.to_string()).await;
            }
        };

        let handled = retry_with_predicate(
            &self.retry_policy,
            "order.handle",
            || self.handler.handle(&event),
            ProcessingError::is_retryable,
        )
        .await;

        match handled {
            Ok(()) => {
                ConsumeMetrics::record_consumed();
                debug!(
                    consumer = %self.name,
                    event_type = event.event_type(),
                    order_id = %event.order_id(),
                    record = %record,
                    "Order processed"
                );
                Disposition::Commit
            }
            Err(err) => {
                ConsumeMetrics::record_failed();
                error!(
                    consumer = %self.name,
                    order_id = %event.order_id(),
                    record = %record,
                    error = %err,
                    "Order processing failed"
                );
                self.dead_letter(record, &err.to_string()).await
            }
        }
    }

    async fn dead_letter(&self, record: &LogRecord, reason: &str) -> Disposition {
        let Some(topic) = &self.dead_letter_topic else {
            error!(consumer = %self.name, record = %record, reason, "Dead-letter topic disabled, skipping record");
            return Disposition::Commit;
        };

        let key = record.key.as_deref().unwrap_or_default();
        match self.log.append(topic, key, &record.payload).await {
            Ok(ack) => {
                ConsumeMetrics::record_dead_lettered();
                warn!(
                    consumer = %self.name,
                    record = %record,
                    dead_letter_topic = %topic,
                    partition = ack.partition,
                    offset = ack.offset,
                    reason,
                    "Record dead-lettered"
                );
                Disposition::Commit
            }
            Err(err) => {
                error!(
                    consumer = %self.name,
                    record = %record,
                    dead_letter_topic = %topic,
                    error = %err,
                    "Failed to dead-letter record, leaving it for redelivery"
                );
                Disposition::Redeliver
            }
        }
    }
}

/// Builder for configuring an [`OrderEventConsumer`].
#[derive(Default)]
pub struct OrderEventConsumerBuilder {
    name: Option<String>,
    topic: Option<String>,
    group: Option<String>,
    dead_letter_topic: Option<Option<String>>,
    log: Option<Arc<dyn EventLog>>,
    handler: Option<Arc<dyn OrderEventHandler>>,
    retry_policy: Option<RetryPolicy>,
    poll_timeout: Option<Duration>,
    reconnect_delay: Option<Duration>,
}

impl OrderEventConsumerBuilder {
    /// Set consumer name (for logging). Default: `order-consumer`.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set topic to consume. Default: `order.placed`.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set consumer group. Default: `order-service`.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set dead-letter topic; `None` disables dead-lettering. Default: `<topic>.dlq`.
    #[must_use]
    pub fn dead_letter_topic(mut self, topic: Option<String>) -> Self {
        self.dead_letter_topic = Some(topic);
        self
    }

    /// Set event log to consume from.
    #[must_use]
    pub fn log(mut self, log: Arc<dyn EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Set order handler.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn OrderEventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set local retry policy for transient handler failures. Default: [`RetryPolicy::default`].
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Set how long one poll waits for a record. Default: 500ms.
    #[must_use]
    pub const fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    /// Set delay before resubscribing after a broker failure. Default: 5 seconds.
    #[must_use]
    pub const fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Build the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerBuildError::Missing`] if `log` or `handler` was not set.
    pub fn build(self) -> Result<OrderEventConsumer, ConsumerBuildError> {
        let topic = self.topic.unwrap_or_else(|| topics::ORDER_PLACED.to_string());
        let dead_letter_topic = self
            .dead_letter_topic
            .unwrap_or_else(|| Some(format!("{topic}.dlq")))
            .filter(|t| !t.is_empty());

        Ok(OrderEventConsumer {
            name: self.name.unwrap_or_else(|| "order-consumer".to_string()),
            group: self.group.unwrap_or_else(|| topics::ORDER_SERVICE_GROUP.to_string()),
            topic,
            dead_letter_topic,
            log: self.log.ok_or(ConsumerBuildError::Missing("log"))?,
            handler: self.handler.ok_or(ConsumerBuildError::Missing("handler"))?,
            retry_policy: self.retry_policy.unwrap_or_default(),
            poll_timeout: self.poll_timeout.unwrap_or(DEFAULT_POLL_TIMEOUT),
            reconnect_delay: self.reconnect_delay.unwrap_or(DEFAULT_RECONNECT_DELAY),
        })
    }
}

/// Control over a running [`OrderEventConsumer`].
pub struct ConsumerHandle {
    name: String,
    state: watch::Receiver<ConsumerState>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConsumerState> {
        self.state.clone()
    }

    /// Whether the poll loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling, let in-flight processing finish and commit, release the
    /// subscription, and wait for the task to exit.
    pub async fn stop(self) {
        self.shutdown.send_replace(true);
        if let Err(err) = self.task.await {
            error!(consumer = %self.name, error = %err, "Order consumer task failed");
        }
    }
}
