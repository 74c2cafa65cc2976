//! Redpanda event log for BookBazaar.
//!
//! This crate implements the [`EventLog`] trait from `bookbazaar-core` on top of
//! rdkafka, so it works against Redpanda or any other Kafka-compatible broker.
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - Appends return only once the broker acknowledged the write
//! - Records with the same key land on the same partition, so they keep their
//!   relative order
//! - Consumers run with `enable.auto.commit=false`; the offset only advances
//!   when [`Subscription::commit`] is called after successful processing
//! - If a consumer dies before committing, the broker redelivers from the last
//!   committed offset to the next owner of the partition
//!
//! **Configuration options**:
//! - `producer_acks`: acknowledgement mode (default: "all")
//! - `timeout`: delivery timeout for appends (default: 5 seconds)
//! - `auto_offset_reset`: where new groups start reading (default: "earliest")
//!
//! # Example
//!
//! ```no_run
//! use bookbazaar_core::event_log::EventLog;
//! use bookbazaar_redpanda::RedpandaEventLog;
//! use std::sync::Arc;
use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let log = RedpandaEventLog::new("localhost:9092")?;
//!
//! let ack = log.append("order.placed", "42", br#"{"orderId":"o-1","bookId":42,"quantity":3}"#).await?;
//! println!("stored at {}@{}", ack.partition, ack.offset);
//!
//! let mut subscription = log.subscribe("order.placed", "order-service").await?;
//! while let Some(record) = subscription.poll(Duration::from_secs(1)).await? {
//!     println!("received {record}");
//!     subscription.commit(&record).await?;
//! }
//! # Ok(())
//! # }
//! ```

use bookbazaar_core::event_log::{AppendAck, EventLog, EventLogError, LogFuture, LogRecord, Subscription};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;

/// Redpanda-backed [`EventLog`].
///
/// One [`FutureProducer`] is shared by every append; each call to
/// [`EventLog::subscribe`] creates a dedicated [`StreamConsumer`] that joins the
/// requested group and leaves it when the subscription is dropped.
///
/// # Example
///
/// ```no_run
/// use bookbazaar_redpanda::RedpandaEventLog;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let log = RedpandaEventLog::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .producer_acks("all")
///     .compression("lz4")
///     .timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaEventLog {
    /// Producer shared by all appends
    producer: FutureProducer,
    /// Broker addresses (for creating consumers)
    brokers: String,
    /// Delivery timeout for appends
    timeout: Duration,
    /// Auto offset reset policy for new groups
    auto_offset_reset: String,
    /// Consumer session timeout
    session_timeout: Duration,
}

impl RedpandaEventLog {
    /// Create a log with default configuration.
    ///
    /// # Parameters
    ///
    /// - `brokers`: Comma-separated list of broker addresses (e.g., "localhost:9092")
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::BrokerUnavailable`] if the producer cannot be
    /// created from the given configuration.
    pub fn new(brokers: &str) -> Result<Self, EventLogError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the log.
    #[must_use]
    pub fn builder() -> RedpandaEventLogBuilder {
        RedpandaEventLogBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    fn consumer_config(&self, group: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", self.session_timeout.as_millis().to_string())
            .set("enable.partition.eof", "false");
        config
    }
}

/// Builder for configuring a [`RedpandaEventLog`].
#[derive(Default)]
pub struct RedpandaEventLogBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    auto_offset_reset: Option<String>,
    session_timeout: Option<Duration>,
}

impl RedpandaEventLogBuilder {
    /// Set the broker addresses.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode.
    ///
    /// - `acks`: "0" (no acks), "1" (leader ack), "all" (all replicas ack)
    ///
    /// Default: "all"
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec ("none", "gzip", "snappy", "lz4", "zstd").
    ///
    /// Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the delivery timeout for appends.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set where new consumer groups start reading when no committed offset exists:
    /// - `"earliest"`: Start from the beginning of the topic
    /// - `"latest"`: Start from the end (only new records)
    ///
    /// Default: "earliest", so orders appended before the first consumer
    /// started are still processed.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Set the consumer session timeout after which a silent member is evicted.
    ///
    /// Default: 6 seconds
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Build the [`RedpandaEventLog`].
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::BrokerUnavailable`] if:
    /// - Brokers not set
    /// - Cannot create producer
    /// - Invalid configuration
    pub fn build(self) -> Result<RedpandaEventLog, EventLogError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventLogError::BrokerUnavailable("Brokers not configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));
        let acks = self.producer_acks.as_deref().unwrap_or("all");
        let compression = self.compression.as_deref().unwrap_or("none");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .set("enable.idempotence", if acks == "all" { "true" } else { "false" })
            .set("compression.type", compression)
            .create()
            .map_err(|e| EventLogError::BrokerUnavailable(format!("Failed to create producer: {e}")))?;

        let auto_offset_reset = self.auto_offset_reset.unwrap_or_else(|| "earliest".to_string());

        tracing::info!(
            brokers = %brokers,
            acks,
            compression,
            auto_offset_reset = %auto_offset_reset,
            "RedpandaEventLog created"
        );

        Ok(RedpandaEventLog {
            producer,
            brokers,
            timeout,
            auto_offset_reset,
            session_timeout: self.session_timeout.unwrap_or(Duration::from_secs(6)),
        })
    }
}

/// Classify an rdkafka error into the log's error vocabulary.
fn classify(error: &KafkaError, timeout: Duration, topic: &str) -> EventLogError {
    match error.rdkafka_error_code() {
        Some(RDKafkaErrorCode::MessageTimedOut | RDKafkaErrorCode::RequestTimedOut) => {
            EventLogError::Timeout(timeout)
        }
        Some(RDKafkaErrorCode::AllBrokersDown) => EventLogError::BrokerUnavailable(error.to_string()),
        Some(
            RDKafkaErrorCode::BrokerTransportFailure
            | RDKafkaErrorCode::QueueFull
            | RDKafkaErrorCode::NetworkException
            | RDKafkaErrorCode::LeaderNotAvailable
            | RDKafkaErrorCode::NotLeaderForPartition,
        ) => EventLogError::Transport(error.to_string()),
        Some(RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::InvalidTopic) => {
            EventLogError::InvalidTopic(topic.to_string())
        }
        _ => EventLogError::AppendFailed {
            topic: topic.to_string(),
            reason: error.to_string(),
        },
    }
}

impl EventLog for RedpandaEventLog {
    fn append<'a>(&'a self, topic: &'a str, key: &'a str, payload: &'a [u8]) -> LogFuture<'a, AppendAck> {
        Box::pin(async move {
            let record = FutureRecord::to(topic).payload(payload).key(key);

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(topic, key, partition, offset, "Record appended");
                    Ok(AppendAck { partition, offset })
                }
                Err((kafka_error, _)) => {
                    tracing::error!(topic, key, error = %kafka_error, "Failed to append record");
                    Err(classify(&kafka_error, self.timeout, topic))
                }
            }
        })
    }

    fn subscribe<'a>(&'a self, topic: &'a str, group: &'a str) -> LogFuture<'a, Box<dyn Subscription>> {
        Box::pin(async move {
            let subscription_failed = |reason: String| EventLogError::SubscriptionFailed {
                topic: topic.to_string(),
                group: group.to_string(),
                reason,
            };

            let consumer: StreamConsumer = self
                .consumer_config(group)
                .create()
                .map_err(|e| subscription_failed(format!("Failed to create consumer: {e}")))?;

            consumer
                .subscribe(&[topic])
                .map_err(|e| subscription_failed(format!("Failed to subscribe to topic: {e}")))?;

            tracing::info!(
                topic,
                group,
                auto_offset_reset = %self.auto_offset_reset,
                manual_commit = true,
                "Subscribed to topic"
            );

            Ok(Box::new(RedpandaSubscription {
                consumer: Arc::new(consumer),
            }) as Box<dyn Subscription>)
        })
    }
}

/// A group member backed by a dedicated [`StreamConsumer`].
///
/// Dropping it closes the consumer, which leaves the group and triggers a
/// rebalance. Commits are synchronous, so every offset acknowledged by
/// [`Subscription::commit`] is stored before the subscription can be dropped.
struct RedpandaSubscription {
    consumer: Arc<StreamConsumer>,
}

impl Subscription for RedpandaSubscription {
    fn poll(&mut self, timeout: Duration) -> LogFuture<'_, Option<LogRecord>> {
        Box::pin(async move {
            let Ok(received) = tokio::time::timeout(timeout, self.consumer.recv()).await else {
                return Ok(None);
            };

            let message = received.map_err(|e| match e.rdkafka_error_code() {
                Some(RDKafkaErrorCode::AllBrokersDown) => EventLogError::BrokerUnavailable(e.to_string()),
                _ => EventLogError::Transport(format!("Failed to receive message: {e}")),
            })?;

            let record = LogRecord {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            };

            tracing::trace!(record = %record, "Received record");
            Ok(Some(record))
        })
    }

    fn commit<'a>(&'a mut self, record: &'a LogRecord) -> LogFuture<'a, ()> {
        Box::pin(async move {
            let commit_failed = |reason: String| EventLogError::CommitFailed {
                topic: record.topic.clone(),
                partition: record.partition,
                offset: record.offset,
                reason,
            };

            // Kafka commits the offset of the next record to read.
            let mut offsets = TopicPartitionList::new();
            offsets
                .add_partition_offset(&record.topic, record.partition, Offset::Offset(record.offset + 1))
                .map_err(|e| commit_failed(e.to_string()))?;

            // A sync commit blocks on the coordinator round-trip; keep it off the runtime workers.
            let consumer = Arc::clone(&self.consumer);
            tokio::task::spawn_blocking(move || consumer.commit(&offsets, CommitMode::Sync))
                .await
                .map_err(|e| commit_failed(format!("commit task failed: {e}")))?
                .map_err(|e| commit_failed(e.to_string()))?;

            tracing::trace!(record = %record, "Offset committed");
            Ok(())
        })
    }
}
