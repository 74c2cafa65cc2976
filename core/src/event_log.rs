//! Durable, ordered event log abstraction.
//!
//! This module provides the [`EventLog`] trait: the contract the publisher and
//! consumer use to talk to the broker. The broker itself (Kafka, Redpanda, or an
//! in-process log in tests) is an external dependency behind this seam.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   append(topic, key, payload)   ┌──────────────┐
//! │  Publisher   │ ──────────────────────────────► │              │
//! └──────────────┘          AppendAck              │   EventLog   │
//!                                                  │  (partitions │
//! ┌──────────────┐   subscribe(topic, group)       │   + groups)  │
//! │   Consumer   │ ──────────────────────────────► │              │
//! │  poll loop   │ ◄── poll() → LogRecord ──────── │              │
//! │              │ ─── commit(&record) ──────────► │              │
//! └──────────────┘                                 └──────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **At-least-once delivery**: a record is redelivered until its group commits past it
//! - **Per-key ordering**: records with the same key land on the same partition and
//!   are delivered to a group in write order; there is no cross-key ordering
//! - **Log, not queue**: every group has its own cursor; one group consuming a
//!   record does not hide it from another
//! - **Exclusive ownership**: within a group, a partition is owned by one member at a time
//!
//! # Dyn Compatibility
//!
//! The traits return boxed futures instead of using `async fn` so that they can
//! be used as `Arc<dyn EventLog>` and `Box<dyn Subscription>`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Boxed, sendable future returned by the log traits.
pub type LogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EventLogError>> + Send + 'a>>;

/// Errors that can occur during event log operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventLogError {
    /// The broker cannot accept or deliver records (unreachable after bounded
    /// retries, or misconfigured).
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// The broker did not acknowledge within the allowed time.
    #[error("Timed out after {0:?} waiting for the broker")]
    Timeout(Duration),

    /// Transient network or transport failure; safe to retry.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failed to append a record to a topic.
    #[error("Append failed for topic '{topic}': {reason}")]
    AppendFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to join a consumer group or subscribe to a topic.
    #[error("Subscription failed for topic '{topic}' (group '{group}'): {reason}")]
    SubscriptionFailed {
        /// The topic that failed to subscribe
        topic: String,
        /// The consumer group
        group: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to commit a consumed position.
    #[error("Commit failed for {topic}[{partition}]@{offset}: {reason}")]
    CommitFailed {
        /// Topic of the record
        topic: String,
        /// Partition of the record
        partition: i32,
        /// Offset of the record
        offset: i64,
        /// The reason for failure
        reason: String,
    },

    /// Topic name is empty or otherwise invalid.
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
}

impl EventLogError {
    /// Whether the failure is worth retrying inside the log abstraction.
    ///
    /// Timeouts and transport hiccups are transient. Everything else either
    /// already exhausted its retries or is a configuration problem.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

/// Broker acknowledgement of a durable append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppendAck {
    /// Partition the record was written to.
    pub partition: i32,
    /// Offset assigned to the record within that partition.
    pub offset: i64,
}

/// A record delivered to a consumer group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Topic the record was read from.
    pub topic: String,
    /// Partition the record lives in.
    pub partition: i32,
    /// Monotonically increasing position within the partition.
    pub offset: i64,
    /// Partition key, if the producer set one.
    pub key: Option<String>,
    /// Encoded envelope.
    pub payload: Vec<u8>,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]@{} ({} bytes)",
            self.topic,
            self.partition,
            self.offset,
            self.payload.len()
        )
    }
}

/// Trait for durable, ordered event log implementations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one log is shared by every request
/// task that publishes and every consumer that subscribes.
pub trait EventLog: Send + Sync {
    /// Append a record to `topic` under `key`.
    ///
    /// Resolves only once the broker has acknowledged durable receipt.
    ///
    /// # Errors
    ///
    /// - [`EventLogError::BrokerUnavailable`] if the broker cannot take the record
    /// - [`EventLogError::Timeout`] / [`EventLogError::Transport`] on transient failures
    /// - [`EventLogError::InvalidTopic`] if `topic` is empty
    fn append<'a>(&'a self, topic: &'a str, key: &'a str, payload: &'a [u8]) -> LogFuture<'a, AppendAck>;

    /// Join `group` on `topic` and return a subscription positioned at the
    /// group's last committed offsets.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::SubscriptionFailed`] or
    /// [`EventLogError::BrokerUnavailable`] if the group cannot be joined.
    fn subscribe<'a>(&'a self, topic: &'a str, group: &'a str) -> LogFuture<'a, Box<dyn Subscription>>;
}

/// A group member's view of a topic.
///
/// Dropping a subscription leaves the group; uncommitted records are
/// redelivered to whichever member owns their partition next.
pub trait Subscription: Send {
    /// Wait up to `timeout` for the next record from an owned partition.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Transport`] on a transient receive failure, or
    /// [`EventLogError::BrokerUnavailable`] if the subscription is no longer usable.
    fn poll(&mut self, timeout: Duration) -> LogFuture<'_, Option<LogRecord>>;

    /// Advance the group's cursor past `record`.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::CommitFailed`] if the position could not be stored,
    /// e.g. because the partition was reassigned to another member.
    fn commit<'a>(&'a mut self, record: &'a LogRecord) -> LogFuture<'a, ()>;
}
