//! Event log decorator that absorbs transient broker failures.
//!
//! Callers of [`EventLog`] only see two outcomes: an acknowledged append or a
//! [`EventLogError::BrokerUnavailable`]. Timeouts and transport errors are
//! retried here with bounded exponential backoff; once retries are exhausted
//! they are reported as `BrokerUnavailable`.
//!
//! # Example
//!
//! ```rust,ignore
//! let log: Arc<dyn EventLog> = Arc::new(RetryingEventLog::new(
//!     RedpandaEventLog::new("localhost:9092")?,
//!     RetryPolicy::default(),
//! ));
//! ```

use crate::retry::{RetryPolicy, retry_with_predicate};
use bookbazaar_core::event_log::{AppendAck, EventLog, EventLogError, LogFuture, Subscription};

/// Wraps an [`EventLog`] and retries transient failures of `append` and `subscribe`.
pub struct RetryingEventLog<L> {
    inner: L,
    policy: RetryPolicy,
}

impl<L: EventLog> RetryingEventLog<L> {
    /// Wrap `inner`, retrying according to `policy`.
    #[must_use]
    pub const fn new(inner: L, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped log.
    #[must_use]
    pub const fn inner(&self) -> &L {
        &self.inner
    }
}

fn surface(err: EventLogError) -> EventLogError {
    if err.is_transient() {
        EventLogError::BrokerUnavailable(format!("retries exhausted: {err}"))
    } else {
        err
    }
}

impl<L: EventLog> EventLog for RetryingEventLog<L> {
    fn append<'a>(&'a self, topic: &'a str, key: &'a str, payload: &'a [u8]) -> LogFuture<'a, AppendAck> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "event_log.append",
                || self.inner.append(topic, key, payload),
                EventLogError::is_transient,
            )
            .await
            .map_err(surface)
        })
    }

    fn subscribe<'a>(&'a self, topic: &'a str, group: &'a str) -> LogFuture<'a, Box<dyn Subscription>> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "event_log.subscribe",
                || self.inner.subscribe(topic, group),
                EventLogError::is_transient,
            )
            .await
            .map_err(surface)
        })
    }
}
