//! Publishing `OrderPlaced` envelopes to the event log.
//!
//! [`OrderPublisher::publish`] returns only after the broker acknowledged the
//! append. Without an acknowledgement (broker down, or no answer within the
//! publish timeout) the order is reported as not accepted. The publisher keeps
//! no state between calls.

use crate::error::PublishError;
use bookbazaar_core::event::{Event, OrderPlaced};
use bookbazaar_core::event_log::EventLog;
use bookbazaar_core::topics;
use bookbazaar_runtime::metrics::PublishMetrics;
use bookbazaar_runtime::retry::{RetryPolicy, retry_with_predicate};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default time to wait for a broker acknowledgement.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Where an acknowledged envelope was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Topic the envelope was appended to
    pub topic: String,
    /// Partition chosen by the envelope's key
    pub partition: i32,
    /// Offset within that partition
    pub offset: i64,
}

/// Appends order envelopes to a topic, keyed by book.
#[derive(Clone)]
pub struct OrderPublisher {
    log: Arc<dyn EventLog>,
    topic: String,
    timeout: Duration,
}

impl OrderPublisher {
    /// Publish to `topic` on `log` with the default acknowledgement timeout.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>, topic: impl Into<String>) -> Self {
        Self {
            log,
            topic: topic.into(),
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    /// Publish to [`topics::ORDER_PLACED`].
    #[must_use]
    pub fn for_order_topic(log: Arc<dyn EventLog>) -> Self {
        Self::new(log, topics::ORDER_PLACED)
    }

    /// Override how long to wait for an acknowledgement.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Topic this publisher appends to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Append `event` and wait for the broker's acknowledgement.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Unavailable`] if the log rejected the append or did
    ///   not acknowledge it within the timeout
    /// - [`PublishError::Encoding`] if the envelope could not be serialized
    pub async fn publish(&self, event: &OrderPlaced) -> Result<PublishReceipt, PublishError> {
        let payload = event.to_bytes()?;
        let key = event.partition_key();
        let started = Instant::now();

        let outcome = tokio::time::timeout(self.timeout, self.log.append(&self.topic, &key, &payload)).await;

        match outcome {
            Ok(Ok(ack)) => {
                PublishMetrics::record_accepted(started.elapsed());
                tracing::info!(
                    topic = %self.topic,
                    event_type = event.event_type(),
                    order_id = %event.order_id(),
                    book_id = %event.book_id(),
                    partition = ack.partition,
                    offset = ack.offset,
                    "Order published"
                );
                Ok(PublishReceipt {
                    topic: self.topic.clone(),
                    partition: ack.partition,
                    offset: ack.offset,
                })
            }
            Ok(Err(err)) => {
                PublishMetrics::record_publish_error();
                tracing::error!(
                    topic = %self.topic,
                    order_id = %event.order_id(),
                    error = %err,
                    "Failed to publish order"
                );
                Err(err.into())
            }
            Err(_) => {
                PublishMetrics::record_publish_error();
                tracing::error!(
                    topic = %self.topic,
                    order_id = %event.order_id(),
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Broker did not acknowledge order in time"
                );
                Err(PublishError::Unavailable(format!(
                    "no acknowledgement within {:?}",
                    self.timeout
                )))
            }
        }
    }

    /// [`publish`](Self::publish), retrying unavailability with backoff.
    ///
    /// Every attempt sends the same envelope, so a consumer seeing duplicates
    /// can recognise them by `orderId`.
    ///
    /// # Errors
    ///
    /// Returns the last [`PublishError`] once retries are exhausted, or the
    /// first non-retryable one.
    pub async fn publish_with_retry(
        &self,
        event: &OrderPlaced,
        policy: &RetryPolicy,
    ) -> Result<PublishReceipt, PublishError> {
        retry_with_predicate(policy, "order.publish", || self.publish(event), PublishError::is_retryable).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bookbazaar_core::event::{BookId, OrderId, Quantity};
    use bookbazaar_testing::InMemoryEventLog;

    fn order() -> OrderPlaced {
        OrderPlaced::new(OrderId::new("o-1"), BookId::new(42), Quantity::new(3).unwrap())
    }

    #[tokio::test]
    async fn publish_appends_json_keyed_by_book() {
        let log = InMemoryEventLog::new();
        let publisher = OrderPublisher::for_order_topic(Arc::new(log.clone()));

        let receipt = publisher.publish(&order()).await.unwrap();

        let records = log.records(topics::ORDER_PLACED);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key.as_deref(), Some("42"));
        assert_eq!(records[0].partition, receipt.partition);
        assert_eq!(OrderPlaced::from_bytes(&records[0].payload).unwrap(), order());
    }

    #[tokio::test]
    async fn outage_is_unavailable() {
        let log = InMemoryEventLog::new();
        log.set_available(false);
        let publisher = OrderPublisher::for_order_topic(Arc::new(log.clone()));

        let err = publisher.publish(&order()).await.unwrap_err();

        assert!(matches!(err, PublishError::Unavailable(_)));
        assert_eq!(log.record_count(topics::ORDER_PLACED), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_acknowledgement_times_out() {
        let log = InMemoryEventLog::new();
        log.set_append_latency(Some(Duration::from_secs(60)));
        let publisher = OrderPublisher::for_order_topic(Arc::new(log.clone())).with_timeout(Duration::from_secs(5));

        let err = publisher.publish(&order()).await.unwrap_err();

        assert!(matches!(err, PublishError::Unavailable(_)));
    }

    #[tokio::test]
    async fn retry_resends_the_same_envelope() {
        let log = InMemoryEventLog::new();
        log.set_available(false);
        let publisher = OrderPublisher::for_order_topic(Arc::new(log.clone()));
        let policy = RetryPolicy::builder()
            .max_retries(20)
            .initial_delay(Duration::from_millis(5))
            .max_delay(Duration::from_millis(5))
            .build();

        let restore = log.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            restore.set_available(true);
        });

        publisher.publish_with_retry(&order(), &policy).await.unwrap();

        let records = log.records(topics::ORDER_PLACED);
        assert_eq!(records.len(), 1);
        assert_eq!(OrderPlaced::from_bytes(&records[0].payload).unwrap().order_id().as_str(), "o-1");
    }
}
