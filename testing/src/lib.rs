//! # BookBazaar Testing
//!
//! Test doubles for the BookBazaar order relay.
//!
//! This crate provides:
//! - [`InMemoryEventLog`]: a partitioned, group-aware event log
//! - Deterministic environment: [`FixedClock`], [`SequentialOrderIds`]
//! - Handler doubles: [`RecordingHandler`], [`FailingHandler`]
//!
//! ## Example
//!
//! ```ignore
//! use bookbazaar_testing::{InMemoryEventLog, RecordingHandler, test_clock};
//!
//! #[tokio::test]
//! async fn order_reaches_handler() {
//!     let log = InMemoryEventLog::new();
//!     let handler = RecordingHandler::new();
//!     // wire the publisher and consumer against `log` and `handler`...
//!     handler.wait_for(1, Duration::from_secs(1)).await;
//!     assert_eq!(handler.events().len(), 1);
//! }
//! ```

pub mod event_log;

pub use event_log::InMemoryEventLog;
pub use mocks::{FailingHandler, FixedClock, RecordingHandler, SequentialOrderIds, test_clock};

/// Mock implementations of environment and handler traits.
pub mod mocks {
    use bookbazaar_core::environment::{Clock, OrderIdGenerator};
    use bookbazaar_core::event::{OrderId, OrderPlaced};
    use bookbazaar_core::handler::{HandlerFuture, OrderEventHandler, ProcessingError};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use bookbazaar_testing::mocks::FixedClock;
    /// use bookbazaar_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
    }

    /// Predictable order ids: `order-1`, `order-2`, ...
    #[derive(Debug, Default)]
    pub struct SequentialOrderIds {
        next: AtomicU64,
    }

    impl SequentialOrderIds {
        /// Start counting from `order-1`.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }
    }

    impl OrderIdGenerator for SequentialOrderIds {
        fn next_id(&self) -> OrderId {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            OrderId::new(format!("order-{n}"))
        }
    }

    /// Handler that records every envelope it is given, in delivery order.
    ///
    /// Clones share the same record, so a test can keep one clone and hand
    /// another to the consumer.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingHandler {
        events: Arc<Mutex<Vec<OrderPlaced>>>,
        handled: Arc<Notify>,
    }

    impl RecordingHandler {
        /// Create a handler with nothing recorded.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Every envelope handled so far, duplicates included.
        #[must_use]
        pub fn events(&self) -> Vec<OrderPlaced> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of envelopes handled so far.
        #[must_use]
        pub fn count(&self) -> usize {
            self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
        }

        /// Wait until at least `count` envelopes were handled or `timeout` elapses.
        ///
        /// Returns whether the count was reached.
        pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
            let wait = async {
                loop {
                    let notified = self.handled.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();
                    if self.count() >= count {
                        return;
                    }
                    notified.await;
                }
            };
            tokio::time::timeout(timeout, wait).await.is_ok()
        }
    }

    impl OrderEventHandler for RecordingHandler {
        fn handle<'a>(&'a self, event: &'a OrderPlaced) -> HandlerFuture<'a> {
            Box::pin(async move {
                self.events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(event.clone());
                self.handled.notify_waiters();
                Ok(())
            })
        }
    }

    /// Handler that fails a configurable number of times before delegating.
    ///
    /// Every call, failed or not, is counted in [`FailingHandler::attempts`].
    #[derive(Debug, Clone)]
    pub struct FailingHandler {
        failures_left: Arc<AtomicUsize>,
        attempts: Arc<AtomicUsize>,
        error: ProcessingError,
        inner: RecordingHandler,
    }

    impl FailingHandler {
        /// Fail the first `failures` calls with `error`, then record normally.
        #[must_use]
        pub fn failing_times(failures: usize, error: ProcessingError) -> Self {
            Self {
                failures_left: Arc::new(AtomicUsize::new(failures)),
                attempts: Arc::new(AtomicUsize::new(0)),
                error,
                inner: RecordingHandler::new(),
            }
        }

        /// Fail every call with `error`.
        #[must_use]
        pub fn always(error: ProcessingError) -> Self {
            Self::failing_times(usize::MAX, error)
        }

        /// Number of times `handle` was called.
        #[must_use]
        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        /// The recorder that receives envelopes once failures run out.
        #[must_use]
        pub const fn recorded(&self) -> &RecordingHandler {
            &self.inner
        }
    }

    impl OrderEventHandler for FailingHandler {
        fn handle<'a>(&'a self, event: &'a OrderPlaced) -> HandlerFuture<'a> {
            Box::pin(async move {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                let failed = self
                    .failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok();
                if failed {
                    return Err(self.error.clone());
                }
                self.inner.handle(event).await
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bookbazaar_core::environment::{Clock, OrderIdGenerator};
    use bookbazaar_core::event::{BookId, OrderId, OrderPlaced, Quantity};
    use bookbazaar_core::handler::{OrderEventHandler, ProcessingError};
    use std::time::Duration;

    fn order(n: u32) -> OrderPlaced {
        OrderPlaced::new(
            OrderId::new(format!("order-{n}")),
            BookId::new(1),
            Quantity::new(n).unwrap(),
        )
    }

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialOrderIds::new();
        assert_eq!(ids.next_id().as_str(), "order-1");
        assert_eq!(ids.next_id().as_str(), "order-2");
    }

    #[tokio::test]
    async fn recording_handler_keeps_delivery_order() {
        let handler = RecordingHandler::new();
        handler.handle(&order(1)).await.unwrap();
        handler.handle(&order(2)).await.unwrap();

        let quantities: Vec<_> = handler.events().iter().map(|e| e.quantity().get()).collect();
        assert_eq!(quantities, vec![1, 2]);
        assert!(handler.wait_for(2, Duration::from_millis(10)).await);
        assert!(!handler.wait_for(3, Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn failing_handler_recovers_after_failures() {
        let handler = FailingHandler::failing_times(2, ProcessingError::Transient("busy".into()));

        assert!(handler.handle(&order(1)).await.is_err());
        assert!(handler.handle(&order(1)).await.is_err());
        assert!(handler.handle(&order(1)).await.is_ok());

        assert_eq!(handler.attempts(), 3);
        assert_eq!(handler.recorded().count(), 1);
    }

    #[tokio::test]
    async fn always_failing_handler_never_records() {
        let handler = FailingHandler::always(ProcessingError::Permanent("bad".into()));
        for _ in 0..5 {
            assert_eq!(
                handler.handle(&order(1)).await,
                Err(ProcessingError::Permanent("bad".into()))
            );
        }
        assert_eq!(handler.recorded().count(), 0);
    }
}
