//! Order event handlers.
//!
//! The consumer delegates every decoded [`OrderPlaced`] to an
//! [`OrderEventHandler`]. Delivery is at-least-once, so a handler may see the
//! same envelope twice (redelivery after a crash or a rebalance). Wrap
//! non-idempotent handlers in [`DeduplicatingHandler`].

use bookbazaar_core::event::{OrderId, OrderPlaced};
use bookbazaar_core::handler::{HandlerFuture, OrderEventHandler};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Reference handler: records each order in the log and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOrderHandler;

impl OrderEventHandler for LoggingOrderHandler {
    fn handle<'a>(&'a self, event: &'a OrderPlaced) -> HandlerFuture<'a> {
        Box::pin(async move {
            tracing::info!(
                order_id = %event.order_id(),
                book_id = %event.book_id(),
                quantity = %event.quantity(),
                "Received order"
            );
            Ok(())
        })
    }
}

/// Default number of order ids remembered by [`DeduplicatingHandler`].
pub const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct SeenOrders {
    ids: HashSet<OrderId>,
    /// Insertion order, oldest first, for eviction.
    order: VecDeque<OrderId>,
}

/// Skips envelopes whose `orderId` was already handled successfully.
///
/// Remembers the last `capacity` order ids; older ones are forgotten, so a
/// duplicate arriving after that many newer orders is handled again. An id is
/// only remembered once the inner handler succeeded, so failed attempts are
/// retried normally.
#[derive(Debug)]
pub struct DeduplicatingHandler<H> {
    inner: H,
    capacity: usize,
    seen: Mutex<SeenOrders>,
}

impl<H: OrderEventHandler> DeduplicatingHandler<H> {
    /// Deduplicate `inner` over the last [`DEFAULT_DEDUP_CAPACITY`] orders.
    #[must_use]
    pub fn new(inner: H) -> Self {
        Self::with_capacity(inner, DEFAULT_DEDUP_CAPACITY)
    }

    /// Deduplicate `inner` over the last `capacity` orders (at least one).
    #[must_use]
    pub fn with_capacity(inner: H, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            seen: Mutex::new(SeenOrders::default()),
        }
    }

    /// The wrapped handler.
    #[must_use]
    pub const fn inner(&self) -> &H {
        &self.inner
    }

    fn already_seen(&self, id: &OrderId) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .contains(id)
    }

    fn remember(&self, id: &OrderId) {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if !seen.ids.insert(id.clone()) {
            return;
        }
        seen.order.push_back(id.clone());
        while seen.order.len() > self.capacity {
            if let Some(oldest) = seen.order.pop_front() {
                seen.ids.remove(&oldest);
            }
        }
    }
}

impl<H: OrderEventHandler> OrderEventHandler for DeduplicatingHandler<H> {
    fn handle<'a>(&'a self, event: &'a OrderPlaced) -> HandlerFuture<'a> {
        Box::pin(async move {
            if self.already_seen(event.order_id()) {
                tracing::debug!(order_id = %event.order_id(), "Skipping duplicate order");
                return Ok(());
            }

            self.inner.handle(event).await?;
            self.remember(event.order_id());
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bookbazaar_core::event::{BookId, Quantity};
    use bookbazaar_core::handler::ProcessingError;
    use bookbazaar_testing::{FailingHandler, RecordingHandler};

    fn order(id: &str) -> OrderPlaced {
        OrderPlaced::new(OrderId::new(id), BookId::new(1), Quantity::new(1).unwrap())
    }

    #[tokio::test]
    async fn logging_handler_always_succeeds() {
        assert!(LoggingOrderHandler.handle(&order("o-1")).await.is_ok());
    }

    #[tokio::test]
    async fn duplicates_reach_the_inner_handler_once() {
        let recorder = RecordingHandler::new();
        let handler = DeduplicatingHandler::new(recorder.clone());

        handler.handle(&order("o-1")).await.unwrap();
        handler.handle(&order("o-1")).await.unwrap();
        handler.handle(&order("o-2")).await.unwrap();

        assert_eq!(recorder.count(), 2);
    }

    #[tokio::test]
    async fn failed_attempts_are_not_remembered() {
        let failing = FailingHandler::failing_times(1, ProcessingError::Transient("busy".into()));
        let handler = DeduplicatingHandler::new(failing.clone());

        assert!(handler.handle(&order("o-1")).await.is_err());
        assert!(handler.handle(&order("o-1")).await.is_ok());
        assert!(handler.handle(&order("o-1")).await.is_ok());

        assert_eq!(failing.attempts(), 2);
        assert_eq!(failing.recorded().count(), 1);
    }

    #[tokio::test]
    async fn memory_is_bounded() {
        let recorder = RecordingHandler::new();
        let handler = DeduplicatingHandler::with_capacity(recorder.clone(), 2);

        for id in ["a", "b", "c"] {
            handler.handle(&order(id)).await.unwrap();
        }
        // "a" was evicted, so it is handled again; "c" is still remembered.
        handler.handle(&order("a")).await.unwrap();
        handler.handle(&order("c")).await.unwrap();

        assert_eq!(recorder.count(), 4);
    }
}
