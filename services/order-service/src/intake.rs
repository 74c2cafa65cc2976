//! Order intake: validate, mint an id, publish, acknowledge.
//!
//! Acceptance means "stored in the event log for asynchronous processing", not
//! "processed". A request that fails validation never reaches the log.

use crate::error::OrderError;
use crate::publisher::{OrderPublisher, PublishReceipt};
use bookbazaar_core::environment::{Clock, OrderIdGenerator};
use bookbazaar_core::event::{BookId, OrderId, OrderPlaced, Quantity};
use bookbazaar_runtime::metrics::PublishMetrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Inbound order request, as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    /// Book identifier as text; must parse as a 64-bit integer
    pub book_id: String,
    /// Requested units; must be between 1 and `u32::MAX`
    pub quantity: i64,
}

/// Acknowledgement that an order was accepted for asynchronous processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAccepted {
    /// Identifier minted for this order
    pub order_id: OrderId,
    /// Parsed book identifier
    pub book_id: BookId,
    /// Validated quantity
    pub quantity: Quantity,
    /// When the order was accepted
    pub accepted_at: DateTime<Utc>,
    /// Where the envelope was stored
    pub receipt: PublishReceipt,
}

/// Validates order requests and hands them to the [`OrderPublisher`].
#[derive(Clone)]
pub struct OrderIntakeService {
    publisher: OrderPublisher,
    ids: Arc<dyn OrderIdGenerator>,
    clock: Arc<dyn Clock>,
}

impl OrderIntakeService {
    /// Create an intake service.
    #[must_use]
    pub fn new(publisher: OrderPublisher, ids: Arc<dyn OrderIdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { publisher, ids, clock }
    }

    /// Validate `request`, publish an [`OrderPlaced`], and acknowledge it.
    ///
    /// # Errors
    ///
    /// - [`OrderError::InvalidRequest`] if `book_id` is not an integer or
    ///   `quantity` is outside `1..=u32::MAX`; nothing is published
    /// - [`OrderError::PublishUnavailable`] if the log did not acknowledge;
    ///   the order is not accepted
    /// - [`OrderError::Internal`] if the envelope could not be encoded
    pub async fn place_order(&self, request: PlaceOrder) -> Result<OrderAccepted, OrderError> {
        let (book_id, quantity) = validate(&request).inspect_err(|err| {
            PublishMetrics::record_rejected();
            tracing::info!(book_id = %request.book_id, quantity = request.quantity, error = %err, "Order rejected");
        })?;

        let order_id = self.ids.next_id();
        let event = OrderPlaced::new(order_id.clone(), book_id, quantity);
        tracing::debug!(order = %event, "Placing order");

        let receipt = self.publisher.publish(&event).await?;

        Ok(OrderAccepted {
            order_id,
            book_id,
            quantity,
            accepted_at: self.clock.now(),
            receipt,
        })
    }
}

/// Check a request without side effects.
///
/// # Errors
///
/// Returns [`OrderError::InvalidRequest`] naming the offending field.
pub fn validate(request: &PlaceOrder) -> Result<(BookId, Quantity), OrderError> {
    let book_id: BookId = request
        .book_id
        .parse()
        .map_err(|_| OrderError::InvalidRequest(format!("bookId '{}' is not an integer", request.book_id)))?;

    let quantity = Quantity::try_from(request.quantity).map_err(|_| {
        OrderError::InvalidRequest(format!(
            "quantity must be between 1 and {}, got {}",
            u32::MAX,
            request.quantity
        ))
    })?;

    Ok((book_id, quantity))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bookbazaar_core::environment::UuidOrderIds;
    use bookbazaar_core::event::Event;
    use bookbazaar_core::topics;
    use bookbazaar_testing::{InMemoryEventLog, SequentialOrderIds, test_clock};
    use proptest::prelude::*;

    fn service(log: &InMemoryEventLog) -> OrderIntakeService {
        OrderIntakeService::new(
            OrderPublisher::for_order_topic(Arc::new(log.clone())),
            Arc::new(SequentialOrderIds::new()),
            Arc::new(test_clock()),
        )
    }

    fn request(book_id: &str, quantity: i64) -> PlaceOrder {
        PlaceOrder {
            book_id: book_id.to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn valid_order_is_published_once_and_acknowledged() {
        let log = InMemoryEventLog::new();
        let accepted = service(&log).place_order(request("42", 3)).await.unwrap();

        assert_eq!(accepted.order_id.as_str(), "order-1");
        assert_eq!(accepted.book_id, BookId::new(42));
        assert_eq!(accepted.quantity.get(), 3);
        assert_eq!(accepted.accepted_at, test_clock().now());

        let records = log.records(topics::ORDER_PLACED);
        assert_eq!(records.len(), 1);
        let published = OrderPlaced::from_bytes(&records[0].payload).unwrap();
        assert_eq!(published.order_id(), &accepted.order_id);
        assert_eq!(published.book_id(), BookId::new(42));
        assert_eq!(published.quantity().get(), 3);
    }

    #[tokio::test]
    async fn non_numeric_book_id_is_rejected_without_publishing() {
        let log = InMemoryEventLog::new();
        let err = service(&log).place_order(request("abc", 3)).await.unwrap_err();

        assert!(matches!(err, OrderError::InvalidRequest(_)));
        assert_eq!(log.record_count(topics::ORDER_PLACED), 0);
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_without_publishing() {
        let log = InMemoryEventLog::new();
        let err = service(&log).place_order(request("1", 0)).await.unwrap_err();

        assert!(matches!(err, OrderError::InvalidRequest(_)));
        assert_eq!(log.record_count(topics::ORDER_PLACED), 0);
    }

    #[tokio::test]
    async fn outage_is_publish_unavailable() {
        let log = InMemoryEventLog::new();
        log.set_available(false);

        let err = service(&log).place_order(request("42", 1)).await.unwrap_err();
        assert!(matches!(err, OrderError::PublishUnavailable(_)));
    }

    #[tokio::test]
    async fn uuid_ids_are_unique_across_orders() {
        let log = InMemoryEventLog::new();
        let intake = OrderIntakeService::new(
            OrderPublisher::for_order_topic(Arc::new(log.clone())),
            Arc::new(UuidOrderIds),
            Arc::new(test_clock()),
        );

        let first = intake.place_order(request("7", 1)).await.unwrap();
        let second = intake.place_order(request("7", 1)).await.unwrap();

        assert_ne!(first.order_id, second.order_id);
        assert!(uuid::Uuid::parse_str(first.order_id.as_str()).is_ok());
    }

    #[test]
    fn whitespace_and_fractions_are_not_integers() {
        for bad in [" 42", "42 ", "4.2", "", "0x10", "99999999999999999999"] {
            assert!(validate(&request(bad, 1)).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn quantity_above_u32_is_rejected() {
        assert!(validate(&request("1", i64::from(u32::MAX))).is_ok());
        assert!(validate(&request("1", i64::from(u32::MAX) + 1)).is_err());
    }

    proptest! {
        #[test]
        fn any_integer_book_and_positive_quantity_validates(
            book in any::<i64>(),
            quantity in 1..=i64::from(u32::MAX),
        ) {
            let (book_id, qty) = validate(&request(&book.to_string(), quantity)).unwrap();
            prop_assert_eq!(book_id.get(), book);
            prop_assert_eq!(i64::from(qty.get()), quantity);
        }

        #[test]
        fn non_positive_quantity_never_validates(quantity in i64::MIN..=0) {
            prop_assert!(validate(&request("1", quantity)).is_err());
        }
    }
}
