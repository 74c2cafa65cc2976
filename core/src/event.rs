//! The placed-order fact and its wire format.
//!
//! An [`OrderPlaced`] envelope is created once by order intake, appended to the
//! event log by the publisher, and decoded by every consumer group that reads
//! the topic. It is value data: cloned and serialized across the boundary, never
//! mutated after construction.
//!
//! # Wire Format
//!
//! Envelopes travel as self-describing JSON so that producers and consumers can
//! be upgraded independently:
//!
//! ```json
//! { "orderId": "6f1c…", "bookId": 42, "quantity": 3 }
//! ```
//!
//! Field names are fixed. Consumers ignore fields they do not know about, so a
//! newer producer may add fields without breaking older consumers.
//!
//! # Example
//!
//! ```
//! use bookbazaar_core::event::{BookId, Event, OrderId, OrderPlaced, Quantity};
//!
//! let event = OrderPlaced::new(
//!     OrderId::new("order-1"),
//!     "42".parse::<BookId>().unwrap(),
//!     Quantity::new(3).unwrap(),
//! );
//!
//! let bytes = event.to_bytes().unwrap();
//! let decoded = OrderPlaced::from_bytes(&bytes).unwrap();
//! assert_eq!(event, decoded);
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// A field value violates the envelope's invariants.
    #[error("Invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending field (wire name)
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// An event that can be appended to the log and decoded by consumers.
///
/// The default encoding is JSON. Implementors only provide a stable, versioned
/// type identifier.
pub trait Event: Send + Sync + 'static {
    /// Stable event type identifier with a version suffix (e.g. `"OrderPlaced.v1"`).
    fn event_type(&self) -> &'static str;

    /// Serialize this event to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the event cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the bytes are not valid
    /// JSON, a required field is missing, or a field value is out of range.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_slice(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// Globally unique order identifier.
///
/// Minted exactly once per logical order, before the first append, and reused
/// for every retry of that publish.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Wrap an already-minted identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog book identifier.
///
/// Referentially depends on the catalog, but is not checked against it here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(i64);

impl BookId {
    /// Create a book identifier from its numeric value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The numeric value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl FromStr for BookId {
    type Err = EventError;

    /// Parse the string form used by inbound requests.
    ///
    /// No trimming or defaulting: anything that is not a base-10 `i64` is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self).map_err(|e| EventError::InvalidField {
            field: "bookId",
            reason: format!("'{s}' is not an integer identifier ({e})"),
        })
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of units ordered. Always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidField`] if `units` is zero.
    pub fn new(units: u32) -> Result<Self, EventError> {
        NonZeroU32::new(units)
            .map(Self)
            .ok_or_else(|| EventError::InvalidField {
                field: "quantity",
                reason: "must be at least 1".to_string(),
            })
    }

    /// The number of units.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<i64> for Quantity {
    type Error = EventError;

    fn try_from(units: i64) -> Result<Self, Self::Error> {
        let units = u32::try_from(units).map_err(|_| EventError::InvalidField {
            field: "quantity",
            reason: format!("{units} is out of range (1..={})", u32::MAX),
        })?;
        Self::new(units)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The "order placed" fact carried on the `order.placed` topic.
///
/// Fields are private so that an envelope, once built, cannot be altered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    order_id: OrderId,
    book_id: BookId,
    quantity: Quantity,
}

impl OrderPlaced {
    /// Build an envelope from already-validated parts.
    #[must_use]
    pub const fn new(order_id: OrderId, book_id: BookId, quantity: Quantity) -> Self {
        Self {
            order_id,
            book_id,
            quantity,
        }
    }

    /// The order identifier.
    #[must_use]
    pub const fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// The ordered book.
    #[must_use]
    pub const fn book_id(&self) -> BookId {
        self.book_id
    }

    /// Units ordered.
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Partition key used when appending: records for the same book stay in order.
    #[must_use]
    pub fn partition_key(&self) -> String {
        self.book_id.to_string()
    }
}

impl Event for OrderPlaced {
    fn event_type(&self) -> &'static str {
        "OrderPlaced.v1"
    }
}

impl fmt::Display for OrderPlaced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OrderPlaced {{ order_id: {}, book_id: {}, quantity: {} }}",
            self.order_id, self.book_id, self.quantity
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> OrderPlaced {
        OrderPlaced::new(
            OrderId::new("3b241101-e2bb-4255-8caf-4136c566a962"),
            BookId::new(42),
            Quantity::new(3).unwrap(),
        )
    }

    #[test]
    fn wire_format_uses_fixed_camel_case_names() {
        let value: serde_json::Value = serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "orderId": "3b241101-e2bb-4255-8caf-4136c566a962",
                "bookId": 42,
                "quantity": 3
            })
        );
    }

    #[test]
    fn decoding_ignores_unknown_fields() {
        let payload = br#"{"orderId":"o-1","bookId":7,"quantity":2,"currency":"EUR","v":2}"#;

        let event = OrderPlaced::from_bytes(payload).unwrap();

        assert_eq!(event.order_id().as_str(), "o-1");
        assert_eq!(event.book_id().get(), 7);
        assert_eq!(event.quantity().get(), 2);
    }

    #[test]
    fn decoding_rejects_zero_quantity() {
        let payload = br#"{"orderId":"o-1","bookId":7,"quantity":0}"#;

        assert!(matches!(
            OrderPlaced::from_bytes(payload),
            Err(EventError::DeserializationError(_))
        ));
    }

    #[test]
    fn decoding_rejects_missing_fields() {
        let payload = br#"{"orderId":"o-1","quantity":1}"#;

        assert!(OrderPlaced::from_bytes(payload).is_err());
    }

    #[test]
    fn book_id_parse_rejects_non_numeric() {
        assert!("abc".parse::<BookId>().is_err());
        assert!(" 42".parse::<BookId>().is_err());
        assert!("".parse::<BookId>().is_err());
        assert!("99999999999999999999".parse::<BookId>().is_err());
    }

    #[test]
    fn quantity_rejects_zero_and_negative() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::try_from(-1_i64).is_err());
        assert!(Quantity::try_from(i64::from(u32::MAX) + 1).is_err());
        assert_eq!(Quantity::try_from(5_i64).unwrap().get(), 5);
    }

    #[test]
    fn partition_key_is_book_id() {
        assert_eq!(sample().partition_key(), "42");
    }

    #[test]
    fn event_type_is_versioned() {
        assert_eq!(sample().event_type(), "OrderPlaced.v1");
    }

    proptest! {
        #[test]
        fn envelope_survives_the_wire(
            order_id in "[a-zA-Z0-9-]{1,40}",
            book_id in any::<i64>(),
            quantity in 1_u32..,
        ) {
            let event = OrderPlaced::new(
                OrderId::new(order_id),
                BookId::new(book_id),
                Quantity::new(quantity).unwrap(),
            );

            let decoded = OrderPlaced::from_bytes(&event.to_bytes().unwrap()).unwrap();
            prop_assert_eq!(decoded, event);
        }

        #[test]
        fn any_integer_text_parses_as_book_id(id in any::<i64>()) {
            prop_assert_eq!(id.to_string().parse::<BookId>().unwrap().get(), id);
        }
    }
}
