//! # BookBazaar Core
//!
//! Core types and traits for the BookBazaar order relay.
//!
//! An order request is turned into an [`OrderPlaced`](event::OrderPlaced)
//! envelope, appended to a durable, ordered [`EventLog`](event_log::EventLog),
//! and delivered at-least-once to every consumer group subscribed to the topic.
//!
//! ## Modules
//!
//! - [`event`]: the envelope, its identifiers, and the JSON wire format
//! - [`event_log`]: the broker contract (append, subscribe, poll, commit)
//! - [`handler`]: the consumer-side processing contract
//! - [`environment`]: injected clock and order-id generator
//! - [`topics`]: fixed topic and consumer-group names
//!
//! ## Example
//!
//! ```ignore
//! use bookbazaar_core::{event::Event, event_log::EventLog, topics};
//!
//! async fn relay(log: &dyn EventLog, event: &OrderPlaced) -> Result<(), Box<dyn std::error::Error>> {
//!     let payload = event.to_bytes()?;
//!     log.append(topics::ORDER_PLACED, &event.partition_key(), &payload).await?;
//!
//!     let mut subscription = log.subscribe(topics::ORDER_PLACED, topics::ORDER_SERVICE_GROUP).await?;
//!     if let Some(record) = subscription.poll(Duration::from_secs(1)).await? {
//!         subscription.commit(&record).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod environment;
pub mod event;
pub mod event_log;
pub mod handler;

// Re-export commonly used types
pub use event::{BookId, Event, EventError, OrderId, OrderPlaced, Quantity};
pub use event_log::{AppendAck, EventLog, EventLogError, LogRecord, Subscription};
pub use handler::{OrderEventHandler, ProcessingError};

/// Fixed logical names shared by producers and consumers.
pub mod topics {
    /// Topic carrying [`OrderPlaced`](crate::event::OrderPlaced) envelopes.
    pub const ORDER_PLACED: &str = "order.placed";

    /// Topic receiving records the order consumer could not process.
    pub const ORDER_PLACED_DLQ: &str = "order.placed.dlq";

    /// Consumer group of the primary order consumer.
    pub const ORDER_SERVICE_GROUP: &str = "order-service";
}
