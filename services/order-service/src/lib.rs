//! # Order Service
//!
//! Accepts book orders over HTTP and relays them through the event log.
//!
//! ```text
//! POST /orders ──► OrderIntakeService ──► OrderPublisher ──► order.placed
//!                                                               │
//!                              OrderEventConsumer ◄─────────────┘
//!                                      │
//!                                      ▼
//!                             OrderEventHandler (dedup + log)
//! ```
//!
//! An order is acknowledged only after the event log stored it, and is
//! delivered at least once to every consumer group subscribed to the topic.
//! Orders for the same book share a partition key and are delivered in the
//! order they were accepted.
//!
//! ## Modules
//!
//! - [`config`]: environment configuration
//! - [`intake`]: validation and order acceptance
//! - [`publisher`]: appends `OrderPlaced` envelopes with a bounded wait
//! - [`runtime`]: consumer loop, handlers and application lifecycle
//! - [`server`]: HTTP routes

pub mod config;
pub mod error;
pub mod intake;
pub mod publisher;
pub mod runtime;
pub mod server;

pub use config::{Config, ConfigError, EventLogBackend};
pub use error::{OrderError, PublishError};
pub use intake::{OrderAccepted, OrderIntakeService, PlaceOrder};
pub use publisher::{OrderPublisher, PublishReceipt};
pub use runtime::{Application, ConsumerHandle, ConsumerState, OrderEventConsumer, StartupError};
pub use server::{AppState, build_router};
