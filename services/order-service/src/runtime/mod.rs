//! Background processing and lifecycle.

pub mod consumer;
pub mod handlers;
pub mod lifecycle;

pub use consumer::{ConsumerBuildError, ConsumerHandle, ConsumerState, OrderEventConsumer, OrderEventConsumerBuilder};
pub use handlers::{DeduplicatingHandler, LoggingOrderHandler};
pub use lifecycle::{Application, StartupError, build_event_log};
