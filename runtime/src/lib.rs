//! # BookBazaar Runtime
//!
//! Resilience and observability building blocks shared by the order relay.
//!
//! ## Components
//!
//! - [`retry`]: exponential backoff policies and retry combinators
//! - [`retrying_log`]: an [`EventLog`](bookbazaar_core::event_log::EventLog)
//!   decorator that hides transient broker failures
//! - [`metrics`]: Prometheus counters and histograms for intake, publish and consume
//!
//! ## Example
//!
//! ```ignore
//! use bookbazaar_runtime::{RetryPolicy, RetryingEventLog};
//!
//! let log: Arc<dyn EventLog> = Arc::new(RetryingEventLog::new(inner_log, RetryPolicy::default()));
//! ```

/// Retry logic with exponential backoff
pub mod retry;

/// Event log decorator with bounded transient retries
pub mod retrying_log;

/// Prometheus metrics for observability
pub mod metrics;

pub use retry::{RetryPolicy, retry_with_backoff, retry_with_predicate};
pub use retrying_log::RetryingEventLog;
