//! Consumer-side processing contract.
//!
//! A consumer decodes each delivered record into an [`OrderPlaced`] and hands
//! it to an [`OrderEventHandler`]. Delivery is at-least-once, so the same
//! envelope may be handled more than once: handlers must be idempotent or
//! wrapped in something that makes them so.

use crate::event::OrderPlaced;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised while processing a delivered envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    /// The failure may go away on retry (downstream busy, lock contention, ...).
    #[error("Transient processing failure: {0}")]
    Transient(String),

    /// Retrying will not help; the record should be dead-lettered.
    #[error("Permanent processing failure: {0}")]
    Permanent(String),
}

impl ProcessingError {
    /// Whether a local retry may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Boxed future returned by [`OrderEventHandler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ProcessingError>> + Send + 'a>>;

/// Application processing for delivered order events.
///
/// # Thread Safety
///
/// Handlers are shared behind `Arc` by the consumer task, so they must be
/// `Send + Sync`.
pub trait OrderEventHandler: Send + Sync {
    /// Process one delivered envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError`] if the envelope could not be processed. The
    /// consumer retries [`ProcessingError::Transient`] failures locally.
    fn handle<'a>(&'a self, event: &'a OrderPlaced) -> HandlerFuture<'a>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(ProcessingError::Transient("busy".into()).is_retryable());
        assert!(!ProcessingError::Permanent("bad data".into()).is_retryable());
    }
}
