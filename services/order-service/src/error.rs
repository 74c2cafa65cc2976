//! Error types of the order service.

use bookbazaar_core::event::EventError;
use bookbazaar_core::event_log::EventLogError;
use bookbazaar_web::AppError;
use thiserror::Error;

/// Failure to get an envelope acknowledged by the event log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The broker did not acknowledge: unreachable, timed out, or refused the write.
    ///
    /// Nothing is known to be stored; the caller may retry with the same envelope.
    #[error("Event log unavailable: {0}")]
    Unavailable(String),

    /// The envelope could not be encoded.
    #[error("Failed to encode envelope: {0}")]
    Encoding(#[from] EventError),
}

impl PublishError {
    /// Whether retrying the same envelope may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<EventLogError> for PublishError {
    fn from(err: EventLogError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Outcome of a rejected order request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The request failed validation; nothing was published.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The order was not acknowledged by the event log and is not accepted.
    #[error("Order could not be published: {0}")]
    PublishUnavailable(String),

    /// The service failed on its own side, e.g. could not encode a valid order.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PublishError> for OrderError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Unavailable(reason) => Self::PublishUnavailable(reason),
            PublishError::Encoding(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidRequest(message) => Self::invalid_request(message),
            OrderError::PublishUnavailable(reason) => Self::unavailable(
                "PUBLISH_UNAVAILABLE",
                "The order could not be accepted right now, please retry",
            )
            .with_source(anyhow::anyhow!(reason)),
            OrderError::Internal(reason) => {
                Self::internal("The order could not be processed").with_source(anyhow::anyhow!(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn broker_errors_become_unavailable() {
        let err: PublishError = EventLogError::Timeout(std::time::Duration::from_secs(5)).into();
        assert!(matches!(err, PublishError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn order_errors_map_to_http() {
        let invalid: AppError = OrderError::InvalidRequest("bookId must be an integer".into()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code(), "INVALID_REQUEST");

        let unavailable: AppError = OrderError::PublishUnavailable("no ack".into()).into();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.code(), "PUBLISH_UNAVAILABLE");
    }

    #[test]
    fn encoding_failure_is_a_server_error() {
        let err: OrderError = PublishError::Encoding(EventError::SerializationError("bad float".into())).into();
        assert!(matches!(err, OrderError::Internal(_)));
        assert!(!PublishError::Encoding(EventError::SerializationError("x".into())).is_retryable());

        let response: AppError = err.into();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.code(), "INTERNAL_SERVER_ERROR");
    }
}
