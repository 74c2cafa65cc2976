//! Custom Axum extractors.

use crate::middleware::from_headers;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::fmt;
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Prefers the ID assigned by [`correlation_id_layer`](crate::middleware::correlation_id_layer),
/// so handler logs and the response header agree. Without the layer it falls
/// back to the `X-Correlation-ID` header, then to a fresh UUID v4.
///
/// # Example
///
/// ```ignore
/// async fn place_order(correlation_id: CorrelationId, Json(req): Json<PlaceOrderRequest>) -> ... {
///     tracing::info!(correlation_id = %correlation_id, "Placing order");
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(assigned) = parts.extensions.get::<Self>() {
            return Ok(*assigned);
        }

        Ok(Self(from_headers(&parts.headers).unwrap_or_else(Uuid::new_v4)))
    }
}
