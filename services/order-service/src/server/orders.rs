//! `POST /orders`.

use super::state::AppState;
use crate::intake::{OrderAccepted, PlaceOrder};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use bookbazaar_web::{AppError, CorrelationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    /// Book identifier, as text
    pub book_id: String,
    /// Requested units
    pub quantity: i64,
}

/// Response for an order accepted for asynchronous processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderAcceptedResponse {
    /// Identifier minted for the order
    pub order_id: String,
    /// Parsed book identifier
    pub book_id: i64,
    /// Accepted quantity
    pub quantity: u32,
    /// Always `accepted`
    pub status: String,
    /// Human-readable summary
    pub message: String,
    /// When the order was accepted
    pub accepted_at: DateTime<Utc>,
}

impl From<OrderAccepted> for OrderAcceptedResponse {
    fn from(accepted: OrderAccepted) -> Self {
        Self {
            order_id: accepted.order_id.to_string(),
            book_id: accepted.book_id.get(),
            quantity: accepted.quantity.get(),
            status: "accepted".to_string(),
            message: "Order accepted for processing".to_string(),
            accepted_at: accepted.accepted_at,
        }
    }
}

/// Place an order.
///
/// # Endpoint
///
/// ```text
/// POST /orders
/// {"bookId": "42", "quantity": 3}
/// ```
///
/// - `200` with [`OrderAcceptedResponse`] once the order is stored in the event log
/// - `400 INVALID_REQUEST` for malformed bodies, non-integer `bookId`, or `quantity < 1`
/// - `503 PUBLISH_UNAVAILABLE` when the event log did not acknowledge
///
/// # Errors
///
/// Returns [`AppError`] as described above.
pub async fn place_order(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    body: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<Json<OrderAcceptedResponse>, AppError> {
    let Json(request) = body?;
    tracing::debug!(
        correlation_id = %correlation_id,
        book_id = %request.book_id,
        quantity = request.quantity,
        "Order request received"
    );

    let accepted = state
        .intake
        .place_order(PlaceOrder {
            book_id: request.book_id,
            quantity: request.quantity,
        })
        .await?;

    tracing::info!(
        correlation_id = %correlation_id,
        order_id = %accepted.order_id,
        "Order accepted"
    );

    Ok(Json(accepted.into()))
}
