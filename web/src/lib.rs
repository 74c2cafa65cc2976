//! Axum integration shared by the BookBazaar HTTP services.
//!
//! - [`AppError`]: JSON error responses with stable codes
//! - [`middleware::correlation_id_layer`]: per-request correlation IDs in spans and headers
//! - [`CorrelationId`]: extractor for the current request's correlation ID
//! - [`handlers`]: `GET /health` and `GET /metrics`
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::{get, post}};
//! use bookbazaar_web::{handlers::health_check, middleware::correlation_id_layer};
//!
//! let app = Router::new()
//!     .route("/health", get(health_check))
//!     .route("/orders", post(place_order))
//!     .layer(correlation_id_layer())
//!     .with_state(state);
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::CorrelationId;
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
