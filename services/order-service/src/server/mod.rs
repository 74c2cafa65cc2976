//! HTTP server for the order service.
//!
//! - `POST /orders`: place an order
//! - `GET /health`: liveness
//! - `GET /metrics`: Prometheus scrape

pub mod orders;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
