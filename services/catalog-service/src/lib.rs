//! # Catalog Service
//!
//! Read-only book lookup for BookBazaar.
//!
//! - `GET /books`: every book, ordered by id
//! - `GET /books/{id}`: one book, `404 NOT_FOUND` if absent
//! - `GET /health`: liveness
//!
//! The order service does not call this service; orders reference books by id
//! only.

pub mod books;
pub mod config;
pub mod server;

pub use books::{Book, BookRepository, InMemoryBookRepository};
pub use config::{Config, ConfigError};
pub use server::build_router;
