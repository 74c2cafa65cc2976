//! HTTP routes for the catalog service.

use crate::books::{Book, BookRepository};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use bookbazaar_core::event::BookId;
use bookbazaar_web::handlers::health_check;
use bookbazaar_web::middleware::correlation_id_layer;
use bookbazaar_web::{AppError, WebResult};
use std::sync::Arc;

/// Build the catalog router over `repository`.
pub fn build_router(repository: Arc<dyn BookRepository>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/books", get(list_books))
        .route("/books/:id", get(get_book))
        .layer(correlation_id_layer())
        .with_state(repository)
}

/// `GET /books`
#[allow(clippy::unused_async)]
async fn list_books(State(repository): State<Arc<dyn BookRepository>>) -> Json<Vec<Book>> {
    Json(repository.find_all())
}

/// `GET /books/{id}`
#[allow(clippy::unused_async)]
async fn get_book(State(repository): State<Arc<dyn BookRepository>>, Path(id): Path<String>) -> WebResult<Json<Book>> {
    let book_id: BookId = id
        .parse()
        .map_err(|_| AppError::invalid_request(format!("Book id must be an integer, got '{id}'")))?;

    repository
        .find_by_id(book_id)
        .map(Json)
        .ok_or_else(|| AppError::not_found("Book", book_id))
}
