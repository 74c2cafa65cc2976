//! Book model and storage.

use bookbazaar_core::event::BookId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A book offered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Catalog identifier, referenced by orders as `bookId`
    pub id: BookId,
    /// Title
    pub title: String,
    /// Author
    pub author: String,
    /// Price in cents
    pub price_cents: u64,
}

impl Book {
    /// Create a book.
    #[must_use]
    pub fn new(id: i64, title: impl Into<String>, author: impl Into<String>, price_cents: u64) -> Self {
        Self {
            id: BookId::new(id),
            title: title.into(),
            author: author.into(),
            price_cents,
        }
    }
}

/// Read access to the catalog.
pub trait BookRepository: Send + Sync {
    /// Every book, ordered by id.
    fn find_all(&self) -> Vec<Book>;

    /// The book with `id`, if any.
    fn find_by_id(&self, id: BookId) -> Option<Book>;
}

/// Catalog held in memory, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookRepository {
    books: BTreeMap<BookId, Book>,
}

impl InMemoryBookRepository {
    /// Catalog containing `books`; a later book replaces an earlier one with the same id.
    #[must_use]
    pub fn new(books: impl IntoIterator<Item = Book>) -> Self {
        Self {
            books: books.into_iter().map(|book| (book.id, book)).collect(),
        }
    }

    /// Catalog with a handful of sample books.
    #[must_use]
    pub fn seeded() -> Self {
        Self::new([
            Book::new(1, "The Rust Programming Language", "Steve Klabnik & Carol Nichols", 3999),
            Book::new(2, "Designing Data-Intensive Applications", "Martin Kleppmann", 4599),
            Book::new(3, "Kafka: The Definitive Guide", "Gwen Shapira et al.", 4999),
            Book::new(42, "The Hitchhiker's Guide to the Galaxy", "Douglas Adams", 999),
        ])
    }

    /// Number of books.
    #[must_use]
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl BookRepository for InMemoryBookRepository {
    fn find_all(&self) -> Vec<Book> {
        self.books.values().cloned().collect()
    }

    fn find_by_id(&self, id: BookId) -> Option<Book> {
        self.books.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn books_are_listed_by_id() {
        let repo = InMemoryBookRepository::new([Book::new(9, "B", "b", 1), Book::new(3, "A", "a", 1)]);
        let ids: Vec<i64> = repo.find_all().iter().map(|b| b.id.get()).collect();
        assert_eq!(ids, vec![3, 9]);
    }

    #[test]
    fn lookup_by_id() {
        let repo = InMemoryBookRepository::seeded();
        assert_eq!(repo.find_by_id(BookId::new(42)).map(|b| b.author), Some("Douglas Adams".to_string()));
        assert_eq!(repo.find_by_id(BookId::new(-1)), None);
    }

    #[test]
    fn duplicate_ids_keep_the_last_book() {
        let repo = InMemoryBookRepository::new([Book::new(1, "Old", "x", 1), Book::new(1, "New", "x", 2)]);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.find_by_id(BookId::new(1)).map(|b| b.title), Some("New".to_string()));
    }

    #[test]
    fn serializes_in_camel_case() {
        let json = serde_json::to_value(Book::new(1, "T", "A", 1250)).unwrap_or_default();
        assert_eq!(json["priceCents"], 1250);
        assert_eq!(json["id"], 1);
    }
}
