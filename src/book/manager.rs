//! Multi-symbol book manager.
//!
//! Symbol-set mutation (add/remove a book) takes the map's write lock;
//! per-book updates never touch this lock at all — callers look the book
//! up once (a cheap read-lock + `Arc` clone) and then drive it lock-free.

use crate::book::book::OrderBook;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct BookManager {
    books: RwLock<HashMap<u32, Arc<OrderBook>>>,
}

impl BookManager {
    pub fn new() -> Self {
        Self { books: RwLock::new(HashMap::new()) }
    }

    pub fn add_book(&self, symbol_id: u32, tick_size: f64) -> Arc<OrderBook> {
        let mut books = self.books.write();
        let book = books
            .entry(symbol_id)
            .or_insert_with(|| Arc::new(OrderBook::new(symbol_id, tick_size)))
            .clone();
        info!(symbol_id, "order book registered");
        book
    }

    pub fn get_book(&self, symbol_id: u32) -> Option<Arc<OrderBook>> {
        self.books.read().get(&symbol_id).cloned()
    }

    pub fn remove_book(&self, symbol_id: u32) -> Option<Arc<OrderBook>> {
        let removed = self.books.write().remove(&symbol_id);
        if removed.is_some() {
            info!(symbol_id, "order book removed");
        }
        removed
    }

    pub fn has_book(&self, symbol_id: u32) -> bool {
        self.books.read().contains_key(&symbol_id)
    }

    pub fn symbols(&self) -> Vec<u32> {
        self.books.read().keys().copied().collect()
    }

    pub fn book_count(&self) -> usize {
        self.books.read().len()
    }
}

impl Default for BookManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::level::Side;

    #[test]
    fn test_manager_add_and_lookup() {
        let manager = BookManager::new();
        manager.add_book(1, 0.01);
        assert!(manager.has_book(1));
        assert_eq!(manager.book_count(), 1);

        let book = manager.get_book(1).unwrap();
        book.add_order(1, Side::Bid, 100.0, 10.0, 1);
        assert_eq!(manager.get_book(1).unwrap().best_bid(), 100.0);
    }

    #[test]
    fn test_manager_remove() {
        let manager = BookManager::new();
        manager.add_book(1, 0.01);
        assert!(manager.remove_book(1).is_some());
        assert!(!manager.has_book(1));
        assert!(manager.remove_book(1).is_none());
    }
}
