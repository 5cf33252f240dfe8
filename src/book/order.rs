//! Per-order-id record held by the order book's internal map.

use crate::book::level::Side;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookOrder {
    pub price: f64,
    pub quantity: f64,
    pub side: Side,
    pub timestamp: u64,
}
