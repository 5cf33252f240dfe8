//! Internal order record and execution report (§3): the types that flow
//! between strategies, the risk gate, and venue dispatch.

use crate::time::wall_clock_ns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    Ioc,
    Fok,
    Gtc,
    Gtd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Submitted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: u64,
    pub client_order_id: String,
    pub symbol_id: u32,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    pub filled_quantity: f64,
    pub status: OrderStatus,
    pub strategy_id: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub avg_fill_price: f64,
}

impl Order {
    pub fn new(order_id: u64, client_order_id: String, symbol_id: u32, order_type: OrderType, side: OrderSide, price: f64, quantity: f64, strategy_id: String) -> Self {
        let now = wall_clock_ns();
        Self {
            order_id,
            client_order_id,
            symbol_id,
            order_type,
            side,
            price,
            quantity,
            filled_quantity: 0.0,
            status: OrderStatus::Pending,
            strategy_id,
            created_at: now,
            updated_at: now,
            avg_fill_price: 0.0,
        }
    }

    pub fn leaves_quantity(&self) -> f64 {
        self.quantity - self.filled_quantity
    }

    pub fn apply_fill(&mut self, executed_price: f64, executed_quantity: f64) {
        let total_filled = self.filled_quantity + executed_quantity;
        if total_filled > 0.0 {
            self.avg_fill_price = (self.avg_fill_price * self.filled_quantity + executed_price * executed_quantity) / total_filled;
        }
        self.filled_quantity = total_filled;
        self.status = if self.leaves_quantity() <= 0.0 { OrderStatus::Filled } else { OrderStatus::PartiallyFilled };
        self.updated_at = wall_clock_ns();
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub order_id: u64,
    pub execution_id: u64,
    pub symbol_id: u32,
    pub side: OrderSide,
    pub executed_price: f64,
    pub executed_quantity: f64,
    pub commission: f64,
    pub execution_time: u64,
    pub venue: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaves_quantity() {
        let order = Order::new(1, "C1".to_string(), 1, OrderType::Limit, OrderSide::Buy, 100.0, 500.0, "S1".to_string());
        assert_eq!(order.leaves_quantity(), 500.0);
    }

    #[test]
    fn test_apply_fill_partial_then_full() {
        let mut order = Order::new(1, "C1".to_string(), 1, OrderType::Limit, OrderSide::Buy, 100.0, 500.0, "S1".to_string());
        order.apply_fill(99.0, 200.0);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert!((order.avg_fill_price - 99.0).abs() < 1e-9);
        order.apply_fill(101.0, 300.0);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.leaves_quantity(), 0.0);
        assert!((order.avg_fill_price - 100.2).abs() < 1e-9);
    }
}
