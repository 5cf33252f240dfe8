//! Strategy interface (§9): a capability handle, not a back-reference.
//! Strategies receive an `EngineHandle` at registration and can submit,
//! cancel, or modify orders through it; they never hold the engine itself,
//! so there is no cyclic `Strategy <-> Engine` ownership graph.

use crate::engine::order::{ExecutionReport, OrderSide, OrderType};
use crate::wire::messages::{Quote, Trade};
use std::sync::Arc;

/// Minimal capability surface exposed to a strategy. The engine implements
/// this trait and hands out an `Arc<dyn EngineHandle>`; strategies never see
/// the concrete engine type.
pub trait EngineHandle: Send + Sync {
    fn submit_order(&self, symbol_id: u32, side: OrderSide, order_type: OrderType, price: f64, quantity: f64, strategy_id: &str) -> u64;
    fn cancel_order(&self, order_id: u64) -> bool;
    fn modify_order(&self, order_id: u64, new_price: f64, new_quantity: f64) -> bool;
}

/// Market-data and order-lifecycle callbacks a registered strategy
/// implements; replaces the source's Strategy base-class hierarchy.
pub trait StrategyCallbacks: Send + Sync {
    fn on_trade(&self, _symbol_id: u32, _trade: &Trade) {}
    fn on_quote(&self, _symbol_id: u32, _quote: &Quote) {}
    fn on_book_update(&self, _symbol_id: u32) {}
    fn on_ack(&self, _order_id: u64) {}
    fn on_execution(&self, _report: &ExecutionReport) {}
    fn on_reject(&self, _order_id: u64, _reason: &str) {}
}

pub struct RegisteredStrategy {
    pub strategy_id: String,
    pub callbacks: Arc<dyn StrategyCallbacks>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingStrategy {
        trades_seen: AtomicU64,
    }

    impl StrategyCallbacks for CountingStrategy {
        fn on_trade(&self, _symbol_id: u32, _trade: &Trade) {
            self.trades_seen.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_default_callbacks_are_noops() {
        struct Silent;
        impl StrategyCallbacks for Silent {}
        let s = Silent;
        s.on_ack(1);
        s.on_reject(1, "nope");
    }

    #[test]
    fn test_overridden_callback_fires() {
        let strategy = CountingStrategy { trades_seen: AtomicU64::new(0) };
        let trade = Trade { symbol_id: 1, trade_id: 1, price: 10.0, quantity: 1.0, buyer_broker: [0; 8], seller_broker: [0; 8], trade_time: 0 };
        strategy.on_trade(1, &trade);
        assert_eq!(strategy.trades_seen.load(Ordering::Relaxed), 1);
    }
}
