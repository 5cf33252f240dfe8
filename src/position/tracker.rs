//! Position tracker (§4.6): per-symbol, per-strategy positions updated on
//! each fill, mark-to-marked by a background worker every 5 s.

use crate::time::monotonic_ns;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub symbol_id: u32,
    pub strategy_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub symbol_id: u32,
    pub signed_quantity: f64,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct Position {
    pub symbol_id: u32,
    pub quantity: f64,
    pub avg_cost: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub strategy_id: String,
    pub volatility: f64,
    pub beta: f64,
    pub sector: String,
    pub position_var_1d: f64,
    pub last_update: u64,
}

impl Position {
    fn new(symbol_id: u32, strategy_id: String, quantity: f64, price: f64, now_ns: u64) -> Self {
        Self {
            symbol_id,
            quantity,
            avg_cost: price,
            current_price: price,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
            strategy_id,
            volatility: 0.0,
            beta: 0.0,
            sector: String::new(),
            position_var_1d: 0.0,
            last_update: now_ns,
        }
    }

    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    /// Applies a fill's signed quantity and price per §4.6: weighted average
    /// cost on a same-sign add, realized P&L on a sign-reducing or
    /// sign-flipping fill.
    fn apply_fill(&mut self, signed_qty: f64, price: f64, now_ns: u64) {
        let same_sign = self.quantity == 0.0 || self.quantity.signum() == signed_qty.signum();
        if same_sign {
            let new_qty = self.quantity + signed_qty;
            if new_qty != 0.0 {
                self.avg_cost = (self.quantity * self.avg_cost + signed_qty * price) / new_qty;
            }
            self.quantity = new_qty;
        } else {
            let closing = signed_qty.abs().min(self.quantity.abs());
            self.realized_pnl += closing * (price - self.avg_cost) * self.quantity.signum();
            self.quantity += signed_qty;
            if self.quantity.signum() != 0.0 && self.quantity.signum() == signed_qty.signum() && self.quantity.abs() > 0.0 {
                // Crossed through zero: the residual adopts the new fill's price as cost basis.
                self.avg_cost = price;
            }
        }
        self.current_price = price;
        self.last_update = now_ns;
    }

    fn mark_to_market(&mut self, current_price: f64, now_ns: u64) {
        self.current_price = current_price;
        self.unrealized_pnl = self.quantity * (current_price - self.avg_cost);
        self.last_update = now_ns;
    }
}

pub struct PositionTracker {
    positions: RwLock<HashMap<PositionKey, Position>>,
    running: AtomicBool,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
    mark_interval: Duration,
}

impl PositionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            positions: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            worker: parking_lot::Mutex::new(None),
            mark_interval: Duration::from_secs(5),
        })
    }

    pub fn on_fill(&self, fill: &Fill, strategy_id: &str) {
        let now = monotonic_ns();
        let key = PositionKey { symbol_id: fill.symbol_id, strategy_id: strategy_id.to_string() };
        let mut positions = self.positions.write();
        positions
            .entry(key)
            .and_modify(|p| p.apply_fill(fill.signed_quantity, fill.price, now))
            .or_insert_with(|| Position::new(fill.symbol_id, strategy_id.to_string(), fill.signed_quantity, fill.price, now));
    }

    /// Looks up the position a single strategy holds in a single symbol.
    pub fn position(&self, symbol_id: u32, strategy_id: &str) -> Option<Position> {
        self.positions.read().get(&PositionKey { symbol_id, strategy_id: strategy_id.to_string() }).cloned()
    }

    /// All per-strategy positions held in one symbol, across every strategy.
    pub fn positions_for_symbol(&self, symbol_id: u32) -> Vec<Position> {
        self.positions.read().values().filter(|p| p.symbol_id == symbol_id).cloned().collect()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.positions.read().values().cloned().collect()
    }

    /// Marks every strategy's position in `symbol_id` to the same price.
    pub fn update_price(&self, symbol_id: u32, current_price: f64) {
        let now = monotonic_ns();
        for p in self.positions.write().values_mut().filter(|p| p.symbol_id == symbol_id) {
            p.mark_to_market(current_price, now);
        }
    }

    /// Marks every tracked position at its last observed price, refreshing
    /// `unrealized_pnl` and `last_update`. Callable directly for testing
    /// without driving the background worker.
    pub fn mark_all(&self) {
        let now = monotonic_ns();
        for p in self.positions.write().values_mut() {
            let price = p.current_price;
            p.mark_to_market(price, now);
        }
    }

    /// Spawns the 5 s mark-to-market loop. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let this = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("position-mark-to-market".to_string())
            .spawn(move || {
                while this.running.load(Ordering::Acquire) {
                    std::thread::sleep(this.mark_interval);
                    this.mark_all();
                }
            })
            .expect("failed to spawn mark-to-market thread");
        *self.worker.lock() = Some(handle);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PositionTracker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_symbol_creates_position() {
        let tracker = PositionTracker::new();
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: 100.0, price: 50.0 }, "S1");
        let p = tracker.position(1, "S1").unwrap();
        assert_eq!(p.quantity, 100.0);
        assert_eq!(p.avg_cost, 50.0);
    }

    #[test]
    fn test_same_sign_weighted_average_cost() {
        let tracker = PositionTracker::new();
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: 100.0, price: 50.0 }, "S1");
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: 100.0, price: 60.0 }, "S1");
        let p = tracker.position(1, "S1").unwrap();
        assert_eq!(p.quantity, 200.0);
        assert!((p.avg_cost - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_opposite_sign_realizes_pnl() {
        let tracker = PositionTracker::new();
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: 100.0, price: 50.0 }, "S1");
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: -40.0, price: 60.0 }, "S1");
        let p = tracker.position(1, "S1").unwrap();
        assert_eq!(p.quantity, 60.0);
        assert!((p.realized_pnl - 400.0).abs() < 1e-9);
        assert_eq!(p.avg_cost, 50.0);
    }

    #[test]
    fn test_flip_through_zero_adopts_new_cost_basis() {
        let tracker = PositionTracker::new();
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: 50.0, price: 50.0 }, "S1");
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: -80.0, price: 60.0 }, "S1");
        let p = tracker.position(1, "S1").unwrap();
        assert_eq!(p.quantity, -30.0);
        assert!((p.realized_pnl - 500.0).abs() < 1e-9);
        assert_eq!(p.avg_cost, 60.0);
    }

    #[test]
    fn test_mark_to_market_updates_unrealized_pnl() {
        let tracker = PositionTracker::new();
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: 100.0, price: 50.0 }, "S1");
        tracker.update_price(1, 55.0);
        let p = tracker.position(1, "S1").unwrap();
        assert_eq!(p.unrealized_pnl, 500.0);
    }

    #[test]
    fn test_same_symbol_different_strategies_are_separate_positions() {
        let tracker = PositionTracker::new();
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: 100.0, price: 50.0 }, "S1");
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: 30.0, price: 52.0 }, "S2");

        let s1 = tracker.position(1, "S1").unwrap();
        let s2 = tracker.position(1, "S2").unwrap();
        assert_eq!(s1.quantity, 100.0);
        assert_eq!(s2.quantity, 30.0);
        assert_eq!(tracker.positions_for_symbol(1).len(), 2);
    }

    #[test]
    fn test_update_price_marks_every_strategy_in_symbol() {
        let tracker = PositionTracker::new();
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: 100.0, price: 50.0 }, "S1");
        tracker.on_fill(&Fill { symbol_id: 1, signed_quantity: 30.0, price: 50.0 }, "S2");
        tracker.update_price(1, 60.0);

        assert_eq!(tracker.position(1, "S1").unwrap().unrealized_pnl, 1000.0);
        assert_eq!(tracker.position(1, "S2").unwrap().unrealized_pnl, 300.0);
    }
}
