//! Per-symbol limit order book (§4.3).
//!
//! Single writer, many lock-free readers. Best-bid/ask and side quantities
//! are atomics (bit patterns of f64) so readers never observe a torn write;
//! the depth arrays themselves sit behind a `parking_lot::RwLock` so the
//! writer's mutations (insert/evacuate/shift) are atomic as a unit while
//! readers still only ever block on a cheap uncontended read lock.

use crate::book::level::{evacuate, find_level, insert_sorted, PriceLevel, Side as LevelSide, MAX_DEPTH};
use crate::book::order::BookOrder;
use crate::time::monotonic_ns;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

fn load_f64(a: &AtomicU64, ordering: Ordering) -> f64 {
    f64::from_bits(a.load(ordering))
}

fn store_f64(a: &AtomicU64, v: f64, ordering: Ordering) {
    a.store(v.to_bits(), ordering);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BookStats {
    pub total_volume: f64,
    pub trade_count: u64,
    pub last_trade_price: f64,
    pub last_update: u64,
}

struct Sides {
    bids: [PriceLevel; MAX_DEPTH],
    asks: [PriceLevel; MAX_DEPTH],
    orders: HashMap<u64, BookOrder>,
}

pub struct OrderBook {
    pub symbol_id: u32,
    pub tick_size: f64,
    best_bid: AtomicU64,
    best_ask: AtomicU64,
    bid_quantity: AtomicU64,
    ask_quantity: AtomicU64,
    sides: RwLock<Sides>,
    stats: RwLock<BookStats>,
    avg_update_latency_ns: AtomicU64,
    update_count: AtomicU64,
}

impl OrderBook {
    pub fn new(symbol_id: u32, tick_size: f64) -> Self {
        Self {
            symbol_id,
            tick_size,
            best_bid: AtomicU64::new(0),
            best_ask: AtomicU64::new(0),
            bid_quantity: AtomicU64::new(0),
            ask_quantity: AtomicU64::new(0),
            sides: RwLock::new(Sides {
                bids: [PriceLevel::empty(); MAX_DEPTH],
                asks: [PriceLevel::empty(); MAX_DEPTH],
                orders: HashMap::new(),
            }),
            stats: RwLock::new(BookStats::default()),
            avg_update_latency_ns: AtomicU64::new(0),
            update_count: AtomicU64::new(0),
        }
    }

    // ---- lock-free reader surface ----

    pub fn best_bid(&self) -> f64 {
        load_f64(&self.best_bid, Ordering::Acquire)
    }

    pub fn best_ask(&self) -> f64 {
        load_f64(&self.best_ask, Ordering::Acquire)
    }

    pub fn bid_quantity(&self) -> f64 {
        load_f64(&self.bid_quantity, Ordering::Acquire)
    }

    pub fn ask_quantity(&self) -> f64 {
        load_f64(&self.ask_quantity, Ordering::Acquire)
    }

    pub fn spread(&self) -> f64 {
        self.best_ask() - self.best_bid()
    }

    pub fn mid(&self) -> f64 {
        (self.best_bid() + self.best_ask()) / 2.0
    }

    /// `(bid_qty - ask_qty) / (bid_qty + ask_qty)`, saturating at ±1 when
    /// one side is empty.
    pub fn imbalance(&self) -> f64 {
        let bid_qty = self.bid_quantity();
        let ask_qty = self.ask_quantity();
        let total = bid_qty + ask_qty;
        if total == 0.0 {
            0.0
        } else if ask_qty == 0.0 {
            1.0
        } else if bid_qty == 0.0 {
            -1.0
        } else {
            (bid_qty - ask_qty) / total
        }
    }

    pub fn vwap(&self, depth: usize, side: LevelSide) -> f64 {
        let sides = self.sides.read();
        let levels = match side {
            LevelSide::Bid => &sides.bids,
            LevelSide::Ask => &sides.asks,
        };
        let mut notional = 0.0;
        let mut qty = 0.0;
        for level in levels.iter().take(depth).take_while(|l| !l.is_empty()) {
            notional += level.price * level.total_quantity;
            qty += level.total_quantity;
        }
        if qty == 0.0 {
            0.0
        } else {
            notional / qty
        }
    }

    pub fn stats(&self) -> BookStats {
        *self.stats.read()
    }

    pub fn bid_levels(&self) -> [PriceLevel; MAX_DEPTH] {
        self.sides.read().bids
    }

    pub fn ask_levels(&self) -> [PriceLevel; MAX_DEPTH] {
        self.sides.read().asks
    }

    // ---- writer surface ----

    fn recompute_bests(&self, sides: &Sides) {
        let bb = if sides.bids[0].is_empty() { 0.0 } else { sides.bids[0].price };
        let ba = if sides.asks[0].is_empty() { 0.0 } else { sides.asks[0].price };
        store_f64(&self.best_bid, bb, Ordering::Release);
        store_f64(&self.best_ask, ba, Ordering::Release);
        store_f64(&self.bid_quantity, if sides.bids[0].is_empty() { 0.0 } else { sides.bids[0].total_quantity }, Ordering::Release);
        store_f64(&self.ask_quantity, if sides.asks[0].is_empty() { 0.0 } else { sides.asks[0].total_quantity }, Ordering::Release);
    }

    fn record_latency(&self, start_ns: u64) {
        let elapsed = monotonic_ns().saturating_sub(start_ns);
        let n = self.update_count.fetch_add(1, Ordering::Relaxed) + 1;
        let prev_avg = self.avg_update_latency_ns.load(Ordering::Relaxed);
        let new_avg = prev_avg + (elapsed.saturating_sub(prev_avg)) / n.max(1);
        self.avg_update_latency_ns.store(new_avg, Ordering::Relaxed);
    }

    pub fn avg_update_latency_ns(&self) -> u64 {
        self.avg_update_latency_ns.load(Ordering::Relaxed)
    }

    pub fn add_order(&self, order_id: u64, side: LevelSide, price: f64, qty: f64, ts: u64) {
        let start = monotonic_ns();
        let mut sides = self.sides.write();
        sides.orders.insert(order_id, BookOrder { price, quantity: qty, side, timestamp: ts });

        let levels = match side {
            LevelSide::Bid => &mut sides.bids,
            LevelSide::Ask => &mut sides.asks,
        };
        match find_level(levels, price, self.tick_size) {
            Some(idx) => {
                levels[idx].total_quantity += qty;
                levels[idx].order_count += 1;
                levels[idx].last_update = ts;
            }
            None => {
                if qty > 0.0 {
                    insert_sorted(
                        levels,
                        PriceLevel { price, total_quantity: qty, order_count: 1, last_update: ts },
                        side,
                    );
                }
            }
        }
        self.recompute_bests(&sides);
        drop(sides);
        self.record_latency(start);
    }

    pub fn modify_order(&self, order_id: u64, new_qty: f64, ts: u64) {
        let start = monotonic_ns();
        let existing = {
            let sides = self.sides.read();
            sides.orders.get(&order_id).copied()
        };
        let Some(existing) = existing else { return };
        if new_qty == 0.0 {
            self.cancel_order(order_id, ts);
            return;
        }
        let delta = new_qty - existing.quantity;
        let mut sides = self.sides.write();
        let side = existing.side;
        let levels = match side {
            LevelSide::Bid => &mut sides.bids,
            LevelSide::Ask => &mut sides.asks,
        };
        if let Some(idx) = find_level(levels, existing.price, self.tick_size) {
            levels[idx].total_quantity += delta;
            levels[idx].last_update = ts;
            if levels[idx].total_quantity <= 0.0 {
                evacuate(levels, idx);
            }
        }
        if let Some(record) = sides.orders.get_mut(&order_id) {
            record.quantity = new_qty;
            record.timestamp = ts;
        }
        self.recompute_bests(&sides);
        drop(sides);
        self.record_latency(start);
    }

    pub fn cancel_order(&self, order_id: u64, ts: u64) {
        let start = monotonic_ns();
        let mut sides = self.sides.write();
        let Some(existing) = sides.orders.remove(&order_id) else { return };
        let levels = match existing.side {
            LevelSide::Bid => &mut sides.bids,
            LevelSide::Ask => &mut sides.asks,
        };
        if let Some(idx) = find_level(levels, existing.price, self.tick_size) {
            levels[idx].total_quantity -= existing.quantity;
            levels[idx].last_update = ts;
            if levels[idx].total_quantity <= 0.0 {
                evacuate(levels, idx);
            }
        }
        self.recompute_bests(&sides);
        drop(sides);
        self.record_latency(start);
    }

    pub fn update_trade(&self, price: f64, qty: f64, ts: u64) {
        let mut stats = self.stats.write();
        stats.last_trade_price = price;
        stats.total_volume += qty;
        stats.trade_count += 1;
        stats.last_update = ts;
    }

    pub fn update_quote(
        &self,
        bid_levels: [PriceLevel; 5],
        ask_levels: [PriceLevel; 5],
    ) {
        let mut sides = self.sides.write();
        for (i, level) in bid_levels.into_iter().enumerate() {
            sides.bids[i] = level;
        }
        for i in 5..MAX_DEPTH {
            sides.bids[i] = PriceLevel::empty();
        }
        for (i, level) in ask_levels.into_iter().enumerate() {
            sides.asks[i] = level;
        }
        for i in 5..MAX_DEPTH {
            sides.asks[i] = PriceLevel::empty();
        }
        self.recompute_bests(&sides);
    }

    pub fn full_refresh(&self, bids: &[PriceLevel], asks: &[PriceLevel]) {
        let mut sides = self.sides.write();
        sides.bids = [PriceLevel::empty(); MAX_DEPTH];
        sides.asks = [PriceLevel::empty(); MAX_DEPTH];
        for (i, level) in bids.iter().take(MAX_DEPTH).enumerate() {
            sides.bids[i] = *level;
        }
        for (i, level) in asks.iter().take(MAX_DEPTH).enumerate() {
            sides.asks[i] = *level;
        }
        self.recompute_bests(&sides);
    }

    /// Sum of per-order quantities on `side` — used by invariant tests to
    /// check against the aggregated level total.
    pub fn order_quantity_sum(&self, side: LevelSide) -> f64 {
        self.sides
            .read()
            .orders
            .values()
            .filter(|o| o.side == side)
            .map(|o| o.quantity)
            .sum()
    }

    pub fn level_quantity_sum(&self, side: LevelSide) -> f64 {
        let sides = self.sides.read();
        let levels = match side {
            LevelSide::Bid => &sides.bids,
            LevelSide::Ask => &sides.asks,
        };
        levels.iter().map(|l| l.total_quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_book_add_order() {
        let book = OrderBook::new(1, 0.01);
        book.add_order(1, LevelSide::Bid, 100.50, 100.0, 1);
        assert_eq!(book.best_bid(), 100.50);
        assert_eq!(book.bid_quantity(), 100.0);
        assert_eq!(book.best_ask(), 0.0);
        assert_eq!(book.spread(), -100.50);
        assert_eq!(book.imbalance(), 1.0);
    }

    #[test]
    fn test_tight_book_mid_spread_imbalance() {
        let book = OrderBook::new(1, 0.01);
        book.add_order(1, LevelSide::Bid, 100.00, 80.0, 1);
        book.add_order(2, LevelSide::Ask, 100.10, 120.0, 2);
        assert!((book.spread() - 0.10).abs() < 1e-9);
        assert!((book.mid() - 100.05).abs() < 1e-9);
        assert!((book.imbalance() - (-0.20)).abs() < 1e-9);
    }

    #[test]
    fn test_modify_to_zero_equals_cancel() {
        let book_a = OrderBook::new(1, 0.01);
        book_a.add_order(7, LevelSide::Bid, 99.90, 50.0, 1);
        book_a.modify_order(7, 0.0, 2);

        let book_b = OrderBook::new(1, 0.01);
        book_b.add_order(7, LevelSide::Bid, 99.90, 50.0, 1);
        book_b.cancel_order(7, 2);

        assert_eq!(book_a.best_bid(), book_b.best_bid());
        assert_eq!(book_a.bid_quantity(), book_b.bid_quantity());
    }

    #[test]
    fn test_cancel_unknown_is_noop() {
        let book = OrderBook::new(1, 0.01);
        book.add_order(1, LevelSide::Bid, 100.0, 10.0, 1);
        book.cancel_order(999, 2);
        assert_eq!(book.best_bid(), 100.0);
        book.cancel_order(999, 3);
        assert_eq!(book.best_bid(), 100.0);
    }

    #[test]
    fn test_order_and_level_quantities_match() {
        let book = OrderBook::new(1, 0.01);
        book.add_order(1, LevelSide::Bid, 100.0, 10.0, 1);
        book.add_order(2, LevelSide::Bid, 100.0, 5.0, 2);
        book.add_order(3, LevelSide::Bid, 99.0, 20.0, 3);
        assert_eq!(book.order_quantity_sum(LevelSide::Bid), book.level_quantity_sum(LevelSide::Bid));
        book.cancel_order(2, 4);
        assert_eq!(book.order_quantity_sum(LevelSide::Bid), book.level_quantity_sum(LevelSide::Bid));
    }

    #[test]
    fn test_full_refresh_idempotent() {
        let book = OrderBook::new(1, 0.01);
        let bids = vec![PriceLevel { price: 100.0, total_quantity: 10.0, order_count: 1, last_update: 1 }];
        let asks = vec![PriceLevel { price: 101.0, total_quantity: 10.0, order_count: 1, last_update: 1 }];
        book.full_refresh(&bids, &asks);
        let after_first = book.bid_levels();
        book.full_refresh(&bids, &asks);
        let after_second = book.bid_levels();
        assert_eq!(after_first, after_second);
    }
}
