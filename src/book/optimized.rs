//! Ultra-low-latency order book variant (§4.3, §9 "arena + index").
//!
//! Identical semantics to [`crate::book::book::OrderBook`] with a 10-level
//! cap, a pre-allocated pool of up to 10,000 order records, and a 16K-slot
//! open-addressed hash table keyed by `order_id ⊕ (order_id >> 16)`. Orders
//! are referred to by slot index, never by pointer, so the structure stays
//! relocation-safe — no dynamic allocation happens on any hot path once the
//! pool and table are constructed.

use crate::book::level::{evacuate, find_level, insert_sorted, PriceLevel, Side, MAX_DEPTH_OPTIMIZED};
use crate::book::order::BookOrder;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

const POOL_SIZE: usize = 10_000;
const HASH_SLOTS: usize = 16 * 1024;
const EMPTY_SLOT: u32 = u32::MAX;

fn hash_order_id(order_id: u64) -> usize {
    ((order_id ^ (order_id >> 16)) as usize) & (HASH_SLOTS - 1)
}

fn load_f64(a: &AtomicU64, ordering: Ordering) -> f64 {
    f64::from_bits(a.load(ordering))
}

fn store_f64(a: &AtomicU64, v: f64, ordering: Ordering) {
    a.store(v.to_bits(), ordering);
}

#[derive(Clone, Copy)]
struct PoolSlot {
    order_id: u64,
    record: BookOrder,
    occupied: bool,
}

impl PoolSlot {
    fn empty() -> Self {
        Self { order_id: 0, record: BookOrder { price: 0.0, quantity: 0.0, side: Side::Bid, timestamp: 0 }, occupied: false }
    }
}

struct Arena {
    pool: Vec<PoolSlot>,
    free_list: Vec<u32>,
    hash_table: Vec<u32>,
    bids: [PriceLevel; MAX_DEPTH_OPTIMIZED],
    asks: [PriceLevel; MAX_DEPTH_OPTIMIZED],
}

impl Arena {
    fn new() -> Self {
        Self {
            pool: vec![PoolSlot::empty(); POOL_SIZE],
            free_list: (0..POOL_SIZE as u32).rev().collect(),
            hash_table: vec![EMPTY_SLOT; HASH_SLOTS],
            bids: [PriceLevel::empty(); MAX_DEPTH_OPTIMIZED],
            asks: [PriceLevel::empty(); MAX_DEPTH_OPTIMIZED],
        }
    }

    fn find_slot(&self, order_id: u64) -> Option<usize> {
        let start = hash_order_id(order_id);
        for probe in 0..HASH_SLOTS {
            let idx = (start + probe) % HASH_SLOTS;
            let slot = self.hash_table[idx];
            if slot == EMPTY_SLOT {
                return None;
            }
            if self.pool[slot as usize].occupied && self.pool[slot as usize].order_id == order_id {
                return Some(idx);
            }
        }
        None
    }

    fn find_free_hash_slot(&self, order_id: u64) -> Option<usize> {
        let start = hash_order_id(order_id);
        for probe in 0..HASH_SLOTS {
            let idx = (start + probe) % HASH_SLOTS;
            if self.hash_table[idx] == EMPTY_SLOT {
                return Some(idx);
            }
        }
        None
    }
}

pub struct OptimizedOrderBook {
    pub symbol_id: u32,
    pub tick_size: f64,
    best_bid: AtomicU64,
    best_ask: AtomicU64,
    arena: RwLock<Arena>,
}

impl OptimizedOrderBook {
    pub fn new(symbol_id: u32, tick_size: f64) -> Self {
        Self {
            symbol_id,
            tick_size,
            best_bid: AtomicU64::new(0),
            best_ask: AtomicU64::new(0),
            arena: RwLock::new(Arena::new()),
        }
    }

    pub fn best_bid(&self) -> f64 {
        load_f64(&self.best_bid, Ordering::Acquire)
    }

    pub fn best_ask(&self) -> f64 {
        load_f64(&self.best_ask, Ordering::Acquire)
    }

    fn recompute_bests(&self, arena: &Arena) {
        let bb = if arena.bids[0].is_empty() { 0.0 } else { arena.bids[0].price };
        let ba = if arena.asks[0].is_empty() { 0.0 } else { arena.asks[0].price };
        store_f64(&self.best_bid, bb, Ordering::Release);
        store_f64(&self.best_ask, ba, Ordering::Release);
    }

    /// Returns `false` if the pool is exhausted — the caller should fall
    /// back to the non-optimized book rather than allocate.
    pub fn add_order(&self, order_id: u64, side: Side, price: f64, qty: f64, ts: u64) -> bool {
        let mut arena = self.arena.write();
        let Some(free_slot) = arena.free_list.pop() else { return false };
        let Some(hash_idx) = arena.find_free_hash_slot(order_id) else {
            arena.free_list.push(free_slot);
            return false;
        };
        arena.pool[free_slot as usize] = PoolSlot {
            order_id,
            record: BookOrder { price, quantity: qty, side, timestamp: ts },
            occupied: true,
        };
        arena.hash_table[hash_idx] = free_slot;

        let tick_size = self.tick_size;
        let levels = match side {
            Side::Bid => &mut arena.bids,
            Side::Ask => &mut arena.asks,
        };
        match find_level(levels, price, tick_size) {
            Some(idx) => {
                levels[idx].total_quantity += qty;
                levels[idx].order_count += 1;
                levels[idx].last_update = ts;
            }
            None if qty > 0.0 => {
                insert_sorted(levels, PriceLevel { price, total_quantity: qty, order_count: 1, last_update: ts }, side);
            }
            None => {}
        }
        self.recompute_bests(&arena);
        true
    }

    pub fn cancel_order(&self, order_id: u64, ts: u64) {
        let mut arena = self.arena.write();
        let Some(hash_idx) = arena.find_slot(order_id) else { return };
        let pool_idx = arena.hash_table[hash_idx] as usize;
        let record = arena.pool[pool_idx].record;
        let tick_size = self.tick_size;

        let levels = match record.side {
            Side::Bid => &mut arena.bids,
            Side::Ask => &mut arena.asks,
        };
        if let Some(idx) = find_level(levels, record.price, tick_size) {
            levels[idx].total_quantity -= record.quantity;
            levels[idx].last_update = ts;
            if levels[idx].total_quantity <= 0.0 {
                evacuate(levels, idx);
            }
        }

        arena.pool[pool_idx].occupied = false;
        arena.hash_table[hash_idx] = EMPTY_SLOT;
        arena.free_list.push(pool_idx as u32);
        self.recompute_bests(&arena);
    }

    pub fn order_count(&self) -> usize {
        POOL_SIZE - self.arena.read().free_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimized_add_and_cancel() {
        let book = OptimizedOrderBook::new(1, 0.01);
        assert!(book.add_order(1, Side::Bid, 100.0, 10.0, 1));
        assert_eq!(book.best_bid(), 100.0);
        assert_eq!(book.order_count(), 1);
        book.cancel_order(1, 2);
        assert_eq!(book.best_bid(), 0.0);
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn test_optimized_hash_collisions_resolve() {
        let book = OptimizedOrderBook::new(1, 0.01);
        // order ids chosen to collide under the xor-fold hash
        let a = 1u64;
        let b = a + (16 * 1024) as u64;
        assert!(book.add_order(a, Side::Bid, 100.0, 1.0, 1));
        assert!(book.add_order(b, Side::Bid, 99.0, 1.0, 1));
        book.cancel_order(a, 2);
        assert_eq!(book.order_count(), 1);
        book.cancel_order(b, 3);
        assert_eq!(book.order_count(), 0);
    }
}
