//! Price level and sorted-side array helpers.

pub const MAX_DEPTH: usize = 20;
pub const MAX_DEPTH_OPTIMIZED: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub total_quantity: f64,
    pub order_count: u32,
    pub last_update: u64,
}

impl PriceLevel {
    pub fn empty() -> Self {
        Self { price: 0.0, total_quantity: 0.0, order_count: 0, last_update: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.total_quantity == 0.0
    }
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

/// Finds the index of the level matching `price` within `tick_size/2`, or
/// `None` if no such level exists among the non-empty prefix.
pub fn find_level(levels: &[PriceLevel], price: f64, tick_size: f64) -> Option<usize> {
    let tol = tick_size / 2.0;
    levels
        .iter()
        .take_while(|l| !l.is_empty())
        .position(|l| (l.price - price).abs() < tol)
}

/// Inserts a new level at the price-sorted position, shifting lower-priority
/// entries toward higher indices and truncating beyond the array length.
/// `side` determines sort direction: bids descending, asks ascending.
pub fn insert_sorted(levels: &mut [PriceLevel], new_level: PriceLevel, side: Side) {
    let len = levels.len();
    let insert_at = levels
        .iter()
        .take_while(|l| !l.is_empty())
        .position(|l| match side {
            Side::Bid => l.price < new_level.price,
            Side::Ask => l.price > new_level.price,
        })
        .unwrap_or_else(|| levels.iter().take_while(|l| !l.is_empty()).count());

    if insert_at >= len {
        return;
    }
    for i in (insert_at + 1..len).rev() {
        levels[i] = levels[i - 1];
    }
    levels[insert_at] = new_level;
}

/// Removes the level at `idx`, shifting subsequent entries down and
/// appending an empty slot at the end.
pub fn evacuate(levels: &mut [PriceLevel], idx: usize) {
    let len = levels.len();
    for i in idx..len - 1 {
        levels[i] = levels[i + 1];
    }
    levels[len - 1] = PriceLevel::empty();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sorted_bids_descending() {
        let mut levels = [PriceLevel::empty(); 5];
        insert_sorted(&mut levels, PriceLevel { price: 100.0, total_quantity: 10.0, order_count: 1, last_update: 1 }, Side::Bid);
        insert_sorted(&mut levels, PriceLevel { price: 101.0, total_quantity: 5.0, order_count: 1, last_update: 2 }, Side::Bid);
        insert_sorted(&mut levels, PriceLevel { price: 99.0, total_quantity: 5.0, order_count: 1, last_update: 3 }, Side::Bid);
        assert_eq!(levels[0].price, 101.0);
        assert_eq!(levels[1].price, 100.0);
        assert_eq!(levels[2].price, 99.0);
    }

    #[test]
    fn test_insert_worse_than_worst_is_noop_when_full() {
        let mut levels = [PriceLevel::empty(); 2];
        insert_sorted(&mut levels, PriceLevel { price: 100.0, total_quantity: 1.0, order_count: 1, last_update: 1 }, Side::Bid);
        insert_sorted(&mut levels, PriceLevel { price: 99.0, total_quantity: 1.0, order_count: 1, last_update: 1 }, Side::Bid);
        // full; inserting worse than worst is a no-op
        insert_sorted(&mut levels, PriceLevel { price: 98.0, total_quantity: 1.0, order_count: 1, last_update: 1 }, Side::Bid);
        assert_eq!(levels[0].price, 100.0);
        assert_eq!(levels[1].price, 99.0);
    }

    #[test]
    fn test_insert_better_than_worst_evicts_worst() {
        let mut levels = [PriceLevel::empty(); 2];
        insert_sorted(&mut levels, PriceLevel { price: 100.0, total_quantity: 1.0, order_count: 1, last_update: 1 }, Side::Bid);
        insert_sorted(&mut levels, PriceLevel { price: 99.0, total_quantity: 1.0, order_count: 1, last_update: 1 }, Side::Bid);
        insert_sorted(&mut levels, PriceLevel { price: 99.5, total_quantity: 1.0, order_count: 1, last_update: 1 }, Side::Bid);
        assert_eq!(levels[0].price, 100.0);
        assert_eq!(levels[1].price, 99.5);
    }

    #[test]
    fn test_evacuate() {
        let mut levels = [
            PriceLevel { price: 100.0, total_quantity: 1.0, order_count: 1, last_update: 1 },
            PriceLevel { price: 99.0, total_quantity: 1.0, order_count: 1, last_update: 1 },
            PriceLevel::empty(),
        ];
        evacuate(&mut levels, 0);
        assert_eq!(levels[0].price, 99.0);
        assert!(levels[1].is_empty());
    }
}
