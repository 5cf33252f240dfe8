//! Payload structs for each `msg_type`.
//!
//! Integer fields are big-endian on the wire, matching the header (§3).
//! Floating-point fields are copied bit-exact as IEEE-754 little-endian —
//! the exchange's native order — per the open question in §9; this crate
//! does not attempt to byte-swap them.

use crate::error::WireError;

pub const MAX_PRICE: f64 = 999_999.99;
pub const MAX_QUANTITY: f64 = 1e11;

fn read_f64_le(buf: &[u8], off: usize) -> f64 {
    f64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
}

fn write_f64_le(buf: &mut [u8], off: usize, v: f64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

fn read_broker(buf: &[u8], off: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[off..off + 8]);
    out
}

/// NUL-terminate (and truncate) a broker id into the fixed 8-byte field.
pub fn broker_id(s: &str) -> [u8; 8] {
    let mut out = [0u8; 8];
    let bytes = s.as_bytes();
    let n = bytes.len().min(7);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    pub symbol_id: u32,
    pub trade_id: u64,
    pub price: f64,
    pub quantity: f64,
    pub buyer_broker: [u8; 8],
    pub seller_broker: [u8; 8],
    pub trade_time: u64,
}

pub const TRADE_SIZE: usize = 4 + 8 + 8 + 8 + 8 + 8 + 8;

impl Trade {
    pub fn validate(&self) -> bool {
        self.price > 0.0 && self.price <= MAX_PRICE && self.quantity > 0.0 && self.quantity <= MAX_QUANTITY
    }

    pub fn to_bytes(&self) -> [u8; TRADE_SIZE] {
        let mut buf = [0u8; TRADE_SIZE];
        buf[0..4].copy_from_slice(&self.symbol_id.to_be_bytes());
        buf[4..12].copy_from_slice(&self.trade_id.to_be_bytes());
        write_f64_le(&mut buf, 12, self.price);
        write_f64_le(&mut buf, 20, self.quantity);
        buf[28..36].copy_from_slice(&self.buyer_broker);
        buf[36..44].copy_from_slice(&self.seller_broker);
        buf[44..52].copy_from_slice(&self.trade_time.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < TRADE_SIZE {
            return Err(WireError::InvalidSize {
                expected_at_least: TRADE_SIZE,
                got: buf.len(),
            });
        }
        Ok(Self {
            symbol_id: u32::from_be_bytes(buf[0..4].try_into().unwrap()),
            trade_id: u64::from_be_bytes(buf[4..12].try_into().unwrap()),
            price: read_f64_le(buf, 12),
            quantity: read_f64_le(buf, 20),
            buyer_broker: read_broker(buf, 28),
            seller_broker: read_broker(buf, 36),
            trade_time: u64::from_be_bytes(buf[44..52].try_into().unwrap()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteLevel {
    pub price: f64,
    pub quantity: f64,
    pub num_orders: u32,
}

pub const QUOTE_LEVEL_SIZE: usize = 8 + 8 + 4;

impl QuoteLevel {
    pub fn empty() -> Self {
        Self { price: 0.0, quantity: 0.0, num_orders: 0 }
    }

    fn to_bytes(&self, buf: &mut [u8], off: usize) {
        write_f64_le(buf, off, self.price);
        write_f64_le(buf, off + 8, self.quantity);
        buf[off + 16..off + 20].copy_from_slice(&self.num_orders.to_be_bytes());
    }

    fn from_bytes(buf: &[u8], off: usize) -> Self {
        Self {
            price: read_f64_le(buf, off),
            quantity: read_f64_le(buf, off + 8),
            num_orders: u32::from_be_bytes(buf[off + 16..off + 20].try_into().unwrap()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub symbol_id: u32,
    pub bid_price: f64,
    pub bid_qty: f64,
    pub ask_price: f64,
    pub ask_qty: f64,
    pub bid_levels: [QuoteLevel; 5],
    pub ask_levels: [QuoteLevel; 5],
    pub quote_time: u64,
}

pub const QUOTE_SIZE: usize = 4 + 8 + 8 + 8 + 8 + QUOTE_LEVEL_SIZE * 10 + 8;

impl Quote {
    /// Crossed (bid ≥ ask, both > 0) is admitted; the caller bumps a metric.
    pub fn is_crossed(&self) -> bool {
        self.bid_price > 0.0 && self.ask_price > 0.0 && self.bid_price >= self.ask_price
    }

    pub fn validate(&self) -> bool {
        self.bid_price >= 0.0
            && self.bid_price <= MAX_PRICE
            && self.ask_price >= 0.0
            && self.ask_price <= MAX_PRICE
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; QUOTE_SIZE];
        buf[0..4].copy_from_slice(&self.symbol_id.to_be_bytes());
        write_f64_le(&mut buf, 4, self.bid_price);
        write_f64_le(&mut buf, 12, self.bid_qty);
        write_f64_le(&mut buf, 20, self.ask_price);
        write_f64_le(&mut buf, 28, self.ask_qty);
        let mut off = 36;
        for level in &self.bid_levels {
            level.to_bytes(&mut buf, off);
            off += QUOTE_LEVEL_SIZE;
        }
        for level in &self.ask_levels {
            level.to_bytes(&mut buf, off);
            off += QUOTE_LEVEL_SIZE;
        }
        buf[off..off + 8].copy_from_slice(&self.quote_time.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < QUOTE_SIZE {
            return Err(WireError::InvalidSize {
                expected_at_least: QUOTE_SIZE,
                got: buf.len(),
            });
        }
        let mut bid_levels = [QuoteLevel::empty(); 5];
        let mut ask_levels = [QuoteLevel::empty(); 5];
        let mut off = 36;
        for level in bid_levels.iter_mut() {
            *level = QuoteLevel::from_bytes(buf, off);
            off += QUOTE_LEVEL_SIZE;
        }
        for level in ask_levels.iter_mut() {
            *level = QuoteLevel::from_bytes(buf, off);
            off += QUOTE_LEVEL_SIZE;
        }
        Ok(Self {
            symbol_id: u32::from_be_bytes(buf[0..4].try_into().unwrap()),
            bid_price: read_f64_le(buf, 4),
            bid_qty: read_f64_le(buf, 12),
            ask_price: read_f64_le(buf, 20),
            ask_qty: read_f64_le(buf, 28),
            bid_levels,
            ask_levels,
            quote_time: u64::from_be_bytes(buf[off..off + 8].try_into().unwrap()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    Modified,
    Cancelled,
}

impl OrderStatus {
    fn to_byte(self) -> u8 {
        match self {
            Self::New => b'N',
            Self::Modified => b'M',
            Self::Cancelled => b'C',
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'N' => Some(Self::New),
            b'M' => Some(Self::Modified),
            b'C' => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderUpdate {
    pub symbol_id: u32,
    pub order_id: u64,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub disclosed_qty: f64,
    pub status: OrderStatus,
    pub order_time: u64,
}

pub const ORDER_UPDATE_SIZE: usize = 4 + 8 + 1 + 8 + 8 + 8 + 1 + 8;

impl OrderUpdate {
    pub fn validate(&self) -> bool {
        self.price > 0.0 && self.price <= MAX_PRICE && self.quantity > 0.0 && self.quantity <= MAX_QUANTITY
    }

    pub fn to_bytes(&self) -> [u8; ORDER_UPDATE_SIZE] {
        let mut buf = [0u8; ORDER_UPDATE_SIZE];
        buf[0..4].copy_from_slice(&self.symbol_id.to_be_bytes());
        buf[4..12].copy_from_slice(&self.order_id.to_be_bytes());
        buf[12] = match self.side {
            Side::Buy => b'B',
            Side::Sell => b'S',
        };
        write_f64_le(&mut buf, 13, self.price);
        write_f64_le(&mut buf, 21, self.quantity);
        write_f64_le(&mut buf, 29, self.disclosed_qty);
        buf[37] = self.status.to_byte();
        buf[38..46].copy_from_slice(&self.order_time.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < ORDER_UPDATE_SIZE {
            return Err(WireError::InvalidSize {
                expected_at_least: ORDER_UPDATE_SIZE,
                got: buf.len(),
            });
        }
        let side = match buf[12] {
            b'B' => Side::Buy,
            b'S' => Side::Sell,
            _ => return Err(WireError::TruncatedFrame),
        };
        let status = OrderStatus::from_byte(buf[37]).ok_or(WireError::TruncatedFrame)?;
        Ok(Self {
            symbol_id: u32::from_be_bytes(buf[0..4].try_into().unwrap()),
            order_id: u64::from_be_bytes(buf[4..12].try_into().unwrap()),
            side,
            price: read_f64_le(buf, 13),
            quantity: read_f64_le(buf, 21),
            disclosed_qty: read_f64_le(buf, 29),
            status,
            order_time: u64::from_be_bytes(buf[38..46].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_roundtrip() {
        let t = Trade {
            symbol_id: 42,
            trade_id: 9001,
            price: 1234.56,
            quantity: 100.0,
            buyer_broker: broker_id("ABC"),
            seller_broker: broker_id("XYZ"),
            trade_time: 555,
        };
        assert!(t.validate());
        let bytes = t.to_bytes();
        let decoded = Trade::from_bytes(&bytes).unwrap();
        assert_eq!(t, decoded);
    }

    #[test]
    fn test_trade_bounds() {
        let mut t = Trade {
            symbol_id: 1,
            trade_id: 1,
            price: 0.0,
            quantity: 1.0,
            buyer_broker: [0; 8],
            seller_broker: [0; 8],
            trade_time: 0,
        };
        assert!(!t.validate());
        t.price = MAX_PRICE + 0.01;
        assert!(!t.validate());
    }

    #[test]
    fn test_quote_roundtrip_and_crossed() {
        let mut q = Quote {
            symbol_id: 7,
            bid_price: 101.0,
            bid_qty: 10.0,
            ask_price: 100.0,
            ask_qty: 10.0,
            bid_levels: [QuoteLevel::empty(); 5],
            ask_levels: [QuoteLevel::empty(); 5],
            quote_time: 99,
        };
        assert!(q.is_crossed());
        let bytes = q.to_bytes();
        let decoded = Quote::from_bytes(&bytes).unwrap();
        assert_eq!(q, decoded);

        q.bid_price = 99.0;
        assert!(!q.is_crossed());
    }

    #[test]
    fn test_order_update_roundtrip() {
        let o = OrderUpdate {
            symbol_id: 3,
            order_id: 777,
            side: Side::Buy,
            price: 55.25,
            quantity: 10.0,
            disclosed_qty: 5.0,
            status: OrderStatus::Modified,
            order_time: 1000,
        };
        let bytes = o.to_bytes();
        let decoded = OrderUpdate::from_bytes(&bytes).unwrap();
        assert_eq!(o, decoded);
    }
}
