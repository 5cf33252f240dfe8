//! Message header: the fixed-size prefix of every exchange frame.
//!
//! All multi-byte integer fields are big-endian on the wire (§3); floating
//! point payload fields are left as IEEE-754 little-endian, bit-exact,
//! per the open question in §9 about the exchange's true `double` byte
//! order — this crate does not guess and preserves source bytes.

use crate::error::WireError;

pub const MIN_HEADER: usize = 20;
pub const MAX_MESSAGE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    Trade = 1,
    Quote = 2,
    OrderUpdate = 3,
    MarketStatus = 4,
    SymbolUpdate = 5,
    IndexUpdate = 6,
    Heartbeat = 7,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Trade),
            2 => Some(Self::Quote),
            3 => Some(Self::OrderUpdate),
            4 => Some(Self::MarketStatus),
            5 => Some(Self::SymbolUpdate),
            6 => Some(Self::IndexUpdate),
            7 => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Exchange {
    Nse = 1,
    Bse = 2,
    Mcx = 3,
}

impl Exchange {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Nse),
            2 => Some(Self::Bse),
            3 => Some(Self::Mcx),
            _ => None,
        }
    }
}

/// Decoded, validated frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: MsgType,
    pub exchange: Exchange,
    pub msg_length: u16,
    pub timestamp: u64,
    pub sequence_number: u64,
}

impl Header {
    /// Payload length implied by `msg_length` (total frame length minus header).
    pub fn payload_len(&self) -> usize {
        self.msg_length as usize - MIN_HEADER
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < MIN_HEADER {
            return Err(WireError::InvalidSize {
                expected_at_least: MIN_HEADER,
                got: buf.len(),
            });
        }
        let msg_type_raw = buf[0];
        let exchange_raw = buf[1];
        let msg_length = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp = u64::from_be_bytes(buf[4..12].try_into().unwrap());
        let sequence_number = u64::from_be_bytes(buf[12..20].try_into().unwrap());

        let msg_type = MsgType::from_u8(msg_type_raw).ok_or(WireError::UnknownMsgType(msg_type_raw))?;
        let exchange = Exchange::from_u8(exchange_raw).ok_or(WireError::UnknownExchange(exchange_raw))?;

        if (msg_length as usize) < MIN_HEADER || (msg_length as usize) > MAX_MESSAGE {
            return Err(WireError::LengthOutOfRange {
                len: msg_length as usize,
                min: MIN_HEADER,
                max: MAX_MESSAGE,
            });
        }

        Ok(Self {
            msg_type,
            exchange,
            msg_length,
            timestamp,
            sequence_number,
        })
    }

    pub fn encode(&self) -> [u8; MIN_HEADER] {
        let mut buf = [0u8; MIN_HEADER];
        buf[0] = self.msg_type as u8;
        buf[1] = self.exchange as u8;
        buf[2..4].copy_from_slice(&self.msg_length.to_be_bytes());
        buf[4..12].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[12..20].copy_from_slice(&self.sequence_number.to_be_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let h = Header {
            msg_type: MsgType::Trade,
            exchange: Exchange::Nse,
            msg_length: 100,
            timestamp: 123_456_789,
            sequence_number: 42,
        };
        let bytes = h.encode();
        let decoded = Header::decode(&bytes).unwrap();
        assert_eq!(h, decoded);
    }

    #[test]
    fn test_header_boundaries() {
        let mut h = Header {
            msg_type: MsgType::Heartbeat,
            exchange: Exchange::Bse,
            msg_length: MAX_MESSAGE as u16,
            timestamp: 0,
            sequence_number: 0,
        };
        assert!(Header::decode(&h.encode()).is_ok());
        h.msg_length = MAX_MESSAGE as u16 + 1;
        assert!(matches!(
            Header::decode(&h.encode()),
            Err(WireError::LengthOutOfRange { .. })
        ));
    }

    #[test]
    fn test_unknown_type_and_exchange() {
        let mut buf = [0u8; MIN_HEADER];
        buf[0] = 200;
        buf[1] = 1;
        assert!(matches!(Header::decode(&buf), Err(WireError::UnknownMsgType(200))));

        buf[0] = MsgType::Trade as u8;
        buf[1] = 200;
        assert!(matches!(Header::decode(&buf), Err(WireError::UnknownExchange(200))));
    }
}
