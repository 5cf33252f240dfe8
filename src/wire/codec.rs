//! Byte-stream state machine (§4.1): `WAITING_HEADER -> READING_PAYLOAD ->
//! MESSAGE_COMPLETE`, with `ERROR` on any validation failure. Partial
//! payloads are retained across `parse_buffer` calls.

use crate::wire::header::{Exchange, Header, MsgType, MAX_MESSAGE, MIN_HEADER};
use crate::wire::messages::{OrderUpdate, Quote, Trade};
use crate::wire::rate_limit::TokenBucket;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    WaitingHeader,
    ReadingPayload,
    MessageComplete,
    Error,
}

#[derive(Debug, Clone)]
pub enum Message {
    Trade(Trade),
    Quote(Quote),
    OrderUpdate(OrderUpdate),
    Heartbeat { exchange: Exchange, sequence_number: u64 },
    MarketStatus { exchange: Exchange, sequence_number: u64 },
    SymbolUpdate { exchange: Exchange, sequence_number: u64 },
    IndexUpdate { exchange: Exchange, sequence_number: u64 },
}

/// Atomic stats struct, mirroring the `messages_processed`/`parse_errors`
/// counter pair plus consumer-observable gap/crossed-quote metrics.
#[derive(Default)]
pub struct WireStats {
    pub messages_processed: AtomicU64,
    pub parse_errors: AtomicU64,
    pub market_data_gaps: AtomicU64,
    pub crossed_quotes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WireStatsSnapshot {
    pub messages_processed: u64,
    pub parse_errors: u64,
    pub market_data_gaps: u64,
    pub crossed_quotes: u64,
}

impl WireStats {
    pub fn snapshot(&self) -> WireStatsSnapshot {
        WireStatsSnapshot {
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            market_data_gaps: self.market_data_gaps.load(Ordering::Relaxed),
            crossed_quotes: self.crossed_quotes.load(Ordering::Relaxed),
        }
    }
}

type Handler<T> = Box<dyn Fn(T) + Send + Sync>;

/// Stateful frame decoder for one connection's byte stream.
pub struct Codec {
    state: ParserState,
    buffer: Vec<u8>,
    header: Option<Header>,
    last_sequence: Option<u64>,
    pub stats: WireStats,
    pub message_limiter: TokenBucket,
    on_trade: Option<Handler<Trade>>,
    on_quote: Option<Handler<Quote>>,
    on_order: Option<Handler<OrderUpdate>>,
}

impl Codec {
    pub fn new() -> Self {
        Self {
            state: ParserState::WaitingHeader,
            buffer: Vec::with_capacity(MAX_MESSAGE * 2),
            header: None,
            last_sequence: None,
            stats: WireStats::default(),
            message_limiter: TokenBucket::default_rate(),
            on_trade: None,
            on_quote: None,
            on_order: None,
        }
    }

    pub fn on_trade(&mut self, f: impl Fn(Trade) + Send + Sync + 'static) {
        self.on_trade = Some(Box::new(f));
    }

    pub fn on_quote(&mut self, f: impl Fn(Quote) + Send + Sync + 'static) {
        self.on_quote = Some(Box::new(f));
    }

    pub fn on_order(&mut self, f: impl Fn(OrderUpdate) + Send + Sync + 'static) {
        self.on_order = Some(Box::new(f));
    }

    fn reset(&mut self) {
        self.state = ParserState::WaitingHeader;
        self.header = None;
    }

    /// Feed newly received bytes into the parser. Returns the number of
    /// bytes consumed (always all of `data`, since unconsumed bytes are
    /// retained in the internal buffer for the next call).
    pub fn parse_buffer(&mut self, data: &[u8]) -> usize {
        self.buffer.extend_from_slice(data);

        loop {
            match self.state {
                ParserState::WaitingHeader => {
                    if self.buffer.len() < MIN_HEADER {
                        break;
                    }
                    match Header::decode(&self.buffer[..MIN_HEADER]) {
                        Ok(h) => {
                            self.header = Some(h);
                            self.state = ParserState::ReadingPayload;
                        }
                        Err(e) => {
                            debug!(error = %e, "header validation failed");
                            self.state = ParserState::Error;
                        }
                    }
                }
                ParserState::ReadingPayload => {
                    let header = self.header.expect("header set before ReadingPayload");
                    if self.buffer.len() < header.msg_length as usize {
                        break;
                    }
                    self.state = ParserState::MessageComplete;
                }
                ParserState::MessageComplete => {
                    let header = self.header.take().expect("header set at MessageComplete");
                    let frame_len = header.msg_length as usize;
                    if self.message_limiter.try_consume() {
                        let payload = self.buffer[MIN_HEADER..frame_len].to_vec();
                        self.dispatch(header, &payload);
                    }
                    self.buffer.drain(0..frame_len);
                    self.reset();
                }
                ParserState::Error => {
                    self.stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                    self.buffer.clear();
                    self.reset();
                    break;
                }
            }
        }
        data.len()
    }

    fn check_sequence_gap(&mut self, seq: u64) {
        if let Some(last) = self.last_sequence {
            if seq > last + 1 {
                self.stats.market_data_gaps.fetch_add(1, Ordering::Relaxed);
                warn!(expected = last + 1, got = seq, "market data sequence gap");
            }
        }
        self.last_sequence = Some(seq);
    }

    fn dispatch(&mut self, header: Header, payload: &[u8]) {
        self.check_sequence_gap(header.sequence_number);
        let ok = match header.msg_type {
            MsgType::Trade => Trade::from_bytes(payload).ok().filter(Trade::validate).map(|t| {
                if let Some(cb) = &self.on_trade {
                    cb(t);
                }
            }),
            MsgType::Quote => Quote::from_bytes(payload).ok().filter(Quote::validate).map(|q| {
                if q.is_crossed() {
                    self.stats.crossed_quotes.fetch_add(1, Ordering::Relaxed);
                }
                if let Some(cb) = &self.on_quote {
                    cb(q);
                }
            }),
            MsgType::OrderUpdate => OrderUpdate::from_bytes(payload)
                .ok()
                .filter(OrderUpdate::validate)
                .map(|o| {
                    if let Some(cb) = &self.on_order {
                        cb(o);
                    }
                }),
            MsgType::Heartbeat
            | MsgType::MarketStatus
            | MsgType::SymbolUpdate
            | MsgType::IndexUpdate => Some(()),
        };

        if ok.is_some() {
            self.stats.messages_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.parse_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}
