//! Trading engine glue (§9): owns the strategy registry, the book manager,
//! the risk gate, the position tracker, and venue dispatch. Incoming wire
//! messages are routed by a small tagged-variant handler table rather than
//! virtual dispatch, matching the codec's own `msg_type` switch.

use crate::book::level::PriceLevel;
use crate::book::manager::BookManager;
use crate::engine::order::{ExecutionReport as EngineExecutionReport, Order, OrderSide, OrderStatus, OrderType};
use crate::engine::strategy::{EngineHandle, RegisteredStrategy, StrategyCallbacks};
use crate::engine::venue::VenueSelector;
use crate::position::portfolio;
use crate::position::tracker::{Fill, PositionTracker};
use crate::risk::engine::{CandidateOrder, PreTradeContext, PreTradeEngine, Side as RiskSide};
use crate::risk::monitor::PostTradeMonitor;
use crate::risk::var::correlation;
use crate::wire::codec::{Codec, Message};
use crate::wire::messages::{OrderUpdate, Quote, Trade};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

fn quote_levels_to_price_levels(levels: [crate::wire::messages::QuoteLevel; 5], now: u64) -> [PriceLevel; 5] {
    let mut out = [PriceLevel::empty(); 5];
    for (i, level) in levels.into_iter().enumerate() {
        out[i] = PriceLevel { price: level.price, total_quantity: level.quantity, order_count: level.num_orders, last_update: now };
    }
    out
}

fn to_risk_side(side: OrderSide) -> RiskSide {
    match side {
        OrderSide::Buy => RiskSide::Buy,
        OrderSide::Sell => RiskSide::Sell,
    }
}

pub struct TradingEngine {
    pub books: BookManager,
    pub risk: Arc<PreTradeEngine>,
    pub positions: Arc<PositionTracker>,
    pub monitor: Arc<PostTradeMonitor>,
    venue_selector: Box<dyn VenueSelector>,
    strategies: RwLock<HashMap<String, RegisteredStrategy>>,
    orders: Mutex<HashMap<u64, Order>>,
    next_order_id: AtomicU64,
    next_execution_id: AtomicU64,
}

impl TradingEngine {
    pub fn new(risk: Arc<PreTradeEngine>, venue_selector: Box<dyn VenueSelector>) -> Arc<Self> {
        let positions = PositionTracker::new();
        let monitor = Arc::new(PostTradeMonitor::new(Arc::clone(&risk), Arc::clone(&positions)));
        Arc::new(Self {
            books: BookManager::new(),
            risk,
            positions,
            monitor,
            venue_selector,
            strategies: RwLock::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            next_order_id: AtomicU64::new(1),
            next_execution_id: AtomicU64::new(1),
        })
    }

    pub fn register_strategy(&self, strategy_id: impl Into<String>, callbacks: Arc<dyn StrategyCallbacks>) {
        let strategy_id = strategy_id.into();
        self.strategies.write().insert(strategy_id.clone(), RegisteredStrategy { strategy_id, callbacks });
    }

    /// Routes a decoded wire message to the right book/strategy path. A
    /// tagged-variant match stands in for the dispatch table: each arm is
    /// the handler for that `msg_type`.
    pub fn on_message(&self, message: &Message) {
        match message {
            Message::Trade(trade) => {
                if let Some(book) = self.books.get_book(trade.symbol_id) {
                    book.update_trade(trade.price, trade.quantity, trade.trade_time);
                }
                self.notify_strategies(|cb| cb.on_trade(trade.symbol_id, trade));
            }
            Message::Quote(quote) => {
                if let Some(book) = self.books.get_book(quote.symbol_id) {
                    book.update_quote(
                        quote_levels_to_price_levels(quote.bid_levels, quote.quote_time),
                        quote_levels_to_price_levels(quote.ask_levels, quote.quote_time),
                    );
                }
                self.notify_strategies(|cb| cb.on_quote(quote.symbol_id, quote));
                self.notify_strategies(|cb| cb.on_book_update(quote.symbol_id));
            }
            Message::OrderUpdate(_) => {}
            Message::Heartbeat { .. } | Message::MarketStatus { .. } | Message::SymbolUpdate { .. } | Message::IndexUpdate { .. } => {}
        }
    }

    /// Codec callbacks hand over raw typed payloads rather than a `Message`;
    /// these wrap each into the tagged variant `on_message` dispatches on.
    pub fn on_trade(&self, trade: Trade) {
        self.on_message(&Message::Trade(trade));
    }

    pub fn on_quote(&self, quote: Quote) {
        self.on_message(&Message::Quote(quote));
    }

    pub fn on_order_update(&self, order: OrderUpdate) {
        self.on_message(&Message::OrderUpdate(order));
    }

    /// Registers this engine's handlers on a feed codec so decoded frames
    /// flow straight into `on_message`'s handler table.
    pub fn attach_to_codec(self: &Arc<Self>, codec: &mut Codec) {
        let trade_engine = Arc::clone(self);
        codec.on_trade(move |t| trade_engine.on_trade(t));
        let quote_engine = Arc::clone(self);
        codec.on_quote(move |q| quote_engine.on_quote(q));
        let order_engine = Arc::clone(self);
        codec.on_order(move |o| order_engine.on_order_update(o));
    }

    fn notify_strategies(&self, f: impl Fn(&Arc<dyn StrategyCallbacks>)) {
        for registered in self.strategies.read().values() {
            f(&registered.callbacks);
        }
    }

    fn submit(&self, symbol_id: u32, side: OrderSide, order_type: OrderType, price: f64, quantity: f64, strategy_id: &str) -> u64 {
        let order_id = self.next_order_id.fetch_add(1, Ordering::Relaxed);
        let candidate = CandidateOrder { symbol_id, strategy_id: strategy_id.to_string(), side: to_risk_side(side), price, quantity };

        let held_positions = self.positions.positions();
        let fair_value = self.books.get_book(symbol_id).map(|b| b.mid()).unwrap_or(price);
        let current_position = self.positions.position(symbol_id, strategy_id).map(|p| p.quantity).unwrap_or(0.0);
        let strategy_exposure: f64 =
            held_positions.iter().filter(|p| p.strategy_id == strategy_id).map(|p| p.market_value().abs()).sum();
        let portfolio_exposure = portfolio::aggregate(&held_positions, 0.0).gross_exposure;
        let correlated_positions: Vec<(u32, f64)> = held_positions
            .iter()
            .filter(|p| p.symbol_id != symbol_id)
            .map(|p| (p.symbol_id, correlation(p.symbol_id, symbol_id, None)))
            .collect();
        let estimated_var_impact = price * quantity * 0.02;

        let ctx = PreTradeContext {
            order: &candidate,
            current_position,
            fair_value,
            estimated_var_impact,
            portfolio_exposure,
            strategy_exposure,
            correlated_positions,
        };

        let outcome = self.risk.full_check(&ctx);
        if !outcome.is_approved() {
            warn!(order_id, ?outcome, "order rejected by pre-trade risk gate");
            self.notify_strategies(|cb| cb.on_reject(order_id, "risk gate rejection"));
            return order_id;
        }

        let order = Order::new(order_id, order_id.to_string(), symbol_id, order_type, side, price, quantity, strategy_id.to_string());
        let venue = self.venue_selector.select(&order);
        self.orders.lock().insert(order_id, order);
        self.notify_strategies(|cb| cb.on_ack(order_id));
        info!(order_id, venue = %venue, "order submitted");
        order_id
    }

    fn cancel(&self, order_id: u64) -> bool {
        let mut orders = self.orders.lock();
        if let Some(order) = orders.get_mut(&order_id) {
            order.status = OrderStatus::Cancelled;
            true
        } else {
            false
        }
    }

    fn modify(&self, order_id: u64, new_price: f64, new_quantity: f64) -> bool {
        let mut orders = self.orders.lock();
        if let Some(order) = orders.get_mut(&order_id) {
            order.price = new_price;
            order.quantity = new_quantity;
            true
        } else {
            false
        }
    }

    /// Applies an execution report: marks the order filled, updates the
    /// position tracker, and forwards the fill to the post-trade monitor.
    pub fn on_execution(&self, report: &EngineExecutionReport) {
        let strategy_id = {
            let mut orders = self.orders.lock();
            let strategy_id = orders.get(&report.order_id).map(|o| o.strategy_id.clone()).unwrap_or_default();
            if let Some(order) = orders.get_mut(&report.order_id) {
                order.apply_fill(report.executed_price, report.executed_quantity);
            }
            strategy_id
        };

        let signed_quantity = match report.side {
            OrderSide::Buy => report.executed_quantity,
            OrderSide::Sell => -report.executed_quantity,
        };
        self.positions.on_fill(&Fill { symbol_id: report.symbol_id, signed_quantity, price: report.executed_price }, &strategy_id);
        self.monitor.on_execution(&crate::risk::monitor::ExecutionReport {
            symbol_id: report.symbol_id,
            strategy_id_hash: 0,
            realized_pnl_delta: self.positions.position(report.symbol_id, &strategy_id).map(|p| p.realized_pnl).unwrap_or(0.0),
        });

        self.notify_strategies(|cb| cb.on_execution(report));
    }

    pub fn next_execution_id(&self) -> u64 {
        self.next_execution_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl EngineHandle for TradingEngine {
    fn submit_order(&self, symbol_id: u32, side: OrderSide, order_type: OrderType, price: f64, quantity: f64, strategy_id: &str) -> u64 {
        self.submit(symbol_id, side, order_type, price, quantity, strategy_id)
    }

    fn cancel_order(&self, order_id: u64) -> bool {
        self.cancel(order_id)
    }

    fn modify_order(&self, order_id: u64, new_price: f64, new_quantity: f64) -> bool {
        self.modify(order_id, new_price, new_quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::venue::FixedVenue;
    use crate::risk::limits::{RiskLimits, RiskLimitsHandle};
    use std::sync::atomic::AtomicU64 as StdAtomicU64;

    fn new_engine() -> Arc<TradingEngine> {
        let risk = Arc::new(PreTradeEngine::new(RiskLimitsHandle::new(RiskLimits::default())));
        TradingEngine::new(risk, Box::new(FixedVenue::new("NSE")))
    }

    struct RecordingStrategy {
        acks: StdAtomicU64,
        rejects: StdAtomicU64,
    }

    impl StrategyCallbacks for RecordingStrategy {
        fn on_ack(&self, _order_id: u64) {
            self.acks.fetch_add(1, Ordering::Relaxed);
        }
        fn on_reject(&self, _order_id: u64, _reason: &str) {
            self.rejects.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_submit_order_approved_acks() {
        let engine = new_engine();
        let strategy = Arc::new(RecordingStrategy { acks: StdAtomicU64::new(0), rejects: StdAtomicU64::new(0) });
        engine.register_strategy("S1", strategy.clone() as Arc<dyn StrategyCallbacks>);

        let order_id = engine.submit_order(1, OrderSide::Buy, OrderType::Limit, 100.0, 10.0, "S1");
        assert!(order_id > 0);
        assert_eq!(strategy.acks.load(Ordering::Relaxed), 1);
        assert_eq!(strategy.rejects.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_submit_order_rejected_by_size_limit() {
        let risk = Arc::new(PreTradeEngine::new(RiskLimitsHandle::new({
            let mut limits = RiskLimits::default();
            limits.max_order_value = 100.0;
            limits
        })));
        let engine = TradingEngine::new(risk, Box::new(FixedVenue::new("NSE")));
        let strategy = Arc::new(RecordingStrategy { acks: StdAtomicU64::new(0), rejects: StdAtomicU64::new(0) });
        engine.register_strategy("S1", strategy.clone() as Arc<dyn StrategyCallbacks>);

        engine.submit_order(1, OrderSide::Buy, OrderType::Limit, 100.0, 10.0, "S1");
        assert_eq!(strategy.rejects.load(Ordering::Relaxed), 1);
        assert_eq!(strategy.acks.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_attach_to_codec_routes_trade_into_book() {
        use crate::wire::header::{Exchange, Header, MsgType, MIN_HEADER};
        use crate::wire::messages::broker_id;

        let engine = new_engine();
        engine.books.add_book(1, 0.01);
        let mut codec = Codec::new();
        engine.attach_to_codec(&mut codec);

        let trade = Trade {
            symbol_id: 1,
            trade_id: 1,
            price: 101.5,
            quantity: 10.0,
            buyer_broker: broker_id("A"),
            seller_broker: broker_id("B"),
            trade_time: 1,
        };
        let payload = trade.to_bytes();
        let header = Header {
            msg_type: MsgType::Trade,
            exchange: Exchange::Nse,
            msg_length: (MIN_HEADER + payload.len()) as u16,
            timestamp: 1,
            sequence_number: 1,
        };
        let mut frame = header.encode().to_vec();
        frame.extend_from_slice(&payload);
        codec.parse_buffer(&frame);

        let book = engine.books.get_book(1).unwrap();
        assert_eq!(book.stats().last_trade_price, 101.5);
    }

    #[test]
    fn test_cancel_unknown_order_returns_false() {
        let engine = new_engine();
        assert!(!engine.cancel_order(999));
    }

    #[test]
    fn test_execution_updates_position() {
        let engine = new_engine();
        let order_id = engine.submit_order(1, OrderSide::Buy, OrderType::Limit, 100.0, 10.0, "S1");
        engine.on_execution(&EngineExecutionReport {
            order_id,
            execution_id: engine.next_execution_id(),
            symbol_id: 1,
            side: OrderSide::Buy,
            executed_price: 100.0,
            executed_quantity: 10.0,
            commission: 0.0,
            execution_time: 0,
            venue: "NSE".to_string(),
        });
        let position = engine.positions.position(1, "S1").unwrap();
        assert_eq!(position.quantity, 10.0);
    }
}
