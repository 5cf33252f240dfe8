//! Pre-trade risk engine (§4.5): an ordered decision pipeline evaluated
//! against a p99 budget of 10 µs, plus a reduced fast path for when full
//! portfolio context is unavailable.

use crate::risk::circuit_breaker::CircuitBreaker;
use crate::risk::limits::RiskLimitsHandle;
use crate::risk::violation::{RiskViolation, Severity, ViolationBuffer};
use crate::time::monotonic_ns;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone)]
pub struct CandidateOrder {
    pub symbol_id: u32,
    pub strategy_id: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
}

impl CandidateOrder {
    pub fn signed_quantity(&self) -> f64 {
        match self.side {
            Side::Buy => self.quantity,
            Side::Sell => -self.quantity,
        }
    }

    pub fn value(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Full decision context (§4.5): everything the ordered pipeline needs.
/// `correlated_positions` pairs each currently-held symbol with its
/// correlation to `order.symbol_id`, feeding the correlation gate.
#[derive(Debug, Clone)]
pub struct PreTradeContext<'a> {
    pub order: &'a CandidateOrder,
    pub current_position: f64,
    pub fair_value: f64,
    pub estimated_var_impact: f64,
    pub portfolio_exposure: f64,
    pub strategy_exposure: f64,
    pub correlated_positions: Vec<(u32, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    RejectedPositionLimit,
    RejectedOrderSize,
    RejectedPriceLimit,
    RejectedExposureLimit,
    RejectedVarLimit,
    RejectedVolatility,
    RejectedCorrelation,
    RejectedCircuitBreaker,
    RejectedBlacklist,
    RejectedSystemError,
}

impl Outcome {
    pub fn is_approved(self) -> bool {
        matches!(self, Outcome::Approved)
    }
}

#[derive(Default)]
pub struct RiskStats {
    pub total_checks_performed: AtomicU64,
    pub checks_approved: AtomicU64,
    pub checks_rejected: AtomicU64,
    avg_check_latency_ns: AtomicU64,
    pub max_check_latency_ns: AtomicU64,
    pub violations_today: AtomicU64,
    pub circuit_breaker_triggers: AtomicU64,
    last_violation_time: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskStatsSnapshot {
    pub total_checks_performed: u64,
    pub checks_approved: u64,
    pub checks_rejected: u64,
    pub avg_check_latency_ns: u64,
    pub max_check_latency_ns: u64,
    pub violations_today: u64,
    pub circuit_breaker_triggers: u64,
    pub last_violation_time: u64,
}

impl RiskStats {
    fn record_latency(&self, elapsed_ns: u64) {
        let n = self.total_checks_performed.load(Ordering::Relaxed).max(1);
        let prev_avg = self.avg_check_latency_ns.load(Ordering::Relaxed);
        let new_avg = prev_avg + (elapsed_ns.saturating_sub(prev_avg)) / n;
        self.avg_check_latency_ns.store(new_avg, Ordering::Relaxed);
        self.max_check_latency_ns.fetch_max(elapsed_ns, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RiskStatsSnapshot {
        RiskStatsSnapshot {
            total_checks_performed: self.total_checks_performed.load(Ordering::Relaxed),
            checks_approved: self.checks_approved.load(Ordering::Relaxed),
            checks_rejected: self.checks_rejected.load(Ordering::Relaxed),
            avg_check_latency_ns: self.avg_check_latency_ns.load(Ordering::Relaxed),
            max_check_latency_ns: self.max_check_latency_ns.load(Ordering::Relaxed),
            violations_today: self.violations_today.load(Ordering::Relaxed),
            circuit_breaker_triggers: self.circuit_breaker_triggers.load(Ordering::Relaxed),
            last_violation_time: self.last_violation_time.load(Ordering::Relaxed),
        }
    }
}

/// Per-strategy sliding window of order timestamps, pruned on each check.
struct RateWindow {
    timestamps: VecDeque<u64>,
}

impl RateWindow {
    fn new() -> Self {
        Self { timestamps: VecDeque::new() }
    }

    /// Evicts entries older than one minute, then checks both the 1s and
    /// 1-minute windows. Window arithmetic is unconditional — the same
    /// prune-then-count sequence runs whether or not the limit is hit.
    fn check(&mut self, now_ns: u64, max_per_second: u32, max_per_minute: u32) -> bool {
        const ONE_MINUTE_NS: u64 = 60_000_000_000;
        const ONE_SECOND_NS: u64 = 1_000_000_000;
        while let Some(&front) = self.timestamps.front() {
            if now_ns.saturating_sub(front) > ONE_MINUTE_NS {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        let count_last_second = self.timestamps.iter().filter(|&&ts| now_ns.saturating_sub(ts) <= ONE_SECOND_NS).count();
        let count_last_minute = self.timestamps.len();
        let allowed = (count_last_second as u32) < max_per_second && (count_last_minute as u32) < max_per_minute;
        self.timestamps.push_back(now_ns);
        allowed
    }
}

pub struct PreTradeEngine {
    pub limits: RiskLimitsHandle,
    pub circuit_breaker: CircuitBreaker,
    pub violations: ViolationBuffer,
    pub stats: RiskStats,
    blacklisted_symbols: DashMap<u32, ()>,
    blacklisted_strategies: DashMap<String, ()>,
    rate_windows: DashMap<String, Mutex<RateWindow>>,
}

impl PreTradeEngine {
    pub fn new(limits: RiskLimitsHandle) -> Self {
        Self {
            limits,
            circuit_breaker: CircuitBreaker::new(),
            violations: ViolationBuffer::new(),
            stats: RiskStats::default(),
            blacklisted_symbols: DashMap::new(),
            blacklisted_strategies: DashMap::new(),
            rate_windows: DashMap::new(),
        }
    }

    pub fn blacklist_symbol(&self, symbol_id: u32) {
        self.blacklisted_symbols.insert(symbol_id, ());
    }

    pub fn blacklist_strategy(&self, strategy_id: impl Into<String>) {
        self.blacklisted_strategies.insert(strategy_id.into(), ());
    }

    fn record_violation(&self, kind: &str, order: &CandidateOrder, current: f64, limit: f64, severity: Severity) {
        self.violations.record(RiskViolation {
            violation_type: kind.to_string(),
            severity,
            description: format!("{kind} breached for strategy {}", order.strategy_id),
            strategy_id: order.strategy_id.clone(),
            symbol_id: Some(order.symbol_id),
            current_value: current,
            limit_value: limit,
            timestamp: monotonic_ns(),
        });
        self.stats.violations_today.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self, start_ns: u64, outcome: Outcome) -> Outcome {
        self.stats.total_checks_performed.fetch_add(1, Ordering::Relaxed);
        if outcome.is_approved() {
            self.stats.checks_approved.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.checks_rejected.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.record_latency(monotonic_ns().saturating_sub(start_ns));
        outcome
    }

    /// Rules 2, 7, 8 only, with lock-free atomic limit reads. Used when the
    /// full context is unavailable or the strategy opts for minimum latency.
    pub fn quick_check(&self, order: &CandidateOrder) -> Outcome {
        let start = monotonic_ns();
        let limits = self.limits.load();

        if order.value() > limits.max_order_value || order.quantity > limits.max_order_size {
            self.record_violation("ORDER_SIZE", order, order.value(), limits.max_order_value, Severity::Warning);
            return self.finish(start, Outcome::RejectedOrderSize);
        }
        if self.blacklisted_symbols.contains_key(&order.symbol_id) || self.blacklisted_strategies.contains_key(&order.strategy_id) {
            self.record_violation("BLACKLIST", order, 1.0, 0.0, Severity::Critical);
            return self.finish(start, Outcome::RejectedBlacklist);
        }
        if self.circuit_breaker.is_tripped() {
            return self.finish(start, Outcome::RejectedCircuitBreaker);
        }
        self.finish(start, Outcome::Approved)
    }

    /// Full pipeline (§4.5's 8 rules, plus a correlation gate fed by
    /// `correlated_positions`), evaluated in order; the first failing rule
    /// yields the outcome and short-circuits the remainder.
    pub fn full_check(&self, ctx: &PreTradeContext<'_>) -> Outcome {
        let start = monotonic_ns();
        let limits = self.limits.load();
        let order = ctx.order;

        // 1. Position limit.
        let projected_position = (ctx.current_position + order.signed_quantity()).abs();
        if projected_position > limits.max_position_size {
            self.record_violation("POSITION_LIMIT", order, projected_position, limits.max_position_size, Severity::Warning);
            return self.finish(start, Outcome::RejectedPositionLimit);
        }

        // 2. Order size.
        if order.value() > limits.max_order_value || order.quantity > limits.max_order_size {
            self.record_violation("ORDER_SIZE", order, order.value(), limits.max_order_value, Severity::Warning);
            return self.finish(start, Outcome::RejectedOrderSize);
        }

        // 3. Price deviation.
        if ctx.fair_value > 0.0 {
            let deviation = (order.price - ctx.fair_value).abs() / ctx.fair_value;
            if deviation > limits.max_price_deviation {
                self.record_violation("PRICE_LIMIT", order, deviation, limits.max_price_deviation, Severity::Warning);
                return self.finish(start, Outcome::RejectedPriceLimit);
            }
        }

        // 4. Exposure.
        let order_value = order.value();
        if ctx.portfolio_exposure + order_value > limits.max_portfolio_exposure
            || ctx.strategy_exposure + order_value > limits.max_strategy_exposure
        {
            self.record_violation("EXPOSURE_LIMIT", order, ctx.portfolio_exposure + order_value, limits.max_portfolio_exposure, Severity::Warning);
            return self.finish(start, Outcome::RejectedExposureLimit);
        }

        // 5. VaR.
        if ctx.estimated_var_impact > limits.max_var_1d {
            self.record_violation("VAR_LIMIT", order, ctx.estimated_var_impact, limits.max_var_1d, Severity::Critical);
            return self.finish(start, Outcome::RejectedVarLimit);
        }

        // 6. Correlation.
        let max_correlation = ctx.correlated_positions.iter().map(|(_, c)| *c).fold(0.0_f64, f64::max);
        let correlation_outcome = self.check_correlation(order, max_correlation);
        if !correlation_outcome.is_approved() {
            return self.finish(start, correlation_outcome);
        }

        // 7. Rate.
        let mut window = self
            .rate_windows
            .entry(order.strategy_id.clone())
            .or_insert_with(|| Mutex::new(RateWindow::new()));
        let allowed = window.lock().check(monotonic_ns(), limits.max_orders_per_second, limits.max_orders_per_minute);
        drop(window);
        if !allowed {
            self.record_violation("RATE_LIMIT", order, 1.0, limits.max_orders_per_second as f64, Severity::Warning);
            return self.finish(start, Outcome::RejectedSystemError);
        }

        // 8. Blacklist.
        if self.blacklisted_symbols.contains_key(&order.symbol_id) || self.blacklisted_strategies.contains_key(&order.strategy_id) {
            self.record_violation("BLACKLIST", order, 1.0, 0.0, Severity::Critical);
            return self.finish(start, Outcome::RejectedBlacklist);
        }

        // 9. Circuit breaker.
        if self.circuit_breaker.is_tripped() {
            return self.finish(start, Outcome::RejectedCircuitBreaker);
        }

        self.finish(start, Outcome::Approved)
    }

    /// Rejects if the order's symbol is too correlated with a currently held
    /// position. Also used standalone by the post-trade monitor's sweep,
    /// where `order` carries no real strategy and `max_pairwise_correlation`
    /// is the portfolio-wide figure rather than one order's.
    fn check_correlation(&self, order: &CandidateOrder, max_pairwise_correlation: f64) -> Outcome {
        let limits = self.limits.load();
        if max_pairwise_correlation > limits.max_correlation {
            self.record_violation("CORRELATION", order, max_pairwise_correlation, limits.max_correlation, Severity::Warning);
            return Outcome::RejectedCorrelation;
        }
        Outcome::Approved
    }

    /// Portfolio-level volatility and correlation checks (§4.5: "a
    /// background loop runs portfolio/strategy/correlation checks every
    /// second"), driven by `PostTradeMonitor::sweep_loop` rather than the
    /// per-order pipeline above.
    pub fn check_portfolio_volatility(&self, portfolio_volatility: f64) -> Outcome {
        let limits = self.limits.load();
        if portfolio_volatility > limits.max_volatility {
            self.violations.record(RiskViolation {
                violation_type: "VOLATILITY".to_string(),
                severity: Severity::Warning,
                description: "portfolio volatility exceeds limit".to_string(),
                strategy_id: String::new(),
                symbol_id: None,
                current_value: portfolio_volatility,
                limit_value: limits.max_volatility,
                timestamp: monotonic_ns(),
            });
            self.stats.violations_today.fetch_add(1, Ordering::Relaxed);
            return Outcome::RejectedVolatility;
        }
        Outcome::Approved
    }

    pub fn check_portfolio_correlation(&self, max_pairwise_correlation: f64) -> Outcome {
        let limits = self.limits.load();
        if max_pairwise_correlation > limits.max_correlation {
            self.violations.record(RiskViolation {
                violation_type: "CORRELATION".to_string(),
                severity: Severity::Warning,
                description: "portfolio correlation exceeds limit".to_string(),
                strategy_id: String::new(),
                symbol_id: None,
                current_value: max_pairwise_correlation,
                limit_value: limits.max_correlation,
                timestamp: monotonic_ns(),
            });
            self.stats.violations_today.fetch_add(1, Ordering::Relaxed);
            return Outcome::RejectedCorrelation;
        }
        Outcome::Approved
    }

    pub fn trigger_circuit_breaker(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.circuit_breaker.trip(reason.clone());
        self.stats.circuit_breaker_triggers.fetch_add(1, Ordering::Relaxed);
        self.stats.last_violation_time.store(monotonic_ns(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::limits::RiskLimits;

    fn engine_with_limits(limits: RiskLimits) -> PreTradeEngine {
        PreTradeEngine::new(RiskLimitsHandle::new(limits))
    }

    #[test]
    fn test_pre_trade_rejection_ordering() {
        let mut limits = RiskLimits::default();
        limits.max_order_value = 1000.0;
        let engine = engine_with_limits(limits);
        engine.blacklist_symbol(42);

        let order = CandidateOrder { symbol_id: 42, strategy_id: "S1".to_string(), side: Side::Buy, price: 50.0, quantity: 100.0 };
        let outcome = engine.quick_check(&order);
        assert_eq!(outcome, Outcome::RejectedOrderSize);
    }

    #[test]
    fn test_circuit_breaker_dominates() {
        let engine = engine_with_limits(RiskLimits::default());
        engine.trigger_circuit_breaker("daily loss");
        let order = CandidateOrder { symbol_id: 1, strategy_id: "S1".to_string(), side: Side::Buy, price: 10.0, quantity: 1.0 };
        let ctx = PreTradeContext {
            order: &order,
            current_position: 0.0,
            fair_value: 10.0,
            estimated_var_impact: 0.0,
            portfolio_exposure: 0.0,
            strategy_exposure: 0.0,
            correlated_positions: vec![],
        };
        assert_eq!(engine.full_check(&ctx), Outcome::RejectedCircuitBreaker);
    }

    #[test]
    fn test_full_pipeline_approves_within_limits() {
        let engine = engine_with_limits(RiskLimits::default());
        let order = CandidateOrder { symbol_id: 1, strategy_id: "S1".to_string(), side: Side::Buy, price: 100.0, quantity: 10.0 };
        let ctx = PreTradeContext {
            order: &order,
            current_position: 0.0,
            fair_value: 100.0,
            estimated_var_impact: 0.0,
            portfolio_exposure: 0.0,
            strategy_exposure: 0.0,
            correlated_positions: vec![],
        };
        assert_eq!(engine.full_check(&ctx), Outcome::Approved);
    }

    #[test]
    fn test_rate_limit_exactly_at_boundary_allowed() {
        let mut limits = RiskLimits::default();
        limits.max_orders_per_second = 2;
        limits.max_orders_per_minute = 100;
        let engine = engine_with_limits(limits);
        let order = CandidateOrder { symbol_id: 1, strategy_id: "S1".to_string(), side: Side::Buy, price: 10.0, quantity: 1.0 };
        let ctx = PreTradeContext {
            order: &order,
            current_position: 0.0,
            fair_value: 10.0,
            estimated_var_impact: 0.0,
            portfolio_exposure: 0.0,
            strategy_exposure: 0.0,
            correlated_positions: vec![],
        };
        assert_eq!(engine.full_check(&ctx), Outcome::Approved);
        assert_eq!(engine.full_check(&ctx), Outcome::Approved);
        assert_eq!(engine.full_check(&ctx), Outcome::RejectedSystemError);
    }

    #[test]
    fn test_correlation_rule_rejects_highly_correlated_position() {
        let engine = engine_with_limits(RiskLimits::default());
        let order = CandidateOrder { symbol_id: 1, strategy_id: "S1".to_string(), side: Side::Buy, price: 10.0, quantity: 1.0 };
        let ctx = PreTradeContext {
            order: &order,
            current_position: 0.0,
            fair_value: 10.0,
            estimated_var_impact: 0.0,
            portfolio_exposure: 0.0,
            strategy_exposure: 0.0,
            correlated_positions: vec![(2, 0.95)],
        };
        assert_eq!(engine.full_check(&ctx), Outcome::RejectedCorrelation);
    }

    #[test]
    fn test_portfolio_volatility_check_rejects_over_limit() {
        let mut limits = RiskLimits::default();
        limits.max_volatility = 0.05;
        let engine = engine_with_limits(limits);
        assert_eq!(engine.check_portfolio_volatility(0.10), Outcome::RejectedVolatility);
        assert_eq!(engine.check_portfolio_volatility(0.01), Outcome::Approved);
    }
}
