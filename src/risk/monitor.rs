//! Post-trade monitor (§4.5): reacts to execution reports by updating
//! realized P&L, trips the circuit breaker on a daily-loss breach, and
//! runs a background sweep for portfolio/correlation checks and violation
//! age-out.

use crate::position::tracker::PositionTracker;
use crate::risk::engine::PreTradeEngine;
use crate::risk::var::correlation;
use crate::risk::violation::{RiskViolation, Severity};
use crate::time::monotonic_ns;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ExecutionReport {
    pub symbol_id: u32,
    pub strategy_id_hash: u64,
    pub realized_pnl_delta: f64,
}

/// Running tally of today's realized P&L, reset externally at session
/// rollover (rollover scheduling is out of scope here).
pub struct PostTradeMonitor {
    engine: Arc<PreTradeEngine>,
    positions: Arc<PositionTracker>,
    portfolio_pnl_bits: AtomicU64,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    sweep_interval: Duration,
}

impl PostTradeMonitor {
    pub fn new(engine: Arc<PreTradeEngine>, positions: Arc<PositionTracker>) -> Self {
        Self {
            engine,
            positions,
            portfolio_pnl_bits: AtomicU64::new(0f64.to_bits()),
            running: AtomicBool::new(false),
            worker: Mutex::new(None),
            sweep_interval: Duration::from_secs(1),
        }
    }

    pub fn portfolio_pnl(&self) -> f64 {
        f64::from_bits(self.portfolio_pnl_bits.load(Ordering::Acquire))
    }

    fn add_pnl(&self, delta: f64) -> f64 {
        loop {
            let current_bits = self.portfolio_pnl_bits.load(Ordering::Acquire);
            let current = f64::from_bits(current_bits);
            let updated = current + delta;
            if self
                .portfolio_pnl_bits
                .compare_exchange(current_bits, updated.to_bits(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return updated;
            }
        }
    }

    /// Applies a fill's realized P&L delta and trips the circuit breaker if
    /// the resulting daily loss exceeds `max_daily_loss`.
    pub fn on_execution(&self, report: &ExecutionReport) {
        let updated = self.add_pnl(report.realized_pnl_delta);
        let limits = self.engine.limits.load();
        if updated < -limits.max_daily_loss {
            self.engine.trigger_circuit_breaker("daily loss limit exceeded");
            self.engine.violations.record(RiskViolation {
                violation_type: "DAILY_LOSS".to_string(),
                severity: Severity::Emergency,
                description: "daily loss limit exceeded".to_string(),
                strategy_id: String::new(),
                symbol_id: Some(report.symbol_id),
                current_value: updated,
                limit_value: -limits.max_daily_loss,
                timestamp: monotonic_ns(),
            });
        }
    }

    /// Spawns the background sweep thread. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let this = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("risk-post-trade-monitor".to_string())
            .spawn(move || this.sweep_loop())
            .expect("failed to spawn post-trade monitor thread");
        *self.worker.lock() = Some(handle);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    fn sweep_loop(&self) {
        while self.running.load(Ordering::Acquire) {
            std::thread::sleep(self.sweep_interval);
            self.engine.violations.age_out(monotonic_ns());
            self.check_portfolio();
        }
    }

    /// Runs the portfolio/correlation checks the background sweep owns
    /// (§4.5): volatility weighted by each position's market-value share,
    /// and the worst pairwise correlation across currently held symbols.
    fn check_portfolio(&self) {
        let positions = self.positions.positions();
        if positions.is_empty() {
            return;
        }
        let total_value: f64 = positions.iter().map(|p| p.market_value().abs()).sum();
        if total_value > 0.0 {
            let weighted_volatility: f64 =
                positions.iter().map(|p| (p.market_value().abs() / total_value) * p.volatility).sum();
            self.engine.check_portfolio_volatility(weighted_volatility);
        }

        let mut max_correlation = 0.0_f64;
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                if positions[i].symbol_id == positions[j].symbol_id {
                    continue;
                }
                let rho = correlation(positions[i].symbol_id, positions[j].symbol_id, None);
                max_correlation = max_correlation.max(rho);
            }
        }
        if max_correlation > 0.0 {
            self.engine.check_portfolio_correlation(max_correlation);
        }
    }
}

impl Drop for PostTradeMonitor {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::limits::{RiskLimits, RiskLimitsHandle};

    fn monitor_with_daily_loss(max_daily_loss: f64) -> PostTradeMonitor {
        let mut limits = RiskLimits::default();
        limits.max_daily_loss = max_daily_loss;
        let engine = Arc::new(PreTradeEngine::new(RiskLimitsHandle::new(limits)));
        PostTradeMonitor::new(engine, PositionTracker::new())
    }

    #[test]
    fn test_execution_updates_pnl() {
        let monitor = monitor_with_daily_loss(500_000.0);
        monitor.on_execution(&ExecutionReport { symbol_id: 1, strategy_id_hash: 0, realized_pnl_delta: -1000.0 });
        monitor.on_execution(&ExecutionReport { symbol_id: 1, strategy_id_hash: 0, realized_pnl_delta: 500.0 });
        assert_eq!(monitor.portfolio_pnl(), -500.0);
        assert!(!monitor.engine.circuit_breaker.is_tripped());
    }

    #[test]
    fn test_daily_loss_trips_circuit_breaker() {
        let monitor = monitor_with_daily_loss(10_000.0);
        monitor.on_execution(&ExecutionReport { symbol_id: 1, strategy_id_hash: 0, realized_pnl_delta: -15_000.0 });
        assert!(monitor.engine.circuit_breaker.is_tripped());
        assert_eq!(monitor.engine.circuit_breaker.reason().unwrap(), "daily loss limit exceeded");
    }

    #[test]
    fn test_sweep_records_portfolio_correlation_violation() {
        use crate::position::tracker::Fill;

        let mut limits = RiskLimits::default();
        limits.max_daily_loss = 500_000.0;
        limits.max_correlation = 0.1;
        let engine = Arc::new(PreTradeEngine::new(RiskLimitsHandle::new(limits)));
        let monitor = PostTradeMonitor::new(engine, PositionTracker::new());
        monitor.positions.on_fill(&Fill { symbol_id: 1, signed_quantity: 100.0, price: 50.0 }, "S1");
        monitor.positions.on_fill(&Fill { symbol_id: 2, signed_quantity: 100.0, price: 50.0 }, "S2");

        let before = monitor.engine.violations.len();
        monitor.check_portfolio();
        assert!(monitor.engine.violations.len() > before);
    }
}
