//! Risk limits (§3): the configured thresholds the pre-trade pipeline and
//! post-trade monitor check candidate orders and portfolio state against.
//! Held behind an `ArcSwap` so limits can be hot-reloaded without a lock on
//! the read path.

use arc_swap::ArcSwap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLimits {
    pub max_position_size: f64,
    pub max_portfolio_exposure: f64,
    pub max_strategy_exposure: f64,
    pub max_sector_concentration: f64,
    pub max_order_size: f64,
    pub max_order_value: f64,
    pub max_orders_per_second: u32,
    pub max_orders_per_minute: u32,
    pub max_price_deviation: f64,
    pub min_spread: f64,
    pub max_market_impact: f64,
    pub max_var_1d: f64,
    pub max_var_10d: f64,
    pub max_volatility: f64,
    pub max_correlation: f64,
    pub max_daily_loss: f64,
    pub max_drawdown: f64,
    pub max_consecutive_losses: u32,
    pub max_position_hold_time_secs: u64,
    pub max_order_lifetime_secs: u64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: 100_000.0,
            max_portfolio_exposure: 10_000_000.0,
            max_strategy_exposure: 2_000_000.0,
            max_sector_concentration: 0.30,
            max_order_size: 10_000.0,
            max_order_value: 1_000_000.0,
            max_orders_per_second: 50,
            max_orders_per_minute: 1_000,
            max_price_deviation: 0.02,
            min_spread: 0.0,
            max_market_impact: 0.01,
            max_var_1d: 500_000.0,
            max_var_10d: 1_500_000.0,
            max_volatility: 0.05,
            max_correlation: 0.90,
            max_daily_loss: 500_000.0,
            max_drawdown: 0.15,
            max_consecutive_losses: 10,
            max_position_hold_time_secs: 24 * 60 * 60,
            max_order_lifetime_secs: 60,
        }
    }
}

/// Lock-free-read handle to the active limit set.
pub struct RiskLimitsHandle {
    inner: ArcSwap<RiskLimits>,
}

impl RiskLimitsHandle {
    pub fn new(limits: RiskLimits) -> Self {
        Self { inner: ArcSwap::from_pointee(limits) }
    }

    pub fn load(&self) -> Arc<RiskLimits> {
        self.inner.load_full()
    }

    pub fn update(&self, limits: RiskLimits) {
        self.inner.store(Arc::new(limits));
    }
}

impl Default for RiskLimitsHandle {
    fn default() -> Self {
        Self::new(RiskLimits::default())
    }
}
