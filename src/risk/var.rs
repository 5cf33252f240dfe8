//! Value-at-Risk calculation (§4.5): three methods, all producing a 1-day
//! 95% loss figure by default. Exposed for strategy inspection; not used
//! directly in the hot pre-trade path (that path consults a precomputed
//! `portfolio_var_1d` instead of recomputing here).

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

pub const Z_95: f64 = 1.645;
pub const Z_99: f64 = 2.326;
const DEFAULT_CROSS_ASSET_CORRELATION: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct AssetPosition {
    pub symbol_id: u32,
    pub notional: f64,
    pub volatility: f64,
    /// Historical daily returns, most recent last.
    pub returns: Vec<f64>,
}

fn z_for_confidence(confidence: f64) -> f64 {
    if confidence >= 0.99 {
        Z_99
    } else {
        Z_95
    }
}

/// Pairwise correlation between two symbols: 1.0 for the same symbol,
/// otherwise the supplied override or the default cross-asset figure.
pub fn correlation(a: u32, b: u32, supplied: Option<f64>) -> f64 {
    if a == b {
        1.0
    } else {
        supplied.unwrap_or(DEFAULT_CROSS_ASSET_CORRELATION)
    }
}

/// `VaR = notional * sqrt(variance) * z * sqrt(days)` with portfolio
/// variance `sum_ij w_i w_j sigma_i sigma_j rho_ij`.
pub fn parametric_var(positions: &[AssetPosition], confidence: f64, days: f64, correlation_override: Option<f64>) -> f64 {
    let total_notional: f64 = positions.iter().map(|p| p.notional.abs()).sum();
    if total_notional == 0.0 {
        return 0.0;
    }
    let mut variance = 0.0;
    for pi in positions {
        let wi = pi.notional.abs() / total_notional;
        for pj in positions {
            let wj = pj.notional.abs() / total_notional;
            let rho = correlation(pi.symbol_id, pj.symbol_id, correlation_override);
            variance += wi * wj * pi.volatility * pj.volatility * rho;
        }
    }
    total_notional * variance.sqrt() * z_for_confidence(confidence) * days.sqrt()
}

fn quantile(mut values: Vec<f64>, confidence: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = (((1.0 - confidence) * values.len() as f64).floor() as usize).min(values.len() - 1);
    -values[idx]
}

/// Builds a portfolio return series by weighting per-asset returns over
/// their shortest common history, then returns the `confidence`-quantile
/// loss of that series.
pub fn historical_var(positions: &[AssetPosition], confidence: f64) -> f64 {
    let total_notional: f64 = positions.iter().map(|p| p.notional.abs()).sum();
    if total_notional == 0.0 {
        return 0.0;
    }
    let history_len = positions.iter().map(|p| p.returns.len()).min().unwrap_or(0);
    if history_len == 0 {
        return 0.0;
    }
    let mut portfolio_returns = vec![0.0; history_len];
    for p in positions {
        let w = p.notional.abs() / total_notional;
        let offset = p.returns.len() - history_len;
        for (i, r) in p.returns[offset..].iter().enumerate() {
            portfolio_returns[i] += w * r;
        }
    }
    let portfolio_dollar_returns: Vec<f64> = portfolio_returns.into_iter().map(|r| r * total_notional).collect();
    quantile(portfolio_dollar_returns, confidence)
}

/// Draws `num_simulations` normal samples per asset using its expected
/// return (assumed zero, as the spec does not supply one) and volatility,
/// aggregates by weight, and returns the `confidence`-quantile loss.
pub fn monte_carlo_var(positions: &[AssetPosition], confidence: f64, num_simulations: usize, seed: u64) -> f64 {
    let total_notional: f64 = positions.iter().map(|p| p.notional.abs()).sum();
    if total_notional == 0.0 || num_simulations == 0 {
        return 0.0;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut simulated = Vec::with_capacity(num_simulations);
    for _ in 0..num_simulations {
        let mut portfolio_return = 0.0;
        for p in positions {
            let w = p.notional.abs() / total_notional;
            let dist = Normal::new(0.0, p.volatility.max(1e-12)).unwrap();
            portfolio_return += w * dist.sample(&mut rng);
        }
        simulated.push(portfolio_return * total_notional);
    }
    quantile(simulated, confidence)
}

/// Component VaR: each position's contribution, summing to total portfolio
/// VaR under the parametric model.
pub fn component_var(positions: &[AssetPosition], confidence: f64, days: f64) -> Vec<(u32, f64)> {
    let total = parametric_var(positions, confidence, days, None);
    let total_notional: f64 = positions.iter().map(|p| p.notional.abs()).sum();
    if total_notional == 0.0 {
        return positions.iter().map(|p| (p.symbol_id, 0.0)).collect();
    }
    positions
        .iter()
        .map(|p| (p.symbol_id, total * (p.notional.abs() / total_notional)))
        .collect()
}

/// Marginal VaR via finite difference against each position held in
/// isolation.
pub fn marginal_var(positions: &[AssetPosition], confidence: f64, days: f64) -> Vec<(u32, f64)> {
    positions
        .iter()
        .map(|p| (p.symbol_id, parametric_var(std::slice::from_ref(p), confidence, days, None)))
        .collect()
}

/// Incremental VaR: `VaR(existing ∪ new) − VaR(existing)`.
pub fn incremental_var(existing: &[AssetPosition], new_position: &AssetPosition, confidence: f64, days: f64) -> f64 {
    let base = parametric_var(existing, confidence, days, None);
    let mut combined = existing.to_vec();
    combined.push(new_position.clone());
    let with_new = parametric_var(&combined, confidence, days, None);
    with_new - base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_sanity_two_uncorrelated_positions() {
        let positions = vec![
            AssetPosition { symbol_id: 1, notional: 1_000_000.0, volatility: 0.02, returns: vec![] },
            AssetPosition { symbol_id: 2, notional: 1_000_000.0, volatility: 0.02, returns: vec![] },
        ];
        let var = parametric_var(&positions, 0.95, 1.0, Some(0.0));
        assert!((var - 46_528.0).abs() < 10.0, "expected ~46528, got {var}");
    }

    #[test]
    fn test_historical_var_uses_shortest_history() {
        let positions = vec![
            AssetPosition { symbol_id: 1, notional: 1_000_000.0, volatility: 0.02, returns: vec![-0.01, 0.02, -0.03, 0.01] },
            AssetPosition { symbol_id: 2, notional: 1_000_000.0, volatility: 0.02, returns: vec![-0.02, 0.01, -0.01] },
        ];
        let var = historical_var(&positions, 0.95);
        assert!(var >= 0.0);
    }

    #[test]
    fn test_monte_carlo_var_nonnegative_and_deterministic() {
        let positions = vec![AssetPosition { symbol_id: 1, notional: 1_000_000.0, volatility: 0.02, returns: vec![] }];
        let a = monte_carlo_var(&positions, 0.95, 1000, 42);
        let b = monte_carlo_var(&positions, 0.95, 1000, 42);
        assert_eq!(a, b);
        assert!(a >= 0.0);
    }

    #[test]
    fn test_component_var_sums_to_total() {
        let positions = vec![
            AssetPosition { symbol_id: 1, notional: 1_000_000.0, volatility: 0.02, returns: vec![] },
            AssetPosition { symbol_id: 2, notional: 1_000_000.0, volatility: 0.02, returns: vec![] },
        ];
        let components = component_var(&positions, 0.95, 1.0);
        let total: f64 = components.iter().map(|(_, v)| v).sum();
        let expected = parametric_var(&positions, 0.95, 1.0, None);
        assert!((total - expected).abs() < 1e-6);
    }

    #[test]
    fn test_incremental_var_nonnegative_for_added_position() {
        let existing = vec![AssetPosition { symbol_id: 1, notional: 1_000_000.0, volatility: 0.02, returns: vec![] }];
        let new_pos = AssetPosition { symbol_id: 2, notional: 500_000.0, volatility: 0.02, returns: vec![] };
        let incr = incremental_var(&existing, &new_pos, 0.95, 1.0);
        assert!(incr > 0.0);
    }
}
