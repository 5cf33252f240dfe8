//! Thin wiring entry point. Flag parsing and a full process lifecycle are
//! out of scope (§1); this loads config from the environment, builds the
//! core components, and starts the background workers.

use goldearn_hft::auth::{Credentials, SessionAuthenticator};
use goldearn_hft::config::{guard_production_host, ConfigView, EnvConfigView};
use goldearn_hft::engine::{FixedVenue, TradingEngine};
use goldearn_hft::risk::{PreTradeEngine, RiskLimits, RiskLimitsHandle};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = EnvConfigView::new();
    let production = config.get_parsed("runtime.production", false);
    let nse_host = config.get_or("market_data.nse_host", "127.0.0.1");
    guard_production_host(production, &nse_host)?;

    let risk = Arc::new(PreTradeEngine::new(RiskLimitsHandle::new(RiskLimits::default())));
    let engine = TradingEngine::new(Arc::clone(&risk), Box::new(FixedVenue::new("NSE")));
    engine.positions.start();
    engine.monitor.start();

    let api_key = config.get("authentication.nse_api_key");
    let secret_key = config.get("authentication.nse_secret_key");
    if let (Some(api_key), Some(secret_key)) = (api_key, secret_key) {
        let credentials = Credentials::api_key_method(api_key, secret_key, true);
        let login_url = config.get_or("authentication.nse_login_url", "https://example.test/login");
        let authenticator = Arc::new(SessionAuthenticator::new(login_url, credentials, None));
        authenticator.authenticate().await?;
        authenticator.start_refresh();
    } else {
        tracing::warn!("no NSE API credentials configured, skipping authentication");
    }

    tokio::signal::ctrl_c().await?;
    engine.monitor.stop();
    engine.positions.stop();
    Ok(())
}
