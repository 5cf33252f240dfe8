//! Configuration surface.
//!
//! Config-file loading and CLI flag parsing are out of scope (§1); this
//! crate only consumes a key/value view. `ConfigView` is that seam —
//! `EnvConfigView` is the concrete adapter used by `main.rs`, following the
//! dotted-key `Config::from_env` convention.

use crate::error::ConfigError;
use std::collections::HashMap;

/// A read-only key/value view. Tests can supply an in-memory map; production
/// wiring supplies `EnvConfigView`.
pub trait ConfigView: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn get_parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse::<T>().ok())
            .unwrap_or(default)
    }
}

/// In-memory config view, handy for tests and for layering defaults.
#[derive(Debug, Clone, Default)]
pub struct MapConfigView {
    values: HashMap<String, String>,
}

impl MapConfigView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigView for MapConfigView {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Reads dotted keys from environment variables, mapping `.` to `_` and
/// upper-casing, e.g. `market_data.nse_host` -> `MARKET_DATA_NSE_HOST`.
/// `dotenv()` is invoked once at construction so a `.env` file in the
/// working directory is honored.
pub struct EnvConfigView;

impl EnvConfigView {
    pub fn new() -> Self {
        dotenv::dotenv().ok();
        Self
    }

    fn env_key(key: &str) -> String {
        key.replace('.', "_").to_uppercase()
    }
}

impl Default for EnvConfigView {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigView for EnvConfigView {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(Self::env_key(key)).ok()
    }
}

const TEST_HOST_SUFFIXES: &[&str] = &[".example.com"];
const TEST_HOSTS: &[&str] = &["127.0.0.1", "localhost"];

/// Refuses to start in production mode if a configured host is a loopback
/// or example domain, per §6's production-mode guard.
pub fn guard_production_host(production: bool, host: &str) -> Result<(), ConfigError> {
    if !production {
        return Ok(());
    }
    if TEST_HOSTS.contains(&host) || TEST_HOST_SUFFIXES.iter().any(|suf| host.ends_with(suf)) {
        return Err(ConfigError::ProductionPointsAtTestEndpoint(host.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_config_view() {
        let cfg = MapConfigView::new().with("risk.max_daily_loss", "500000");
        assert_eq!(cfg.get("risk.max_daily_loss").as_deref(), Some("500000"));
        assert_eq!(cfg.get_parsed("risk.max_daily_loss", 0.0f64), 500000.0);
        assert_eq!(cfg.get_or("missing.key", "fallback"), "fallback");
    }

    #[test]
    fn test_guard_production_host() {
        assert!(guard_production_host(true, "127.0.0.1").is_err());
        assert!(guard_production_host(true, "feed.nse.example.com").is_err());
        assert!(guard_production_host(true, "feed.nseindia.com").is_ok());
        assert!(guard_production_host(false, "127.0.0.1").is_ok());
    }
}
