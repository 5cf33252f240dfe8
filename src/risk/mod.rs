pub mod circuit_breaker;
pub mod engine;
pub mod limits;
pub mod monitor;
pub mod var;
pub mod violation;

pub use circuit_breaker::CircuitBreaker;
pub use engine::{CandidateOrder, Outcome, PreTradeContext, PreTradeEngine, RiskStats, RiskStatsSnapshot, Side};
pub use limits::{RiskLimits, RiskLimitsHandle};
pub use monitor::{ExecutionReport, PostTradeMonitor};
pub use violation::{RiskViolation, Severity, ViolationBuffer};
