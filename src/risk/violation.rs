//! Risk violation record and the time-ordered buffer that holds them
//! (§3, §5: shared-exclusive lock; writers append, readers snapshot).

use parking_lot::RwLock;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
    Emergency,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskViolation {
    pub violation_type: String,
    pub severity: Severity,
    pub description: String,
    pub strategy_id: String,
    pub symbol_id: Option<u32>,
    pub current_value: f64,
    pub limit_value: f64,
    pub timestamp: u64,
}

const AGE_OUT_NS: u64 = 24 * 60 * 60 * 1_000_000_000;

pub struct ViolationBuffer {
    entries: RwLock<VecDeque<RiskViolation>>,
}

impl ViolationBuffer {
    pub fn new() -> Self {
        Self { entries: RwLock::new(VecDeque::new()) }
    }

    pub fn record(&self, violation: RiskViolation) {
        self.entries.write().push_back(violation);
    }

    pub fn snapshot(&self) -> Vec<RiskViolation> {
        self.entries.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes entries older than 24h relative to `now_ns`.
    pub fn age_out(&self, now_ns: u64) {
        let mut entries = self.entries.write();
        while let Some(front) = entries.front() {
            if now_ns.saturating_sub(front.timestamp) > AGE_OUT_NS {
                entries.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for ViolationBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(ts: u64) -> RiskViolation {
        RiskViolation {
            violation_type: "TEST".to_string(),
            severity: Severity::Warning,
            description: "test violation".to_string(),
            strategy_id: "S1".to_string(),
            symbol_id: Some(1),
            current_value: 1.0,
            limit_value: 0.5,
            timestamp: ts,
        }
    }

    #[test]
    fn test_age_out() {
        let buffer = ViolationBuffer::new();
        buffer.record(violation(0));
        buffer.record(violation(AGE_OUT_NS + 1));
        buffer.age_out(AGE_OUT_NS + 1);
        assert_eq!(buffer.len(), 1);
    }
}
