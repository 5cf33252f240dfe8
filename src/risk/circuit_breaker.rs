//! Circuit breaker (§4.5, §5): a single process-wide atomic gate. Once
//! tripped, every pre-trade decision returns `REJECTED_CIRCUIT_BREAKER`
//! regardless of other rules, until an explicit reset. Trip is idempotent.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct CircuitBreaker {
    tripped: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self { tripped: AtomicBool::new(false), reason: Mutex::new(None) }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Idempotent: tripping an already-tripped breaker keeps the first
    /// reason and is a no-op beyond that.
    pub fn trip(&self, reason: impl Into<String>) {
        if !self.tripped.swap(true, Ordering::AcqRel) {
            *self.reason.lock() = Some(reason.into());
        }
    }

    pub fn reset(&self) {
        self.tripped.store(false, Ordering::Release);
        *self.reason.lock() = None;
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_is_idempotent_and_sticky() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.is_tripped());
        breaker.trip("daily loss limit exceeded");
        assert!(breaker.is_tripped());
        breaker.trip("a different reason");
        assert_eq!(breaker.reason().unwrap(), "daily loss limit exceeded");
        breaker.reset();
        assert!(!breaker.is_tripped());
    }
}
