//! Rate limiting primitives for the wire codec (§4.1).
//!
//! The message token bucket must be constant-time: the branch taken must
//! not depend on whether the request was allowed, and all counters update
//! unconditionally (§8, law "rate-limit constant time"). The connection
//! limiter is a plain sliding window — it gates `connect()` attempts, not
//! the hot per-message path, so it is not held to the same constraint.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Token-bucket message limiter. Default capacity 10,000 msg/s.
pub struct TokenBucket {
    capacity: i64,
    refill_per_sec: i64,
    tokens: AtomicI64,
    last_refill_ns: AtomicI64,
    allowed: AtomicU64,
    dropped: AtomicU64,
    start: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_sec: u64) -> Self {
        let capacity = rate_per_sec as i64;
        Self {
            capacity,
            refill_per_sec: capacity,
            tokens: AtomicI64::new(capacity),
            last_refill_ns: AtomicI64::new(0),
            allowed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    pub fn default_rate() -> Self {
        Self::new(10_000)
    }

    fn now_ns(&self) -> i64 {
        self.start.elapsed().as_nanos() as i64
    }

    /// Attempt to consume one token. Branch-free beyond the single predicate
    /// that produces the return value: every counter is updated on every
    /// call regardless of outcome.
    pub fn try_consume(&self) -> bool {
        let now = self.now_ns();
        let last = self.last_refill_ns.swap(now, Ordering::AcqRel);
        let elapsed_ns = (now - last).max(0);
        let refill = (elapsed_ns * self.refill_per_sec) / NANOS_PER_SEC;

        let prev = self.tokens.fetch_add(refill, Ordering::AcqRel);
        let capped = (prev + refill).min(self.capacity);
        self.tokens.store(capped, Ordering::Release);

        let post = self.tokens.fetch_sub(1, Ordering::AcqRel) - 1;
        let allowed = post >= 0;

        // Unconditional: both counters are touched on every call, the
        // amount added depends on the predicate but the branch structure
        // (add vs. skip) does not.
        self.allowed.fetch_add(u64::from(allowed), Ordering::Relaxed);
        self.dropped.fetch_add(u64::from(!allowed), Ordering::Relaxed);

        // refund the token we spoke for on rejection, unconditionally: the
        // amount added is 0 or 1, never a skipped fetch_add.
        self.tokens.fetch_add(i64::from(!allowed), Ordering::AcqRel);
        allowed
    }

    pub fn allowed_count(&self) -> u64 {
        self.allowed.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Sliding-window connection attempt limiter. Default 10 attempts/minute.
pub struct ConnectionRateLimiter {
    max_attempts: usize,
    window: std::time::Duration,
    attempts: parking_lot::Mutex<std::collections::VecDeque<Instant>>,
}

impl ConnectionRateLimiter {
    pub fn new(max_attempts: usize, window: std::time::Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: parking_lot::Mutex::new(std::collections::VecDeque::new()),
        }
    }

    pub fn default_limiter() -> Self {
        Self::new(10, std::time::Duration::from_secs(60))
    }

    pub fn allow(&self) -> bool {
        let now = Instant::now();
        let mut attempts = self.attempts.lock();
        while let Some(&front) = attempts.front() {
            if now.duration_since(front) > self.window {
                attempts.pop_front();
            } else {
                break;
            }
        }
        if attempts.len() >= self.max_attempts {
            return false;
        }
        attempts.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_bucket_allows_up_to_capacity() {
        let bucket = TokenBucket::new(5);
        let mut allowed = 0;
        for _ in 0..10 {
            if bucket.try_consume() {
                allowed += 1;
            }
        }
        assert!(allowed <= 5);
        assert_eq!(bucket.allowed_count() + bucket.dropped_count(), 10);
    }

    #[test]
    fn test_connection_limiter_window() {
        let limiter = ConnectionRateLimiter::new(3, std::time::Duration::from_secs(60));
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }
}
