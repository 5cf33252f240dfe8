//! Timestamp helpers.
//!
//! Monotonic nanoseconds for latency measurement; wall-clock nanoseconds
//! since epoch for audit fields. Kept as free functions rather than a
//! wrapper type so hot paths can call straight through to `quanta`.

use quanta::Clock;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static CLOCK: OnceLock<Clock> = OnceLock::new();

fn clock() -> &'static Clock {
    CLOCK.get_or_init(Clock::new)
}

/// Monotonic nanoseconds, suitable for latency deltas. Not comparable across
/// process restarts.
pub fn monotonic_ns() -> u64 {
    clock().raw()
}

/// Wall-clock nanoseconds since the Unix epoch, for audit/log timestamps.
pub fn wall_clock_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Wall-clock seconds since the Unix epoch (used by HMAC login payloads).
pub fn wall_clock_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
