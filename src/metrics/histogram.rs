//! Logarithmic-bucket latency histogram for hot-path timing.
//!
//! Buckets span microseconds from 1 µs to 10 s with roughly 10% relative
//! error spacing, plus an overflow bucket for anything larger. Recording is
//! a binary search into a fixed bound table followed by a single counter
//! increment under a mutex — cheap enough to call on every book update or
//! risk check without perturbing the measurement it is taking.

use parking_lot::Mutex;
use serde::Serialize;

static BUCKET_BOUNDS: &[u64] = &[
    1, 2, 5, 10, 20, 50, 100, 200, 500, 1_000, 2_000, 5_000, 10_000, 20_000, 50_000, 100_000,
    200_000, 500_000, 1_000_000, 2_000_000, 5_000_000, 10_000_000, u64::MAX,
];

struct HistogramInner {
    buckets: Vec<u64>,
    count: u64,
    sum_us: u64,
    min_us: u64,
    max_us: u64,
}

impl HistogramInner {
    fn new() -> Self {
        Self {
            buckets: vec![0; BUCKET_BOUNDS.len()],
            count: 0,
            sum_us: 0,
            min_us: u64::MAX,
            max_us: 0,
        }
    }
}

/// A latency histogram keyed in microseconds.
pub struct LatencyHistogram {
    inner: Mutex<HistogramInner>,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HistogramInner::new()),
        }
    }

    pub fn record(&self, latency_us: u64) {
        let idx = BUCKET_BOUNDS.partition_point(|&b| b < latency_us);
        let idx = idx.min(BUCKET_BOUNDS.len() - 1);
        let mut inner = self.inner.lock();
        inner.buckets[idx] += 1;
        inner.count += 1;
        inner.sum_us += latency_us;
        if latency_us < inner.min_us {
            inner.min_us = latency_us;
        }
        if latency_us > inner.max_us {
            inner.max_us = latency_us;
        }
    }

    pub fn record_duration(&self, d: std::time::Duration) {
        self.record(d.as_micros() as u64);
    }

    pub fn percentile(&self, p: f64) -> u64 {
        let inner = self.inner.lock();
        Self::percentile_inner(&inner, p)
    }

    fn percentile_inner(inner: &HistogramInner, p: f64) -> u64 {
        if inner.count == 0 {
            return 0;
        }
        let target = ((inner.count as f64) * p).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &c) in inner.buckets.iter().enumerate() {
            cumulative += c;
            if cumulative >= target.max(1) {
                return BUCKET_BOUNDS[i];
            }
        }
        *BUCKET_BOUNDS.last().unwrap()
    }

    pub fn p50(&self) -> u64 {
        self.percentile(0.50)
    }
    pub fn p90(&self) -> u64 {
        self.percentile(0.90)
    }
    pub fn p95(&self) -> u64 {
        self.percentile(0.95)
    }
    pub fn p99(&self) -> u64 {
        self.percentile(0.99)
    }
    pub fn p999(&self) -> u64 {
        self.percentile(0.999)
    }

    pub fn mean(&self) -> f64 {
        let inner = self.inner.lock();
        if inner.count == 0 {
            0.0
        } else {
            inner.sum_us as f64 / inner.count as f64
        }
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }

    pub fn min(&self) -> u64 {
        let inner = self.inner.lock();
        if inner.count == 0 {
            0
        } else {
            inner.min_us
        }
    }

    pub fn max(&self) -> u64 {
        self.inner.lock().max_us
    }

    pub fn summary(&self, name: &str) -> HistogramSummary {
        let inner = self.inner.lock();
        HistogramSummary {
            name: name.to_string(),
            count: inner.count,
            mean_us: if inner.count == 0 {
                0.0
            } else {
                inner.sum_us as f64 / inner.count as f64
            },
            min_us: if inner.count == 0 { 0 } else { inner.min_us },
            max_us: inner.max_us,
            p50_us: Self::percentile_inner(&inner, 0.50),
            p90_us: Self::percentile_inner(&inner, 0.90),
            p95_us: Self::percentile_inner(&inner, 0.95),
            p99_us: Self::percentile_inner(&inner, 0.99),
            p999_us: Self::percentile_inner(&inner, 0.999),
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = HistogramInner::new();
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramSummary {
    pub name: String,
    pub count: u64,
    pub mean_us: f64,
    pub min_us: u64,
    pub max_us: u64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub p999_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_basic() {
        let h = LatencyHistogram::new();
        for v in [1, 2, 3, 5, 8, 13, 21, 34, 55, 89] {
            h.record(v);
        }
        assert_eq!(h.count(), 10);
        assert!(h.p50() > 0);
        assert!(h.max() >= 89);
    }

    #[test]
    fn test_histogram_empty() {
        let h = LatencyHistogram::new();
        assert_eq!(h.count(), 0);
        assert_eq!(h.p99(), 0);
        assert_eq!(h.mean(), 0.0);
    }

    #[test]
    fn test_histogram_high_latency() {
        let h = LatencyHistogram::new();
        h.record(50_000_000);
        assert_eq!(h.count(), 1);
        assert_eq!(h.p99(), u64::MAX);
    }
}
