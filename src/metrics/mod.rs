pub mod histogram;

pub use histogram::{HistogramSummary, LatencyHistogram};
