//! Compression Statistics Module
//!
//! Cumulative counters for observability. Nothing here feeds back into
//! compression decisions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Fixed-point scale for summing per-request ratios in an atomic.
const RATIO_SCALE: f64 = 1_000_000.0;

// == Compression Counters ==
#[derive(Debug, Default)]
pub(crate) struct CompressionCounters {
    requests: AtomicU64,
    compressed: AtomicU64,
    identity_fallbacks: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    ratio_sum_scaled: AtomicU64,
}

impl CompressionCounters {
    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one `compress` call that produced `output` bytes from `input`.
    pub fn record_outcome(&self, input: usize, output: usize, applied: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if applied {
            self.compressed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.identity_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_in.fetch_add(input as u64, Ordering::Relaxed);
        self.bytes_out.fetch_add(output as u64, Ordering::Relaxed);

        let ratio = if input == 0 {
            1.0
        } else {
            output as f64 / input as f64
        };
        self.ratio_sum_scaled
            .fetch_add((ratio * RATIO_SCALE).round() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CompressionStats {
        let requests = self.requests.load(Ordering::Relaxed);
        let bytes_in = self.bytes_in.load(Ordering::Relaxed);
        let bytes_out = self.bytes_out.load(Ordering::Relaxed);
        let ratio_sum = self.ratio_sum_scaled.load(Ordering::Relaxed) as f64 / RATIO_SCALE;

        CompressionStats {
            requests,
            compressed: self.compressed.load(Ordering::Relaxed),
            identity_fallbacks: self.identity_fallbacks.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_in,
            bytes_out,
            bytes_saved: bytes_in.saturating_sub(bytes_out),
            average_ratio: if requests == 0 {
                1.0
            } else {
                ratio_sum / requests as f64
            },
        }
    }
}

// == Compression Stats ==
/// Snapshot returned by `CompressionManager::metrics()`.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionStats {
    /// Number of `compress` calls
    pub requests: u64,
    /// Calls whose compressed form was kept
    pub compressed: u64,
    /// Calls that fell back to identity because compression did not shrink
    pub identity_fallbacks: u64,
    /// Payloads `decide` declined
    pub skipped: u64,
    /// Encoder errors
    pub failures: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub bytes_saved: u64,
    /// Mean of per-request output/input ratios (1.0 = no saving)
    pub average_ratio: f64,
}
