//! Fixed-resolution latency histogram.
//!
//! Latencies are quantized to `bucket = duration_ns / bucket_width_ns`
//! (0.1 ms by default). Buckets below the ceiling (10 s by default) are plain
//! atomic counters, so recording never allocates and never blocks on another
//! bucket. Samples at or beyond the ceiling are long-tail outliers, kept
//! individually (in milliseconds) behind a mutex since they are rare.
//!
//! Every recorded sample lands in exactly one place, so
//! `in_range_total() + long_tail_len() == total()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Width of one bucket: 0.1 ms.
pub const BUCKET_WIDTH_NS: u64 = 100_000;

/// Number of in-range buckets; with 0.1 ms buckets this covers 0 to 10 s.
pub const DEFAULT_BUCKETS: usize = 100_000;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Median, p95 and p99 latency in milliseconds.
///
/// A `None` means the histogram held no in-range samples, which keeps a real
/// 0.0 ms latency distinguishable from "not found".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Percentiles {
    pub median: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

/// Percentile levels, in percent, in the order the scan resolves them.
const LEVELS: [u64; 3] = [50, 95, 99];

/// Zero-based rank of the `percent` percentile among `total` sorted samples.
pub fn percentile_rank(total: u64, percent: u64) -> u64 {
    // u128 keeps `total * percent` exact for any u64 total.
    ((total as u128 * percent as u128) / 100) as u64
}

pub struct LatencyHistogram {
    bucket_width_ns: u64,
    counts: Box<[AtomicU64]>,
    long_tail: Mutex<Vec<f64>>,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    /// 0.1 ms buckets up to a 10 s ceiling.
    pub fn new() -> Self {
        Self::with_buckets(BUCKET_WIDTH_NS, DEFAULT_BUCKETS)
    }

    /// Custom resolution and range. Zero values are raised to 1.
    pub fn with_buckets(bucket_width_ns: u64, buckets: usize) -> Self {
        let counts = (0..buckets.max(1)).map(|_| AtomicU64::new(0)).collect();
        Self {
            bucket_width_ns: bucket_width_ns.max(1),
            counts,
            long_tail: Mutex::new(Vec::new()),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    /// Smallest latency that no longer fits in a bucket.
    pub fn ceiling(&self) -> Duration {
        Duration::from_nanos(self.bucket_width_ns.saturating_mul(self.counts.len() as u64))
    }

    /// Bucket index a latency quantizes to; may be past the last bucket.
    pub fn bucket_for(&self, duration_ns: u64) -> u64 {
        duration_ns / self.bucket_width_ns
    }

    /// Representative latency of a bucket in milliseconds.
    pub fn bucket_ms(&self, bucket: usize) -> f64 {
        (bucket as u64 * self.bucket_width_ns) as f64 / NANOS_PER_MILLI
    }

    pub fn record(&self, latency: Duration) {
        self.record_ns(u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX));
    }

    pub fn record_ns(&self, duration_ns: u64) {
        let bucket = self.bucket_for(duration_ns);
        if bucket < self.counts.len() as u64 {
            self.counts[bucket as usize].fetch_add(1, Ordering::Relaxed);
        } else {
            self.lock_long_tail().push(duration_ns as f64 / NANOS_PER_MILLI);
        }
    }

    /// Samples recorded in `bucket`; 0 past the last bucket.
    pub fn count(&self, bucket: usize) -> u64 {
        self.counts.get(bucket).map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Sum of all bucket counts (long-tail samples excluded).
    pub fn in_range_total(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn long_tail_len(&self) -> usize {
        self.lock_long_tail().len()
    }

    /// Long-tail samples in milliseconds, in recording order.
    pub fn long_tail(&self) -> Vec<f64> {
        self.lock_long_tail().clone()
    }

    /// Every sample ever recorded, in range or not.
    pub fn total(&self) -> u64 {
        self.in_range_total() + self.long_tail_len() as u64
    }

    /// Median/p95/p99 over the in-range samples.
    pub fn percentiles(&self) -> Percentiles {
        self.percentiles_for(self.in_range_total())
    }

    /// Median/p95/p99 given the number of in-range samples.
    ///
    /// A single pass over the buckets in increasing order: the `k`-th sorted
    /// sample (zero-based) sits in the first bucket whose running count
    /// exceeds `k`, and the three ranks are resolved in ascending order. The
    /// scan stops as soon as p99 is found.
    pub fn percentiles_for(&self, total: u64) -> Percentiles {
        let mut found = [None; LEVELS.len()];
        if total == 0 {
            return Percentiles::default();
        }
        let ranks = LEVELS.map(|p| percentile_rank(total, p));

        let mut next = 0;
        let mut cumulative = 0u64;
        for (bucket, counter) in self.counts.iter().enumerate() {
            let count = counter.load(Ordering::Relaxed);
            if count == 0 {
                continue;
            }
            cumulative += count;
            while next < ranks.len() && cumulative > ranks[next] {
                found[next] = Some(self.bucket_ms(bucket));
                next += 1;
            }
            if next == ranks.len() {
                break;
            }
        }

        Percentiles { median: found[0], p95: found[1], p99: found[2] }
    }

    fn lock_long_tail(&self) -> MutexGuard<'_, Vec<f64>> {
        // A panicking recorder cannot leave the Vec half-written; keep the data.
        self.long_tail.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
