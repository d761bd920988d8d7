//! Transfer rate accounting
//!
//! [`TransferStats`] keeps a cumulative byte counter and a throughput estimate that is
//! resampled at most once per second, so short bursts never divide by a near-zero
//! interval.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const SAMPLE_INTERVAL_NANOS: u64 = 1_000_000_000;

/// Job-wide transfer counters
///
/// Cheap to clone; clones share the same counters. The engine only ever updates it
/// from one task at a time, but the counters are atomics so reporting can read them
/// from anywhere.
#[derive(Clone, Debug)]
pub struct TransferStats {
    inner: Arc<StatsInner>,
}

#[derive(Debug)]
struct StatsInner {
    started: Instant,
    /// Cumulative bytes received
    total_bytes: AtomicU64,
    /// Nanoseconds since `started` at the last rate sample
    last_sample_nanos: AtomicU64,
    /// Value of `total_bytes` at the last rate sample
    last_sample_bytes: AtomicU64,
    /// Last computed rate, stored as f64 bits
    rate_bits: AtomicU64,
}

/// Point-in-time copy of the counters for reporting
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferSnapshot {
    /// Cumulative bytes received
    pub bytes: u64,
    /// Time since the stats were created
    pub elapsed_secs: f64,
    /// Last sampled rate in bytes per second
    pub rate_bps: f64,
}

impl TransferSnapshot {
    /// Average rate over the whole job in bytes per second
    pub fn average_bps(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.bytes as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferStats {
    /// Start counting from now
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StatsInner {
                started: Instant::now(),
                total_bytes: AtomicU64::new(0),
                last_sample_nanos: AtomicU64::new(0),
                last_sample_bytes: AtomicU64::new(0),
                rate_bits: AtomicU64::new(0f64.to_bits()),
            }),
        }
    }

    /// Record `n` received bytes
    pub fn record_bytes(&self, n: usize) {
        self.record_bytes_at(n, self.inner.started.elapsed());
    }

    /// Record `n` bytes as if received `at` after the stats were created
    pub(crate) fn record_bytes_at(&self, n: usize, at: Duration) {
        let inner = &self.inner;
        let total = inner.total_bytes.fetch_add(n as u64, Ordering::AcqRel) + n as u64;

        let now = u64::try_from(at.as_nanos()).unwrap_or(u64::MAX);
        let last = inner.last_sample_nanos.load(Ordering::Acquire);
        let elapsed = now.saturating_sub(last);
        if elapsed < SAMPLE_INTERVAL_NANOS {
            return;
        }

        // Whoever wins the exchange advances the sample
        if inner
            .last_sample_nanos
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let previous = inner.last_sample_bytes.swap(total, Ordering::AcqRel);
            let rate = total.saturating_sub(previous) as f64 / (elapsed as f64 / 1e9);
            inner.rate_bits.store(rate.to_bits(), Ordering::Release);
        }
    }

    /// Cumulative bytes received
    pub fn total_bytes(&self) -> u64 {
        self.inner.total_bytes.load(Ordering::Acquire)
    }

    /// Last sampled throughput in bytes per second (never negative)
    pub fn rate_bps(&self) -> f64 {
        f64::from_bits(self.inner.rate_bits.load(Ordering::Acquire))
    }

    /// Time since the stats were created
    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Copy the current counters
    pub fn snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            bytes: self.total_bytes(),
            elapsed_secs: self.elapsed().as_secs_f64(),
            rate_bps: self.rate_bps(),
        }
    }
}
