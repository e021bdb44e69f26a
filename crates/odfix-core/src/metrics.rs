//! Global atomic counters for repair runs.
//!
//! Counters are bumped at the call site and reported with
//! [`Metrics::flush`] as one `tracing::info!` event at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    probes_executed: AtomicU64,
    rebuilds: AtomicU64,
    test_runs: AtomicU64,
    patches_written: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            probes_executed: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
            test_runs: AtomicU64::new(0),
            patches_written: AtomicU64::new(0),
        }
    }

    /// One validity probe (a `valid()` call of the minimizer or placement).
    pub fn inc_probes(&self) {
        self.probes_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "probes_executed", "counter incremented");
    }

    pub fn inc_rebuilds(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rebuilds", "counter incremented");
    }

    pub fn inc_test_runs(&self) {
        self.test_runs.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "test_runs", "counter incremented");
    }

    pub fn inc_patches_written(&self) {
        self.patches_written.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "patches_written", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            probes_executed = self.probes_executed(),
            rebuilds = self.rebuilds(),
            test_runs = self.test_runs(),
            patches_written = self.patches_written(),
        );
    }

    pub fn probes_executed(&self) -> u64 {
        self.probes_executed.load(Ordering::Relaxed)
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    pub fn test_runs(&self) -> u64 {
        self.test_runs.load(Ordering::Relaxed)
    }

    pub fn patches_written(&self) -> u64 {
        self.patches_written.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.probes_executed.store(0, Ordering::Relaxed);
        self.rebuilds.store(0, Ordering::Relaxed);
        self.test_runs.store(0, Ordering::Relaxed);
        self.patches_written.store(0, Ordering::Relaxed);
    }
}
