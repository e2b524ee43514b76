//! Global atomic counters for engine activity.
//!
//! Counters are bumped silently by the planners. Call [`Metrics::flush`] to
//! emit the current values as a single `tracing::info!` event, e.g. once a
//! CLI command or a batch of seasons completes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    allocation_runs: AtomicU64,
    reforecasts: AtomicU64,
    transfers_proposed: AtomicU64,
    replenishment_shortfalls: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            allocation_runs: AtomicU64::new(0),
            reforecasts: AtomicU64::new(0),
            transfers_proposed: AtomicU64::new(0),
            replenishment_shortfalls: AtomicU64::new(0),
        }
    }

    /// Count one completed allocation plan.
    pub fn inc_allocations(&self) {
        self.allocation_runs.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "allocation_runs", "counter incremented");
    }

    /// Count one applied reforecast.
    pub fn inc_reforecasts(&self) {
        self.reforecasts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reforecasts", "counter incremented");
    }

    /// Add the transfer orders of one reallocation run.
    pub fn add_transfers(&self, count: u64) {
        self.transfers_proposed.fetch_add(count, Ordering::Relaxed);
        tracing::trace!(metric = "transfers_proposed", count, "counter incremented");
    }

    /// Count one replenishment pass the DC could not fully cover.
    pub fn inc_replenishment_shortfalls(&self) {
        self.replenishment_shortfalls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "replenishment_shortfalls", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            allocation_runs = self.allocation_runs(),
            reforecasts = self.reforecasts(),
            transfers_proposed = self.transfers_proposed(),
            replenishment_shortfalls = self.replenishment_shortfalls(),
        );
    }

    pub fn allocation_runs(&self) -> u64 {
        self.allocation_runs.load(Ordering::Relaxed)
    }

    pub fn reforecasts(&self) -> u64 {
        self.reforecasts.load(Ordering::Relaxed)
    }

    pub fn transfers_proposed(&self) -> u64 {
        self.transfers_proposed.load(Ordering::Relaxed)
    }

    pub fn replenishment_shortfalls(&self) -> u64 {
        self.replenishment_shortfalls.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.allocation_runs.store(0, Ordering::Relaxed);
        self.reforecasts.store(0, Ordering::Relaxed);
        self.transfers_proposed.store(0, Ordering::Relaxed);
        self.replenishment_shortfalls.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_allocations();
        m.inc_allocations();
        assert_eq!(m.allocation_runs(), 2);

        m.inc_reforecasts();
        assert_eq!(m.reforecasts(), 1);

        m.add_transfers(4);
        m.add_transfers(0);
        assert_eq!(m.transfers_proposed(), 4);

        m.inc_replenishment_shortfalls();
        assert_eq!(m.replenishment_shortfalls(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_allocations();
        m.inc_reforecasts();
        m.add_transfers(3);
        m.inc_replenishment_shortfalls();
        m.reset();
        assert_eq!(m.allocation_runs(), 0);
        assert_eq!(m.reforecasts(), 0);
        assert_eq!(m.transfers_proposed(), 0);
        assert_eq!(m.replenishment_shortfalls(), 0);
    }
}
