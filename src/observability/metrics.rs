use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Per-stage counters updated by the scheduler loop
pub struct StageMetrics {
    stage: String,
    cycles: AtomicU64,
    idle_cycles: AtomicU64,
    records: AtomicU64,
    errors: AtomicU64,
    discarded: AtomicU64,
    total_latency_us: AtomicU64,
}

impl StageMetrics {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            cycles: AtomicU64::new(0),
            idle_cycles: AtomicU64::new(0),
            records: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn idle_cycles(&self) -> u64 {
        self.idle_cycles.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records dropped by a transform under the discard policy
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_cycle(&self) -> Instant {
        Instant::now()
    }

    /// Count a finished cycle that moved `records` records.
    pub fn finish_cycle(&self, start: Instant, records: usize) {
        let latency_us = start.elapsed().as_micros() as u64;
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if records == 0 {
            self.idle_cycles.fetch_add(1, Ordering::Relaxed);
        } else {
            self.records.fetch_add(records as u64, Ordering::Relaxed);
            self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        }
    }

    /// Mean latency of cycles that did work
    pub fn avg_busy_latency_us(&self) -> u64 {
        let busy = self.cycles().saturating_sub(self.idle_cycles());
        if busy == 0 {
            return 0;
        }
        self.total_latency_us.load(Ordering::Relaxed) / busy
    }
}
