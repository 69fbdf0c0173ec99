//! Run counters for key resolutions and loop progress.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters accumulated over a migration run.
///
/// Updated concurrently by round aggregation and the outer loop, read at
/// sweep boundaries and at termination for the summary log line.
#[derive(Debug, Default)]
pub struct MigrationStats {
    moved: AtomicU64,
    reset: AtomicU64,
    vanished: AtomicU64,
    rounds: AtomicU64,
    sweeps: AtomicU64,
}

impl MigrationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter value was relocated to the target.
    pub fn record_moved(&self) {
        self.moved.fetch_add(1, Ordering::Relaxed);
    }

    /// A residual shard was cleared on the source.
    pub fn record_reset(&self) {
        self.reset.fetch_add(1, Ordering::Relaxed);
    }

    /// A key turned out to have no contribution left.
    pub fn record_vanished(&self) {
        self.vanished.fetch_add(1, Ordering::Relaxed);
    }

    /// One scheduling round finished.
    pub fn record_round(&self) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// One full discovery sweep started.
    pub fn record_sweep(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            moved: self.moved.load(Ordering::Relaxed),
            reset: self.reset.load(Ordering::Relaxed),
            vanished: self.vanished.load(Ordering::Relaxed),
            rounds: self.rounds.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`MigrationStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub moved: u64,
    pub reset: u64,
    pub vanished: u64,
    pub rounds: u64,
    pub sweeps: u64,
}

impl StatsSnapshot {
    /// Total number of keys resolved to a terminal state.
    pub fn resolved(&self) -> u64 {
        self.moved + self.reset + self.vanished
    }
}
