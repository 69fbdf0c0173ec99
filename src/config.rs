//! Configuration for a migration run.

use std::time::Duration;

/// Tuning knobs for the migration loop.
///
/// Endpoints are not part of this struct; the orchestrator is handed already
/// connected clients and this configuration only shapes how hard and how fast
/// it drives them.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Maximum simultaneously in-flight introspection and transfer
    /// operations, shared across discovery and rounds.
    pub concurrency: usize,

    /// How long to let a target-side increment converge across the target
    /// cluster's replicas before the source copy is destroyed.
    pub propagation_delay: Duration,

    /// Lower bound on the wall-clock duration of one round, to bound the
    /// request rate against the source regardless of how fast keys resolve.
    pub min_round_duration: Duration,

    /// Rounds to run against one working set before a full rescan of the
    /// keyspace picks up newly appeared keys.
    pub rounds_per_sweep: usize,

    /// Pattern used for key enumeration on the source.
    pub key_pattern: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            propagation_delay: Duration::from_secs(10),
            min_round_duration: Duration::from_secs(1),
            rounds_per_sweep: 60,
            key_pattern: "*".to_string(),
        }
    }
}

impl MigrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the in-flight operation bound.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the target convergence delay between the two transfer phases.
    pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
        self.propagation_delay = delay;
        self
    }

    /// Set the minimum wall-clock duration of one round.
    pub fn with_min_round_duration(mut self, duration: Duration) -> Self {
        self.min_round_duration = duration;
        self
    }

    /// Set how many rounds run before the next full rescan.
    pub fn with_rounds_per_sweep(mut self, rounds: usize) -> Self {
        self.rounds_per_sweep = rounds;
        self
    }

    /// Set the key enumeration pattern.
    pub fn with_key_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.key_pattern = pattern.into();
        self
    }
}
