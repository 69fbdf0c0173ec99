//! Top-level control loop for a migration run.

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::introspect;
use crate::round::RoundScheduler;
use crate::signal::StopSignal;
use crate::stats::MigrationStats;
use crate::store::CounterStore;
use crate::topology;
use crate::transfer::TransferExecutor;
use crate::types::{CounterKey, NodeId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Drives a whole migration run from identity resolution to completion.
///
/// The run alternates full keyspace discovery with bounded rounds of
/// transfers, and only finishes when a fresh discovery finds nothing left to
/// move. Other writers keep mutating the source while this runs, so a sweep
/// that empties its working set proves nothing about the keys created since;
/// the rescan does.
#[derive(Debug)]
pub struct MigrationOrchestrator {
    source: Arc<dyn CounterStore>,
    target: Arc<dyn CounterStore>,
    config: MigrationConfig,
    stop: Arc<StopSignal>,
    stats: Arc<MigrationStats>,
    permits: Arc<Semaphore>,
}

impl MigrationOrchestrator {
    pub fn new(
        source: Arc<dyn CounterStore>,
        target: Arc<dyn CounterStore>,
        config: MigrationConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency));
        Self {
            source,
            target,
            config,
            stop: Arc::new(StopSignal::new()),
            stats: Arc::new(MigrationStats::new()),
            permits,
        }
    }

    /// Run counters accumulated so far.
    pub fn stats(&self) -> &Arc<MigrationStats> {
        &self.stats
    }

    /// Drive the migration until nothing is left to move or a transfer
    /// fails unrecoverably.
    ///
    /// Returns `Ok(())` once a full fresh discovery enumerates no keys with
    /// a present contribution on the source node. Any fatal error aborts the
    /// run immediately and is returned as-is.
    pub async fn run(&self) -> Result<()> {
        let run_id = Uuid::new_v4();
        let node_id = topology::resolve_self_id(self.source.as_ref()).await?;
        info!(%run_id, node_id = %node_id, "moving counter shards off this node");

        let executor = Arc::new(TransferExecutor::new(
            Arc::clone(&self.source),
            Arc::clone(&self.target),
            node_id.clone(),
            self.config.propagation_delay,
            Arc::clone(&self.stop),
        ));
        let scheduler = RoundScheduler::new(
            executor,
            Arc::clone(&self.permits),
            Arc::clone(&self.stop),
            self.config.min_round_duration,
            Arc::clone(&self.stats),
        );

        loop {
            let mut working = self.discover(&node_id).await?;
            self.stats.record_sweep();

            if working.is_empty() {
                let snapshot = self.stats.snapshot();
                info!(
                    %run_id,
                    moved = snapshot.moved,
                    reset = snapshot.reset,
                    vanished = snapshot.vanished,
                    rounds = snapshot.rounds,
                    sweeps = snapshot.sweeps,
                    "nothing left to move, migration complete"
                );
                return Ok(());
            }
            info!(count = working.len(), "counters to move");

            for _ in 0..self.config.rounds_per_sweep {
                let resolved = scheduler.run(&working).await;
                for key in &resolved {
                    working.remove(key);
                }
                if let Some(fatal) = self.stop.take_reason() {
                    error!(%run_id, error = %fatal, "migration aborted");
                    return Err(fatal);
                }
                if working.is_empty() {
                    break;
                }
            }
            // Round budget exhausted or working set drained: rescan either
            // way, picking up whatever appeared in the meantime.
        }
    }

    /// Enumerate the source keyspace and keep the keys with a present
    /// contribution on this node. Introspection runs under the same
    /// admission gate as transfers.
    async fn discover(&self, node_id: &NodeId) -> Result<HashSet<CounterKey>> {
        let all_keys = self.source.keys(&self.config.key_pattern).await?;
        debug!(keys = all_keys.len(), "enumerated source keyspace");

        let (tx, mut rx) = mpsc::unbounded_channel();
        for key in all_keys {
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let source = Arc::clone(&self.source);
            let node_id = node_id.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let contribution =
                    introspect::shard_contribution(source.as_ref(), &key, &node_id).await;
                drop(permit);
                let _ = tx.send((key, contribution));
            });
        }
        drop(tx);

        let mut working = HashSet::new();
        while let Some((key, contribution)) = rx.recv().await {
            match contribution {
                Ok(c) if c.present => {
                    working.insert(key);
                }
                Ok(_) => {}
                Err(err) => {
                    // The next sweep re-reads this key; skipping it here only
                    // delays it.
                    warn!(key = %key, error = %err, "introspection failed during discovery");
                }
            }
        }
        Ok(working)
    }
}
