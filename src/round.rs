//! One bounded-concurrency pass over the working set.

use crate::signal::StopSignal;
use crate::stats::MigrationStats;
use crate::transfer::TransferExecutor;
use crate::types::{CounterKey, KeyResolution};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

/// Drives one pass of transfer attempts over the current working set.
///
/// Admission is gated by a counting semaphore shared with discovery, so the
/// whole run never has more operations in flight than the configured bound.
/// Workers report their key's resolution over a channel; this scheduler is
/// the only place round bookkeeping happens, so no worker ever touches a
/// shared collection.
#[derive(Debug)]
pub struct RoundScheduler {
    executor: Arc<TransferExecutor>,
    permits: Arc<Semaphore>,
    stop: Arc<StopSignal>,
    min_duration: Duration,
    stats: Arc<MigrationStats>,
}

impl RoundScheduler {
    pub fn new(
        executor: Arc<TransferExecutor>,
        permits: Arc<Semaphore>,
        stop: Arc<StopSignal>,
        min_duration: Duration,
        stats: Arc<MigrationStats>,
    ) -> Self {
        Self {
            executor,
            permits,
            stop,
            min_duration,
            stats,
        }
    }

    /// Run one pass and return the keys resolved during it.
    ///
    /// A tripped stop signal halts further admissions; work already admitted
    /// runs to completion. The pass never takes less wall-clock time than
    /// the configured minimum, to bound load on the source.
    pub async fn run(&self, working: &HashSet<CounterKey>) -> Vec<CounterKey> {
        let started = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut admitted = 0usize;

        for key in working {
            if self.stop.is_tripped() {
                debug!("stop signal raised, not admitting further keys this round");
                break;
            }
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let executor = Arc::clone(&self.executor);
            let tx = tx.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let resolution = executor.resolve(&key).await;
                drop(permit);
                let _ = tx.send((key, resolution));
            });
            admitted += 1;
        }
        drop(tx);

        let mut resolved = Vec::new();
        while let Some((key, resolution)) = rx.recv().await {
            debug!(key = %key, %resolution, "round result");
            match resolution {
                KeyResolution::Moved => self.stats.record_moved(),
                KeyResolution::Reset => self.stats.record_reset(),
                KeyResolution::Vanished => self.stats.record_vanished(),
                KeyResolution::Pending => continue,
            }
            resolved.push(key);
        }

        self.stats.record_round();
        let elapsed = started.elapsed();
        debug!(
            admitted,
            resolved = resolved.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "round finished"
        );

        if !self.stop.is_tripped() && elapsed < self.min_duration {
            tokio::time::sleep(self.min_duration - elapsed).await;
        }
        resolved
    }
}
