//! Two-phase relocation of a single counter's shard contribution.

use crate::error::{CompensationError, Error, TransferError};
use crate::introspect;
use crate::signal::StopSignal;
use crate::store::CounterStore;
use crate::types::{KeyResolution, NodeId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Resolves one counter key at a time to a terminal state.
///
/// Every invocation starts from a fresh introspection read; nothing is cached
/// between rounds. Write failures are never retried here: they trip the stop
/// signal and leave the rest to an operator.
#[derive(Debug)]
pub struct TransferExecutor {
    source: Arc<dyn CounterStore>,
    target: Arc<dyn CounterStore>,
    node_id: NodeId,
    propagation_delay: Duration,
    stop: Arc<StopSignal>,
}

impl TransferExecutor {
    pub fn new(
        source: Arc<dyn CounterStore>,
        target: Arc<dyn CounterStore>,
        node_id: NodeId,
        propagation_delay: Duration,
        stop: Arc<StopSignal>,
    ) -> Self {
        Self {
            source,
            target,
            node_id,
            propagation_delay,
            stop,
        }
    }

    /// Resolve one key for this round.
    ///
    /// Introspection failures are transient: the key stays pending and the
    /// next round re-reads it. Write failures trip the stop signal.
    pub async fn resolve(&self, key: &str) -> KeyResolution {
        let contribution =
            match introspect::shard_contribution(self.source.as_ref(), key, &self.node_id).await {
                Ok(contribution) => contribution,
                Err(err) => {
                    warn!(key, error = %err, "introspection failed, key stays pending");
                    return KeyResolution::Pending;
                }
            };

        if !contribution.present {
            debug!(key, "no contribution left on this node");
            return KeyResolution::Vanished;
        }

        if contribution.is_residual() {
            self.reset_residue(key, contribution.value).await
        } else {
            self.relocate(key, contribution.value).await
        }
    }

    /// Clear a near-zero shard without touching other nodes' shards.
    async fn reset_residue(&self, key: &str, value: f64) -> KeyResolution {
        debug!(key, value, "clearing residual contribution");
        if let Err(err) = self.source.reset_shard(key, &self.node_id).await {
            let err = TransferError::ShardReset {
                key: key.to_string(),
                node: self.node_id.clone(),
                source: err,
            };
            error!(key, error = %err, "residue could not be cleared safely, aborting run");
            self.stop.trip(err.into());
            return KeyResolution::Pending;
        }
        KeyResolution::Reset
    }

    /// Move the value: increment the target, wait for it to converge there,
    /// then destroy the source copy. The increment always happens before the
    /// decrement, so a crash or failure in between duplicates the value for
    /// a while instead of losing it.
    async fn relocate(&self, key: &str, value: f64) -> KeyResolution {
        debug!(key, value, "moving contribution to target");

        if let Err(err) = self.target.increment_by_float(key, value).await {
            let err = TransferError::TargetIncrement {
                key: key.to_string(),
                delta: value,
                source: err,
            };
            error!(key, error = %err, "aborting run");
            self.stop.trip(err.into());
            return KeyResolution::Pending;
        }

        // The value now exists on both clusters. The target is eventually
        // consistent itself, so give the increment time to reach its
        // replicas before the source copy is destroyed.
        tokio::time::sleep(self.propagation_delay).await;

        match self.source.increment_by_float(key, -value).await {
            Ok(()) => KeyResolution::Moved,
            Err(decrement_err) => {
                warn!(key, error = %decrement_err, "source decrement failed, rolling back target");
                let fatal: Error = match self.target.increment_by_float(key, -value).await {
                    Ok(()) => TransferError::SourceDecrement {
                        key: key.to_string(),
                        delta: -value,
                        source: decrement_err,
                    }
                    .into(),
                    Err(rollback_err) => CompensationError {
                        key: key.to_string(),
                        delta: value,
                        decrement: decrement_err,
                        rollback: rollback_err,
                    }
                    .into(),
                };
                error!(key, error = %fatal, "aborting run");
                self.stop.trip(fatal);
                KeyResolution::Pending
            }
        }
    }
}
