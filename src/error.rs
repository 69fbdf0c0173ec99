//! Error types for the counter migration.

use crate::types::{CounterKey, NodeId};
use thiserror::Error;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the migration.
#[derive(Error, Debug)]
pub enum Error {
    /// Source node identity could not be resolved.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Transport, protocol or parse failure from the cluster client.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A write failed mid-transfer.
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// A rollback after a failed transfer also failed.
    #[error("compensation error: {0}")]
    Compensation(#[from] CompensationError),

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error must abort the whole run.
    ///
    /// Read-side failures are retried by the next round's fresh introspection;
    /// interrupted writes are never retried automatically and require an
    /// operator to look at the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Topology(_) | Error::Transfer(_) | Error::Compensation(_)
        )
    }
}

/// Failures while resolving this node's identity in the cluster.
#[derive(Error, Debug)]
pub enum TopologyError {
    /// The membership listing could not be fetched.
    #[error("membership listing failed: {0}")]
    Listing(#[from] StoreError),

    /// No member line is flagged as the local node.
    #[error("no member is flagged as myself in the cluster listing")]
    SelfNotFound,
}

/// Transport and protocol failures from the cluster client.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying client or network failure.
    #[error("transport error: {0}")]
    Transport(#[from] redis::RedisError),

    /// The reply did not have the expected shape.
    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: String,
    },

    /// A shard value could not be parsed as a float.
    #[error("bad shard value for {key}: {raw:?}")]
    FloatParse { key: CounterKey, raw: String },
}

/// A write operation failed during a transfer. Always run-fatal.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The increment on the target cluster failed. Nothing left the source,
    /// so no compensation is needed.
    #[error("failed to increment {key} by {delta} on target: {source}")]
    TargetIncrement {
        key: CounterKey,
        delta: f64,
        source: StoreError,
    },

    /// The decrement on the source failed after the target was incremented.
    /// The target increment was rolled back.
    #[error("failed to increment {key} by {delta} on source: {source}")]
    SourceDecrement {
        key: CounterKey,
        delta: f64,
        source: StoreError,
    },

    /// Clearing a residual shard on the source failed.
    #[error("failed to reset shard of {key} on node {node}: {source}")]
    ShardReset {
        key: CounterKey,
        node: NodeId,
        source: StoreError,
    },
}

/// The rollback decrement on the target failed after the source decrement
/// already failed. The value now exists on both clusters and must be
/// reconciled by an operator.
#[derive(Error, Debug)]
#[error(
    "failed to undo increment of {key} by {delta} on target, \
     value is duplicated on source and target, reconcile manually \
     (decrement: {decrement}; rollback: {rollback})"
)]
pub struct CompensationError {
    pub key: CounterKey,
    pub delta: f64,
    /// The source decrement failure that triggered the rollback.
    pub decrement: StoreError,
    /// The rollback failure itself.
    #[source]
    pub rollback: StoreError,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_error() -> StoreError {
        StoreError::UnexpectedReply {
            expected: "array",
            got: "nil".to_string(),
        }
    }

    #[test]
    fn test_fatality_classification() {
        assert!(Error::from(TopologyError::SelfNotFound).is_fatal());
        assert!(Error::from(TransferError::TargetIncrement {
            key: "hits".to_string(),
            delta: 1.5,
            source: transport_error(),
        })
        .is_fatal());
        assert!(!Error::from(transport_error()).is_fatal());
    }

    #[test]
    fn test_compensation_error_mentions_manual_reconciliation() {
        let err = CompensationError {
            key: "hits".to_string(),
            delta: 2.5,
            decrement: transport_error(),
            rollback: transport_error(),
        };
        assert!(err.to_string().contains("reconcile manually"));
        assert!(Error::from(err).is_fatal());
    }

    #[test]
    fn test_float_parse_display() {
        let err = StoreError::FloatParse {
            key: "hits".to_string(),
            raw: "not-a-number".to_string(),
        };
        assert!(err.to_string().contains("hits"));
        assert!(err.to_string().contains("not-a-number"));
    }
}
