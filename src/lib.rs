//! Live migration of distributed counter shards between clusters.
//!
//! This crate drains one node's shard contributions of every counter in an
//! eventually-consistent counter store and replays them onto another cluster
//! endpoint, while the source keeps serving writes. No value is ever lost:
//! a counter is incremented on the target and given time to converge there
//! before its source copy is destroyed, at the price of a transient window
//! in which the value is counted on both clusters.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            MigrationOrchestrator            │
//! │  resolve identity → discover → rounds → …   │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │               RoundScheduler                │
//! │  semaphore-gated workers, result channel    │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │              TransferExecutor               │
//! │  introspect → increment target → wait →     │
//! │  decrement source (or reset residue)        │
//! └─────────────────────────────────────────────┘
//!            │                      │
//!            ▼                      ▼
//!     ┌────────────┐        ┌────────────┐
//!     │   source   │        │   target   │
//!     │CounterStore│        │CounterStore│
//!     └────────────┘        └────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use countermove::{MigrationConfig, MigrationOrchestrator, RedisCounterStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> countermove::Result<()> {
//!     let source = Arc::new(RedisCounterStore::connect("127.0.0.1:7711").await?);
//!     let target = Arc::new(RedisCounterStore::connect("127.0.0.1:7712").await?);
//!
//!     let config = MigrationConfig::new().with_concurrency(32);
//!     let orchestrator = MigrationOrchestrator::new(source, target, config);
//!
//!     // Runs until a fresh discovery finds nothing left to move, or a
//!     // transfer fails unrecoverably.
//!     orchestrator.run().await
//! }
//! ```
//!
//! # Failure model
//!
//! Read failures are transient: the affected key is simply re-read on the
//! next round. Write failures are not retried. A failed target increment
//! aborts the run with nothing moved for that key; a failed source decrement
//! triggers one compensating decrement on the target, and if that rollback
//! also fails the run aborts flagging the key for manual reconciliation.

pub mod config;
pub mod error;
pub mod introspect;
pub mod orchestrator;
pub mod round;
pub mod signal;
pub mod stats;
pub mod store;
pub mod testing;
pub mod topology;
pub mod transfer;
pub mod types;

// Re-export main types for convenience
pub use config::MigrationConfig;
pub use error::{CompensationError, Error, Result, StoreError, TopologyError, TransferError};
pub use orchestrator::MigrationOrchestrator;
pub use round::RoundScheduler;
pub use signal::StopSignal;
pub use stats::{MigrationStats, StatsSnapshot};
pub use store::{CounterStore, RedisCounterStore};
pub use transfer::TransferExecutor;
pub use types::{CounterKey, KeyResolution, NodeId, ShardContribution, RESIDUE_EPSILON};

// Re-export testing types
pub use testing::{Journal, MockStore, StoreCall, StoreOp};
