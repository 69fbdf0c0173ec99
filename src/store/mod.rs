//! The cluster-client seam the migration core drives.
//!
//! The core never speaks a wire protocol itself; everything it needs from a
//! counter store goes through [`CounterStore`]. The production implementation
//! is [`RedisCounterStore`]; tests script a
//! [`MockStore`](crate::testing::MockStore) instead.

mod redis;

pub use self::redis::RedisCounterStore;

use crate::error::StoreError;
use crate::types::{CounterKey, NodeId};
use async_trait::async_trait;

/// Commands the migration needs from one cluster endpoint.
///
/// Implementations must tolerate as many concurrent outstanding requests as
/// the configured concurrency bound.
#[async_trait]
pub trait CounterStore: Send + Sync + std::fmt::Debug {
    /// Raw cluster membership listing, one line per member with
    /// whitespace-delimited columns.
    async fn cluster_members(&self) -> Result<String, StoreError>;

    /// Enumerate keys matching the pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<CounterKey>, StoreError>;

    /// Per-node shard breakdown of one counter: ordered
    /// (node id, value text) pairs.
    async fn counter_shards(&self, key: &str) -> Result<Vec<(NodeId, String)>, StoreError>;

    /// Clear one node's shard of a counter, leaving other nodes' shards
    /// untouched.
    async fn reset_shard(&self, key: &str, node: &str) -> Result<(), StoreError>;

    /// Atomically add a (possibly negative) delta to a counter.
    async fn increment_by_float(&self, key: &str, delta: f64) -> Result<(), StoreError>;
}
