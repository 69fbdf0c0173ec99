//! Testing utilities for the migration core.
//!
//! [`MockStore`] is a scripted, in-memory [`CounterStore`] with failure
//! injection, a shared call journal for cross-store ordering assertions, and
//! an in-flight gauge for verifying the concurrency bound.

mod migration_tests;

use crate::error::StoreError;
use crate::store::CounterStore;
use crate::types::{CounterKey, NodeId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One recorded store operation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    /// Which store instance handled the call.
    pub store: &'static str,
    pub op: StoreOp,
}

/// The operation itself.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Members,
    Keys { pattern: String },
    Shards { key: CounterKey },
    Reset { key: CounterKey, node: NodeId },
    Increment { key: CounterKey, delta: f64 },
}

impl StoreOp {
    /// Whether the operation mutates cluster state.
    pub fn is_write(&self) -> bool {
        matches!(self, StoreOp::Reset { .. } | StoreOp::Increment { .. })
    }
}

/// Shared call journal. Give the same journal to two stores to assert
/// ordering across them.
pub type Journal = Arc<Mutex<Vec<StoreCall>>>;

/// Create an empty shared journal.
pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

#[derive(Debug, Default)]
struct InFlightGauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

struct InFlightGuard {
    gauge: Arc<InFlightGauge>,
}

impl InFlightGuard {
    fn enter(gauge: &Arc<InFlightGauge>) -> Self {
        let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.max.fetch_max(now, Ordering::SeqCst);
        Self {
            gauge: Arc::clone(gauge),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted in-memory counter store.
///
/// Shard values are kept as raw text so tests can script malformed values;
/// increments parse and rewrite them the way a live store would.
#[derive(Debug)]
pub struct MockStore {
    name: &'static str,
    journal: Journal,
    members: Mutex<String>,
    /// key -> ordered (node, value text) pairs.
    shards: Mutex<BTreeMap<CounterKey, Vec<(NodeId, String)>>>,
    /// Plain totals, tracking the net effect of increments.
    totals: Mutex<BTreeMap<CounterKey, f64>>,
    /// When set, increments also land on this node's shard entry.
    local_node: Mutex<Option<NodeId>>,
    fail_increments: AtomicBool,
    fail_negative_increments: AtomicBool,
    fail_resets: AtomicBool,
    fail_introspection: AtomicBool,
    op_delay: Mutex<Duration>,
    gauge: Arc<InFlightGauge>,
}

impl MockStore {
    /// Create a store with its own private journal.
    pub fn new(name: &'static str) -> Self {
        Self::with_journal(name, journal())
    }

    /// Create a store recording into a shared journal.
    pub fn with_journal(name: &'static str, journal: Journal) -> Self {
        Self {
            name,
            journal,
            members: Mutex::new(String::new()),
            shards: Mutex::new(BTreeMap::new()),
            totals: Mutex::new(BTreeMap::new()),
            local_node: Mutex::new(None),
            fail_increments: AtomicBool::new(false),
            fail_negative_increments: AtomicBool::new(false),
            fail_resets: AtomicBool::new(false),
            fail_introspection: AtomicBool::new(false),
            op_delay: Mutex::new(Duration::ZERO),
            gauge: Arc::new(InFlightGauge::default()),
        }
    }

    /// Script the membership listing text.
    pub fn set_members(&self, listing: impl Into<String>) {
        *self.members.lock() = listing.into();
    }

    /// Script one node's shard of a key with raw value text.
    pub fn set_raw_shard(&self, key: &str, node: &str, raw: &str) {
        let mut shards = self.shards.lock();
        let entries = shards.entry(key.to_string()).or_default();
        match entries.iter_mut().find(|(n, _)| n == node) {
            Some((_, value)) => *value = raw.to_string(),
            None => entries.push((node.to_string(), raw.to_string())),
        }
    }

    /// Route increments on this store into the given node's shard, the way
    /// a live node applies writes to its local shard.
    pub fn set_local_node(&self, node: &str) {
        *self.local_node.lock() = Some(node.to_string());
    }

    /// Fail every increment.
    pub fn fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }

    /// Fail only negative increments, which is how a rollback is told apart
    /// from the initial transfer increment.
    pub fn fail_negative_increments(&self, fail: bool) {
        self.fail_negative_increments.store(fail, Ordering::SeqCst);
    }

    /// Fail every shard reset.
    pub fn fail_resets(&self, fail: bool) {
        self.fail_resets.store(fail, Ordering::SeqCst);
    }

    /// Fail every shard breakdown read.
    pub fn fail_introspection(&self, fail: bool) {
        self.fail_introspection.store(fail, Ordering::SeqCst);
    }

    /// Delay every operation, to force overlap in concurrency tests.
    pub fn set_op_delay(&self, delay: Duration) {
        *self.op_delay.lock() = delay;
    }

    /// Calls handled by this store, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.journal
            .lock()
            .iter()
            .filter(|call| call.store == self.name)
            .cloned()
            .collect()
    }

    /// Net total of a key from increments.
    pub fn total(&self, key: &str) -> f64 {
        self.totals.lock().get(key).copied().unwrap_or(0.0)
    }

    /// Current shard value of a key for a node, parsed.
    pub fn shard_value(&self, key: &str, node: &str) -> Option<f64> {
        self.shards
            .lock()
            .get(key)?
            .iter()
            .find(|(n, _)| n == node)
            .and_then(|(_, raw)| raw.parse().ok())
    }

    /// Highest number of operations observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.gauge.max.load(Ordering::SeqCst)
    }

    fn record(&self, op: StoreOp) {
        self.journal.lock().push(StoreCall {
            store: self.name,
            op,
        });
    }

    async fn begin_op(&self, op: StoreOp) -> InFlightGuard {
        self.record(op);
        let guard = InFlightGuard::enter(&self.gauge);
        let delay = *self.op_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        guard
    }

    fn injected_failure(what: &'static str) -> StoreError {
        StoreError::Transport(redis::RedisError::from((
            redis::ErrorKind::IoError,
            what,
        )))
    }
}

#[async_trait]
impl CounterStore for MockStore {
    async fn cluster_members(&self) -> Result<String, StoreError> {
        let _guard = self.begin_op(StoreOp::Members).await;
        Ok(self.members.lock().clone())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<CounterKey>, StoreError> {
        let _guard = self
            .begin_op(StoreOp::Keys {
                pattern: pattern.to_string(),
            })
            .await;
        Ok(self.shards.lock().keys().cloned().collect())
    }

    async fn counter_shards(&self, key: &str) -> Result<Vec<(NodeId, String)>, StoreError> {
        let _guard = self
            .begin_op(StoreOp::Shards {
                key: key.to_string(),
            })
            .await;
        if self.fail_introspection.load(Ordering::SeqCst) {
            return Err(Self::injected_failure("introspection failure"));
        }
        Ok(self.shards.lock().get(key).cloned().unwrap_or_default())
    }

    async fn reset_shard(&self, key: &str, node: &str) -> Result<(), StoreError> {
        let _guard = self
            .begin_op(StoreOp::Reset {
                key: key.to_string(),
                node: node.to_string(),
            })
            .await;
        if self.fail_resets.load(Ordering::SeqCst) {
            return Err(Self::injected_failure("reset failure"));
        }
        let mut shards = self.shards.lock();
        if let Some(entries) = shards.get_mut(key) {
            entries.retain(|(n, _)| n != node);
            if entries.is_empty() {
                shards.remove(key);
            }
        }
        Ok(())
    }

    async fn increment_by_float(&self, key: &str, delta: f64) -> Result<(), StoreError> {
        let _guard = self
            .begin_op(StoreOp::Increment {
                key: key.to_string(),
                delta,
            })
            .await;
        if self.fail_increments.load(Ordering::SeqCst)
            || (delta < 0.0 && self.fail_negative_increments.load(Ordering::SeqCst))
        {
            return Err(Self::injected_failure("increment failure"));
        }

        *self.totals.lock().entry(key.to_string()).or_insert(0.0) += delta;

        let local_node = self.local_node.lock().clone();
        if let Some(node) = local_node {
            let mut shards = self.shards.lock();
            let entries = shards.entry(key.to_string()).or_default();
            match entries.iter_mut().find(|(n, _)| *n == node) {
                Some((_, raw)) => {
                    let current: f64 = raw.parse().unwrap_or(0.0);
                    *raw = format!("{}", current + delta);
                }
                None => entries.push((node, format!("{delta}"))),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shared_journal_preserves_cross_store_order() {
        let log = journal();
        let a = MockStore::with_journal("a", Arc::clone(&log));
        let b = MockStore::with_journal("b", Arc::clone(&log));

        a.increment_by_float("k", 1.0).await.unwrap();
        b.increment_by_float("k", 2.0).await.unwrap();

        let calls = log.lock().clone();
        assert_eq!(calls[0].store, "a");
        assert_eq!(calls[1].store, "b");
        assert_eq!(a.calls().len(), 1);
        assert_eq!(b.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_increments_apply_to_local_shard() {
        let store = MockStore::new("source");
        store.set_local_node("node-a");
        store.set_raw_shard("k", "node-a", "2.5");

        store.increment_by_float("k", -2.5).await.unwrap();

        assert_eq!(store.shard_value("k", "node-a"), Some(0.0));
        assert_eq!(store.total("k"), -2.5);
    }

    #[tokio::test]
    async fn test_reset_removes_only_that_node() {
        let store = MockStore::new("source");
        store.set_raw_shard("k", "node-a", "1.0");
        store.set_raw_shard("k", "node-b", "2.0");

        store.reset_shard("k", "node-a").await.unwrap();

        assert_eq!(store.shard_value("k", "node-a"), None);
        assert_eq!(store.shard_value("k", "node-b"), Some(2.0));
    }

    #[tokio::test]
    async fn test_in_flight_gauge_tracks_overlap() {
        let store = Arc::new(MockStore::new("s"));
        store.set_op_delay(Duration::from_millis(20));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.counter_shards("k").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(store.max_in_flight() > 1);
    }
}
