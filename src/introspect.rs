//! Per-key introspection of per-node shard contributions.

use crate::error::StoreError;
use crate::store::CounterStore;
use crate::types::ShardContribution;

/// Read one node's contribution to one counter.
///
/// Scans the ordered shard breakdown for the given node and parses its value
/// text. A key with no shard recorded for the node yields an absent
/// contribution; that is not an error. Read-only, and never cached: callers
/// re-read on every round because the source is live and mutating.
pub async fn shard_contribution(
    store: &dyn CounterStore,
    key: &str,
    node: &str,
) -> Result<ShardContribution, StoreError> {
    let shards = store.counter_shards(key).await?;
    for (shard_node, raw) in shards {
        if shard_node == node {
            let value = raw.parse::<f64>().map_err(|_| StoreError::FloatParse {
                key: key.to_string(),
                raw: raw.clone(),
            })?;
            return Ok(ShardContribution::present(value));
        }
    }
    Ok(ShardContribution::absent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStore;

    #[tokio::test]
    async fn test_reads_matching_shard() {
        let store = MockStore::new("source");
        store.set_raw_shard("hits", "node-a", "2.5");
        store.set_raw_shard("hits", "node-b", "7.25");

        let contribution = shard_contribution(&store, "hits", "node-b").await.unwrap();
        assert_eq!(contribution, ShardContribution::present(7.25));
    }

    #[tokio::test]
    async fn test_absent_when_node_has_no_shard() {
        let store = MockStore::new("source");
        store.set_raw_shard("hits", "node-a", "2.5");

        let contribution = shard_contribution(&store, "hits", "node-z").await.unwrap();
        assert!(!contribution.present);
        assert_eq!(contribution.value, 0.0);
    }

    #[tokio::test]
    async fn test_absent_for_unknown_key() {
        let store = MockStore::new("source");
        let contribution = shard_contribution(&store, "missing", "node-a")
            .await
            .unwrap();
        assert!(!contribution.present);
    }

    #[tokio::test]
    async fn test_malformed_value_is_a_parse_error() {
        let store = MockStore::new("source");
        store.set_raw_shard("hits", "node-a", "garbage");

        let err = shard_contribution(&store, "hits", "node-a")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::FloatParse { .. }));
    }

    #[tokio::test]
    async fn test_negative_values_parse() {
        let store = MockStore::new("source");
        store.set_raw_shard("hits", "node-a", "-0.125");

        let contribution = shard_contribution(&store, "hits", "node-a").await.unwrap();
        assert_eq!(contribution, ShardContribution::present(-0.125));
    }
}
