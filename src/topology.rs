//! Resolution of the source node's identity within its cluster.

use crate::error::{Result, TopologyError};
use crate::store::CounterStore;
use crate::types::NodeId;
use tracing::debug;

const ID_COLUMN: usize = 0;
const FLAGS_COLUMN: usize = 2;
const SELF_FLAG: &str = "myself";

/// Fetch the cluster membership listing and return the identifier of the
/// member flagged as the local node. Resolved once per run; there is no
/// meaningful migration without knowing which shard is ours.
pub async fn resolve_self_id(store: &dyn CounterStore) -> Result<NodeId> {
    let listing = store
        .cluster_members()
        .await
        .map_err(TopologyError::Listing)?;
    match self_id_from_listing(&listing) {
        Some(id) => {
            debug!(node_id = %id, "resolved local member in cluster listing");
            Ok(id)
        }
        None => Err(TopologyError::SelfNotFound.into()),
    }
}

/// Find the line whose flags column marks the local member and return its
/// identifier column. The flags column is a comma-separated list.
fn self_id_from_listing(listing: &str) -> Option<NodeId> {
    listing.lines().find_map(|line| {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let flags = columns.get(FLAGS_COLUMN)?;
        if flags.split(',').any(|flag| flag == SELF_FLAG) {
            columns.get(ID_COLUMN).map(|id| (*id).to_string())
        } else {
            None
        }
    })
}
