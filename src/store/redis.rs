//! Redis-protocol implementation of the counter store.
//!
//! The counter store speaks RESP, so every operation maps onto one command:
//! `CLUSTER NODES`, `KEYS`, `DEBUG COUNTER`, `DEBUG RESETSHARD` and
//! `INCRBYFLOAT`. All requests go through a multiplexed connection manager,
//! which carries concurrent in-flight commands without a dedicated pool.

use crate::error::StoreError;
use crate::store::CounterStore;
use crate::types::{CounterKey, NodeId};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, Value};
use std::fmt;
use tracing::debug;

/// How often a failed command is retried by the connection manager before
/// the error surfaces to the caller.
const COMMAND_RETRIES: usize = 2;

/// A counter-store endpoint reached over the Redis protocol.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    addr: String,
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connect to the endpoint. Plain `host:port` strings are accepted and
    /// get the `redis://` scheme prepended.
    pub async fn connect(addr: &str) -> Result<Self, StoreError> {
        let url = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("redis://{addr}")
        };
        let client = Client::open(url.as_str())?;
        let config = ConnectionManagerConfig::new().set_number_of_retries(COMMAND_RETRIES);
        let conn = ConnectionManager::new_with_config(client, config).await?;
        debug!(addr, "connected");
        Ok(Self {
            conn,
            addr: addr.to_string(),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn cluster_members(&self) -> Result<String, StoreError> {
        let mut conn = self.conn.clone();
        let listing: String = redis::cmd("CLUSTER")
            .arg("NODES")
            .query_async(&mut conn)
            .await?;
        Ok(listing)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<CounterKey>, StoreError> {
        let mut conn = self.conn.clone();
        let keys: Vec<CounterKey> = redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut conn)
            .await?;
        Ok(keys)
    }

    async fn counter_shards(&self, key: &str) -> Result<Vec<(NodeId, String)>, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Value = redis::cmd("DEBUG")
            .arg("COUNTER")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        shard_pairs(&reply)
    }

    async fn reset_shard(&self, key: &str, node: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: Value = redis::cmd("DEBUG")
            .arg("RESETSHARD")
            .arg(key)
            .arg(node)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn increment_by_float(&self, key: &str, delta: f64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let total: f64 = redis::cmd("INCRBYFLOAT")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        debug!(addr = %self.addr, key, delta, total, "incremented");
        Ok(())
    }
}

/// Decode the nested `DEBUG COUNTER` reply into (node id, value text) pairs.
///
/// The reply is an array whose first element is the array of shards; each
/// shard is a two-element array of node id and value text.
fn shard_pairs(reply: &Value) -> Result<Vec<(NodeId, String)>, StoreError> {
    let sections = as_array(reply, "counter debug reply")?;
    let shards = match sections.first() {
        Some(section) => as_array(section, "shard list")?,
        None => return Ok(Vec::new()),
    };

    shards
        .iter()
        .map(|entry| {
            let pair = as_array(entry, "shard entry")?;
            match (pair.first().and_then(text), pair.get(1).and_then(text)) {
                (Some(node), Some(value)) => Ok((node, value)),
                _ => Err(unexpected("node id and value text", entry)),
            }
        })
        .collect()
}

fn as_array<'a>(value: &'a Value, expected: &'static str) -> Result<&'a Vec<Value>, StoreError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(unexpected(expected, other)),
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

fn unexpected(expected: &'static str, got: &Value) -> StoreError {
    StoreError::UnexpectedReply {
        expected,
        got: format!("{got:?}"),
    }
}
