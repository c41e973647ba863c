//! Pool Store (C3) — process-wide cache of `PoolEdge`s, partitioned by
//! chain id, plus an atomically-written on-disk snapshot.
//!
//! Grounded on `pool::state::PoolStateManager`'s `DashMap`-backed cache for
//! the in-memory half, and `data_collector::shared_state::SharedPoolState`
//! for the on-disk snapshot format: JSON array of edges plus a timestamp,
//! written to a `.tmp` file and renamed into place (spec.md §5: "the
//! persistent pool snapshot is written atomically, write-then-rename").

use crate::types::PoolEdge;
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default staleness window (spec.md §4.3 `POOL_CACHE_DURATION_MINUTES`).
pub const POOL_CACHE_DURATION_MINUTES: u64 = 60;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializableEdge {
    pool_address: String,
    dex_name: String,
    token_in: String,
    token_out: String,
    reserve0: String,
    reserve1: String,
    fee: f64,
    gas_estimate: u64,
}

impl From<&PoolEdge> for SerializableEdge {
    fn from(e: &PoolEdge) -> Self {
        Self {
            pool_address: e.pool_address.to_string(),
            dex_name: e.dex_name.clone(),
            token_in: e.token_in.to_string(),
            token_out: e.token_out.to_string(),
            reserve0: e.reserve0.to_string(),
            reserve1: e.reserve1.to_string(),
            fee: e.fee,
            gas_estimate: e.gas_estimate,
        }
    }
}

impl SerializableEdge {
    fn into_edge(self) -> Result<PoolEdge> {
        Ok(PoolEdge {
            pool_address: self.pool_address.parse().context("bad pool_address")?,
            dex_name: self.dex_name,
            token_in: self.token_in.parse().context("bad token_in")?,
            token_out: self.token_out.parse().context("bad token_out")?,
            reserve0: self.reserve0.parse().context("bad reserve0")?,
            reserve1: self.reserve1.parse().context("bad reserve1")?,
            fee: self.fee,
            gas_estimate: self.gas_estimate,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChainSnapshot {
    chain_id: u64,
    timestamp_ms: u64,
    edges: Vec<SerializableEdge>,
}

struct ChainEntry {
    edges: Vec<PoolEdge>,
    timestamp_ms: u64,
}

/// Per-chain pool edge cache with TTL freshness and an atomic on-disk
/// snapshot. Concurrent scans for the same chain share one in-flight
/// refresh via `refresh_guard` (single-flight, spec.md §4.3).
pub struct PoolStore {
    dir: PathBuf,
    chains: DashMap<u64, ChainEntry>,
    refresh_locks: DashMap<u64, Arc<Mutex<()>>>,
    staleness_ms: u64,
}

impl PoolStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            chains: DashMap::new(),
            refresh_locks: DashMap::new(),
            staleness_ms: POOL_CACHE_DURATION_MINUTES * 60 * 1000,
        }
    }

    pub fn with_staleness_minutes(mut self, minutes: u64) -> Self {
        self.staleness_ms = minutes * 60 * 1000;
        self
    }

    /// An edge set is "fresh" if its wall-clock age is below the staleness
    /// window (spec.md §4.3).
    pub fn is_fresh(&self, chain_id: u64, now_ms: u64) -> bool {
        self.chains
            .get(&chain_id)
            .map(|entry| now_ms.saturating_sub(entry.timestamp_ms) < self.staleness_ms)
            .unwrap_or(false)
    }

    pub fn get_edges(&self, chain_id: u64) -> Vec<PoolEdge> {
        self.chains
            .get(&chain_id)
            .map(|entry| entry.edges.clone())
            .unwrap_or_default()
    }

    /// Cached edges filtered down to the requested token set — both
    /// `token_in` and `token_out` must be in `tokens` (spec.md §4.3,
    /// scenario 6: "edges returned filtered to the requested token set").
    pub fn get_edges_for_tokens(&self, chain_id: u64, tokens: &[Address]) -> Vec<PoolEdge> {
        let set: HashSet<Address> = tokens.iter().copied().collect();
        self.get_edges(chain_id)
            .into_iter()
            .filter(|e| set.contains(&e.token_in) && set.contains(&e.token_out))
            .collect()
    }

    /// Last-writer-wins under the chain's `DashMap` shard — readers see
    /// either the old or new value, never a torn entry (spec.md §5).
    pub fn update(&self, chain_id: u64, edges: Vec<PoolEdge>, timestamp_ms: u64) {
        debug!(chain_id, edge_count = edges.len(), "pool store: updating chain cache");
        self.chains.insert(chain_id, ChainEntry { edges, timestamp_ms });
    }

    pub fn clear(&self) {
        self.chains.clear();
    }

    /// Acquire the per-chain refresh lock. Callers should re-check
    /// `is_fresh` immediately after acquiring — a concurrent refresh may
    /// have completed while this one was waiting.
    pub async fn refresh_guard(&self, chain_id: u64) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .refresh_locks
            .entry(chain_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    fn snapshot_path(&self, chain_id: u64) -> PathBuf {
        self.dir.join(format!("pool_edges_{chain_id}.json"))
    }

    /// Atomic write-then-rename (spec.md §5, §6).
    pub fn save_to_disk(&self, chain_id: u64) -> Result<()> {
        let entry = self
            .chains
            .get(&chain_id)
            .context("no cached edges for chain")?;
        let snapshot = ChainSnapshot {
            chain_id,
            timestamp_ms: entry.timestamp_ms,
            edges: entry.edges.iter().map(SerializableEdge::from).collect(),
        };
        drop(entry);

        std::fs::create_dir_all(&self.dir).context("creating pool store directory")?;
        let final_path = self.snapshot_path(chain_id);
        let tmp_path = final_path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&snapshot).context("serializing snapshot")?;
        std::fs::write(&tmp_path, json).context("writing temp snapshot file")?;
        std::fs::rename(&tmp_path, &final_path).context("renaming temp snapshot into place")?;
        info!(chain_id, edges = snapshot.edges.len(), path = %final_path.display(), "pool store: snapshot saved");
        Ok(())
    }

    pub fn load_from_disk(&self, chain_id: u64) -> Result<()> {
        let path = self.snapshot_path(chain_id);
        if !path.exists() {
            return Ok(());
        }
        let json = std::fs::read_to_string(&path).context("reading snapshot file")?;
        let snapshot: ChainSnapshot = serde_json::from_str(&json).context("parsing snapshot JSON")?;
        let mut edges = Vec::with_capacity(snapshot.edges.len());
        for se in snapshot.edges {
            match se.into_edge() {
                Ok(edge) => edges.push(edge),
                Err(err) => warn!(chain_id, error = %err, "pool store: dropping malformed snapshot edge"),
            }
        }
        self.update(chain_id, edges, snapshot.timestamp_ms);
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(pool: u8, reserve0: u64, reserve1: u64) -> PoolEdge {
        PoolEdge {
            pool_address: Address::from([pool; 20]),
            dex_name: "test-dex".into(),
            token_in: Address::from([1; 20]),
            token_out: Address::from([2; 20]),
            reserve0: U256::from(reserve0),
            reserve1: U256::from(reserve1),
            fee: 0.003,
            gas_estimate: 120_000,
        }
    }

    #[test]
    fn freshness_window() {
        let store = PoolStore::new(std::env::temp_dir()).with_staleness_minutes(60);
        store.update(137, vec![edge(1, 1000, 2000)], 1_000_000);
        assert!(store.is_fresh(137, 1_000_000 + 30 * 60 * 1000));
        assert!(!store.is_fresh(137, 1_000_000 + 90 * 60 * 1000));
        assert!(!store.is_fresh(8453, 1_000_000));
    }

    #[test]
    fn filters_to_requested_tokens() {
        let store = PoolStore::new(std::env::temp_dir());
        store.update(137, vec![edge(1, 1000, 2000)], now_ms());
        let tokens = [Address::from([1; 20]), Address::from([2; 20])];
        assert_eq!(store.get_edges_for_tokens(137, &tokens).len(), 1);
        let unrelated = [Address::from([9; 20])];
        assert_eq!(store.get_edges_for_tokens(137, &unrelated).len(), 0);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("pool-store-test-{}", now_ms()));
        let store = PoolStore::new(&dir);
        store.update(137, vec![edge(3, 5000, 6000)], 42);
        store.save_to_disk(137).unwrap();

        let reloaded = PoolStore::new(&dir);
        reloaded.load_from_disk(137).unwrap();
        let edges = reloaded.get_edges(137);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].reserve0, U256::from(5000u64));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn clear_empties_all_chains() {
        let store = PoolStore::new(std::env::temp_dir());
        store.update(137, vec![edge(1, 1, 1)], now_ms());
        store.update(8453, vec![edge(2, 1, 1)], now_ms());
        store.clear();
        assert!(store.get_edges(137).is_empty());
        assert!(store.get_edges(8453).is_empty());
    }
}
