//! Pool Scanner (C4) — the hardest subcomponent. Produces a complete,
//! current set of `PoolEdge`s for a `(chain, tokens)` pair within a soft
//! latency budget (spec.md §4.4).

use crate::contracts::{IUniswapV2Pair, UniswapV3Factory, UniswapV3Pool};
use crate::error::EngineError;
use crate::multicall::MulticallBatcher;
use crate::pool::store::now_ms;
use crate::pool::{v2, v3};
use crate::registry::DexRegistry;
use crate::types::{CachedPoolEntry, DEXConfig, PoolEdge};
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Bounded fan-out for the sequential fallback path (spec.md §5).
pub const PARALLEL_LIMIT: usize = 10;

/// Scanner's own fine-grained per-pool cache TTL. Distinct from the pool
/// store's coarser chain-level staleness window (C3) — this one exists to
/// short-circuit re-querying the same pool twice within one scan cycle's
/// fan-out (spec.md §4.4 step 5).
const DEFAULT_POOL_CACHE_TTL_MS: u64 = 30_000;

#[derive(Clone, Hash, Eq, PartialEq)]
struct PoolCacheKey {
    dex_name: String,
    token0: Address,
    token1: Address,
    /// V3 fee tier in bps; 0 for V2-style pools (one pool per token pair).
    fee_tier: u32,
}

/// Stateless across scans (spec.md §4.4 state machine) except for its
/// internal fine-grained cache, which is a pure latency optimization, not
/// persistent state — the Pool Store (C3) holds the durable state.
pub struct PoolScanner<P> {
    batcher: MulticallBatcher<P>,
    provider: P,
    cache: DashMap<PoolCacheKey, CachedPoolEntry>,
    ttl_ms: u64,
    parallel_limit: usize,
}

impl<P: Provider + Clone + 'static> PoolScanner<P> {
    pub fn new(provider: P) -> Self {
        let batcher = MulticallBatcher::new(provider.clone());
        Self {
            batcher,
            provider,
            cache: DashMap::new(),
            ttl_ms: DEFAULT_POOL_CACHE_TTL_MS,
            parallel_limit: PARALLEL_LIMIT,
        }
    }

    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn with_parallel_limit(mut self, limit: usize) -> Self {
        self.parallel_limit = limit.max(1);
        self
    }

    /// Discovers pools for every DEX the registry has on `chain_id` against
    /// the supplied token list, and emits the corresponding directed
    /// `PoolEdge`s. Order of results is not observable to callers (spec.md
    /// §4.4 concurrency note).
    pub async fn scan(
        &self,
        registry: &DexRegistry,
        chain_id: u64,
        tokens: &[Address],
    ) -> Result<Vec<PoolEdge>, EngineError> {
        let tokens: Vec<Address> = tokens
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let dexes = registry.by_chain(chain_id);
        let (v3_dexes, v2_dexes): (Vec<&DEXConfig>, Vec<&DEXConfig>) =
            dexes.into_iter().partition(|d| d.is_v3_style());

        let multicall_available = self.batcher.is_available().await;
        if !multicall_available {
            warn!(chain_id, "multicall3 unavailable on this chain, falling back to sequential per-pool RPC calls");
        }

        let mut all_edges = Vec::new();
        for dex in v3_dexes {
            all_edges.extend(self.scan_v3_dex(dex, &tokens, multicall_available).await?);
        }
        for dex in v2_dexes {
            all_edges.extend(self.scan_v2_dex(dex, &tokens, multicall_available).await?);
        }
        Ok(all_edges)
    }

    async fn scan_v3_dex(
        &self,
        dex: &DEXConfig,
        tokens: &[Address],
        multicall_available: bool,
    ) -> Result<Vec<PoolEdge>, EngineError> {
        let now = now_ms();
        let queries = v3::build_queries(tokens);
        let (cached_edges, missing) = self.split_cached(&dex.name, &queries, now);
        if missing.is_empty() {
            return Ok(cached_edges);
        }

        let missing_tokens: Vec<Address> = missing
            .iter()
            .flat_map(|(a, b, _)| [*a, *b])
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let fetched = if multicall_available {
            v3::discover_and_build_edges(
                &self.batcher,
                dex.factory,
                &missing_tokens,
                &dex.name,
                dex.gas_estimate,
                dex.liquidity_threshold,
                dex.v3_liquidity_scale_factor,
            )
            .await?
        } else {
            self.scan_v3_sequential(dex, &missing).await
        };

        self.cache_forward_edges(&dex.name, &fetched, now);

        let mut edges = cached_edges;
        edges.extend(fetched);
        Ok(edges)
    }

    async fn scan_v2_dex(
        &self,
        dex: &DEXConfig,
        tokens: &[Address],
        multicall_available: bool,
    ) -> Result<Vec<PoolEdge>, EngineError> {
        let now = now_ms();
        let init_code_hash = match dex.init_code_hash {
            Some(h) => h,
            None => {
                warn!(dex = %dex.name, "V2-style DEX missing init_code_hash — skipping");
                return Ok(Vec::new());
            }
        };

        let mut pairs = Vec::new();
        for i in 0..tokens.len() {
            for j in (i + 1)..tokens.len() {
                if tokens[i] == tokens[j] {
                    continue;
                }
                pairs.push(v2::sort_tokens(tokens[i], tokens[j]));
            }
        }

        let queries: Vec<(Address, Address, u32)> =
            pairs.iter().map(|(a, b)| (*a, *b, 0)).collect();
        let (cached_edges, missing) = self.split_cached(&dex.name, &queries, now);
        if missing.is_empty() {
            return Ok(cached_edges);
        }

        let pool_addresses: Vec<Address> = missing
            .iter()
            .map(|(a, b, _)| v2::derive_pool_address(dex.factory, *a, *b, init_code_hash))
            .collect();

        let fetched = if multicall_available {
            v2::fetch_reserves_and_build_edges(
                &self.batcher,
                &pool_addresses,
                &dex.name,
                dex.fee_bps as f64 / 10_000.0,
                dex.gas_estimate,
                dex.liquidity_threshold,
            )
            .await?
        } else {
            self.scan_v2_sequential(dex, &pool_addresses).await
        };

        self.cache_forward_edges(&dex.name, &fetched, now);

        let mut edges = cached_edges;
        edges.extend(fetched);
        Ok(edges)
    }

    /// Splits cache-key queries into (already-fresh edges, still-missing
    /// queries). For V3, `fee_tier` disambiguates distinct pools on the
    /// same token pair.
    fn split_cached(
        &self,
        dex_name: &str,
        queries: &[(Address, Address, u32)],
        now: u64,
    ) -> (Vec<PoolEdge>, Vec<(Address, Address, u32)>) {
        let mut cached_edges = Vec::new();
        let mut missing = Vec::new();
        for &(t0, t1, fee) in queries {
            let key = PoolCacheKey {
                dex_name: dex_name.to_string(),
                token0: t0,
                token1: t1,
                fee_tier: fee,
            };
            match self.cache.get(&key) {
                Some(entry) if entry.is_fresh(now, self.ttl_ms) => {
                    cached_edges.push(entry.edge.clone());
                    cached_edges.push(reverse(&entry.edge));
                }
                _ => missing.push((t0, t1, fee)),
            }
        }
        (cached_edges, missing)
    }

    fn cache_forward_edges(&self, dex_name: &str, edges: &[PoolEdge], now: u64) {
        for pair in edges.chunks(2) {
            let fwd = match pair.first() {
                Some(e) => e,
                None => continue,
            };
            let (t0, t1) = v2::sort_tokens(fwd.token_in, fwd.token_out);
            let fee_tier = (fwd.fee * 1_000_000.0).round() as u32;
            let key = PoolCacheKey {
                dex_name: dex_name.to_string(),
                token0: t0,
                token1: t1,
                fee_tier,
            };
            self.cache
                .insert(key, CachedPoolEntry::new(fwd.clone(), now));
        }
    }

    /// Sequential fallback for V2 pools when Multicall3 is unavailable.
    /// Same admissibility semantics as the multicall path; only latency
    /// differs (spec.md §4.4 edge case).
    async fn scan_v2_sequential(&self, dex: &DEXConfig, pool_addresses: &[Address]) -> Vec<PoolEdge> {
        let semaphore = Arc::new(Semaphore::new(self.parallel_limit));
        let fee = dex.fee_bps as f64 / 10_000.0;
        let dex_name = dex.name.clone();
        let threshold = dex.liquidity_threshold;
        let gas_estimate = dex.gas_estimate;

        let results: Vec<Option<PoolEdge>> = stream::iter(pool_addresses.iter().copied())
            .map(|pool| {
                let provider = self.provider.clone();
                let semaphore = Arc::clone(&semaphore);
                let dex_name = dex_name.clone();
                async move {
                    let _permit = semaphore.acquire().await.ok()?;
                    let contract = IUniswapV2Pair::new(pool, provider);
                    let token0 = contract.token0().call().await.ok()?;
                    let token1 = contract.token1().call().await.ok()?;
                    let reserves = contract.getReserves().call().await.ok()?;
                    let reserve0 = U256::from(reserves.reserve0);
                    let reserve1 = U256::from(reserves.reserve1);
                    if reserve0 <= threshold {
                        return None;
                    }
                    Some(PoolEdge {
                        pool_address: pool,
                        dex_name,
                        token_in: token0,
                        token_out: token1,
                        reserve0,
                        reserve1,
                        fee,
                        gas_estimate,
                    })
                }
            })
            .buffer_unordered(self.parallel_limit)
            .collect()
            .await;

        let mut edges = Vec::new();
        for fwd in results.into_iter().flatten() {
            edges.push(reverse(&fwd));
            edges.push(fwd);
        }
        edges
    }

    /// Sequential fallback for V3 pools: one `factory.getPool` plus one
    /// `liquidity()` call per query, bounded by `PARALLEL_LIMIT`.
    async fn scan_v3_sequential(
        &self,
        dex: &DEXConfig,
        queries: &[(Address, Address, u32)],
    ) -> Vec<PoolEdge> {
        let semaphore = Arc::new(Semaphore::new(self.parallel_limit));
        let factory = dex.factory;
        let dex_name = dex.name.clone();
        let threshold = dex.liquidity_threshold;
        let scale_factor = dex.v3_liquidity_scale_factor;
        let gas_estimate = dex.gas_estimate;

        let results: Vec<Option<PoolEdge>> = stream::iter(queries.iter().copied())
            .map(|(t0, t1, fee)| {
                let provider = self.provider.clone();
                let semaphore = Arc::clone(&semaphore);
                let dex_name = dex_name.clone();
                async move {
                    let _permit = semaphore.acquire().await.ok()?;
                    let factory_contract = UniswapV3Factory::new(factory, provider.clone());
                    let pool_addr = factory_contract.getPool(t0, t1, alloy::primitives::aliases::U24::from(fee)).call().await.ok()?;
                    if pool_addr == Address::ZERO {
                        return None;
                    }
                    let pool_contract = UniswapV3Pool::new(pool_addr, provider);
                    let token0 = pool_contract.token0().call().await.ok()?;
                    let token1 = pool_contract.token1().call().await.ok()?;
                    let liquidity = pool_contract.liquidity().call().await.ok()?;
                    let scaled = U256::from((liquidity as f64 * scale_factor).max(0.0) as u128);
                    if scaled <= threshold {
                        return None;
                    }
                    Some(PoolEdge {
                        pool_address: pool_addr,
                        dex_name,
                        token_in: token0,
                        token_out: token1,
                        reserve0: scaled,
                        reserve1: scaled,
                        fee: fee as f64 / 1_000_000.0,
                        gas_estimate,
                    })
                }
            })
            .buffer_unordered(self.parallel_limit)
            .collect()
            .await;

        let mut edges = Vec::new();
        for fwd in results.into_iter().flatten() {
            edges.push(reverse(&fwd));
            edges.push(fwd);
        }
        edges
    }
}

/// `reserve0`/`reserve1` are oriented to `token_in`/`token_out`, so
/// reversing direction also swaps the reserves (matches `pool::v2`'s
/// convention).
fn reverse(edge: &PoolEdge) -> PoolEdge {
    PoolEdge {
        pool_address: edge.pool_address,
        dex_name: edge.dex_name.clone(),
        token_in: edge.token_out,
        token_out: edge.token_in,
        reserve0: edge.reserve1,
        reserve1: edge.reserve0,
        fee: edge.fee,
        gas_estimate: edge.gas_estimate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_swaps_only_direction() {
        let edge = PoolEdge {
            pool_address: Address::from([1; 20]),
            dex_name: "test".into(),
            token_in: Address::from([2; 20]),
            token_out: Address::from([3; 20]),
            reserve0: U256::from(1000u64),
            reserve1: U256::from(2000u64),
            fee: 0.003,
            gas_estimate: 100_000,
        };
        let rev = reverse(&edge);
        assert_eq!(rev.pool_address, edge.pool_address);
        assert_eq!(rev.reserve0, edge.reserve1);
        assert_eq!(rev.reserve1, edge.reserve0);
        assert_eq!(rev.fee, edge.fee);
        assert_eq!(rev.token_in, edge.token_out);
        assert_eq!(rev.token_out, edge.token_in);
    }

    #[test]
    fn parallel_limit_default_matches_spec() {
        assert_eq!(PARALLEL_LIMIT, 10);
    }
}
