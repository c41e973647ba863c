//! V3-style pool discovery via `factory.getPool` and liquidity-proxy
//! reserve reading (spec.md §4.4 step 2).

use crate::error::EngineError;
use crate::multicall::{batch_fetch_pool_data, batch_get_pools, MulticallBatcher};
use crate::pool::v2::sort_tokens;
use crate::types::PoolEdge;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;

/// The four fee tiers a standard Uniswap-V3-style factory quotes pools at.
pub const UNISWAP_V3_FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];

/// Builds the canonical `(tokenA, tokenB, fee)` query set for every
/// unordered token pair × fee tier, with tokens pre-sorted lexicographically
/// so the factory query is canonical (spec.md §4.4 step 2).
pub fn build_queries(tokens: &[Address]) -> Vec<(Address, Address, u32)> {
    let mut queries = Vec::new();
    for i in 0..tokens.len() {
        for j in (i + 1)..tokens.len() {
            if tokens[i] == tokens[j] {
                continue; // identical-address tokens never form a self-edge
            }
            let (a, b) = sort_tokens(tokens[i], tokens[j]);
            for fee in UNISWAP_V3_FEE_TIERS {
                queries.push((a, b, fee));
            }
        }
    }
    queries
}

/// Discovers candidate pool addresses for every query, verifies existence
/// with a batched `token0()` probe, fetches liquidity, and emits the two
/// directed `PoolEdge`s per pool that clears the (scaled) liquidity
/// threshold.
///
/// Each fee tier for the same token pair is a distinct pool and becomes a
/// distinct edge pair (spec.md §4.4 edge case).
pub async fn discover_and_build_edges<P: Provider + Clone>(
    batcher: &MulticallBatcher<P>,
    factory: Address,
    tokens: &[Address],
    dex_name: &str,
    gas_estimate: u64,
    liquidity_threshold: U256,
    v3_liquidity_scale_factor: f64,
) -> Result<Vec<PoolEdge>, EngineError> {
    let queries = build_queries(tokens);
    if queries.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = batch_get_pools(batcher, factory, &queries).await?;
    let mut pool_addresses = Vec::new();
    let mut fee_by_pool = std::collections::HashMap::new();
    for (maybe_pool, (_, _, fee)) in candidates.into_iter().zip(queries.iter()) {
        if let Some(pool) = maybe_pool {
            fee_by_pool.insert(pool, *fee);
            pool_addresses.push(pool);
        }
    }
    if pool_addresses.is_empty() {
        return Ok(Vec::new());
    }

    // token0()/token1() success doubles as the existence probe: a pool
    // address with no deployed code never returns a valid sub-call.
    let raw = batch_fetch_pool_data(batcher, &pool_addresses, true).await?;

    let mut edges = Vec::with_capacity(raw.len() * 2);
    for pool in raw {
        let fee_tier = match fee_by_pool.get(&pool.pool) {
            Some(f) => *f,
            None => continue,
        };
        let scaled_liquidity = scale_liquidity(pool.reserve0, v3_liquidity_scale_factor);
        // Invariant 1/3: scaled liquidity must strictly exceed the
        // V2-denominated threshold before the pool is admitted.
        if scaled_liquidity <= liquidity_threshold {
            continue;
        }
        // V3 fee tiers are denominated in hundredths of a bip: 3000 == 0.3%.
        let fee = fee_tier as f64 / 1_000_000.0;
        edges.push(PoolEdge {
            pool_address: pool.pool,
            dex_name: dex_name.to_string(),
            token_in: pool.token0,
            token_out: pool.token1,
            reserve0: scaled_liquidity,
            reserve1: scaled_liquidity,
            fee,
            gas_estimate,
        });
        edges.push(PoolEdge {
            pool_address: pool.pool,
            dex_name: dex_name.to_string(),
            token_in: pool.token1,
            token_out: pool.token0,
            reserve0: scaled_liquidity,
            reserve1: scaled_liquidity,
            fee,
            gas_estimate,
        });
    }
    Ok(edges)
}

/// Open Question 1: `V3_LIQUIDITY_SCALE_FACTOR` is an external calibration
/// knob (`DEXConfig::v3_liquidity_scale_factor`), default `1.0` (no-op).
/// Scaling is done in floating point and floored back into `U256` — the
/// liquidity proxy is already an approximation (spec.md §9), so this adds
/// no meaningful additional error versus the raw `L` value.
fn scale_liquidity(raw: U256, scale_factor: f64) -> U256 {
    if (scale_factor - 1.0).abs() < f64::EPSILON {
        return raw;
    }
    let raw_f = raw.to::<u128>() as f64;
    let scaled = (raw_f * scale_factor).max(0.0);
    U256::from(scaled as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_queries_skips_self_pairs_and_covers_all_tiers() {
        let a = Address::from([1; 20]);
        let b = Address::from([2; 20]);
        let queries = build_queries(&[a, b, a]);
        // Valid unordered pairs from [a, b, a] are (a,b) and (b,a-dup) — the
        // (a,a) pair at indices 0,2 is skipped as a self-edge.
        assert_eq!(queries.len(), 2 * UNISWAP_V3_FEE_TIERS.len());
        for (t0, t1, fee) in &queries {
            assert_ne!(t0, t1);
            assert!(UNISWAP_V3_FEE_TIERS.contains(fee));
        }
    }

    #[test]
    fn scale_liquidity_is_noop_at_default() {
        let raw = U256::from(1_000_000u64);
        assert_eq!(scale_liquidity(raw, 1.0), raw);
    }

    #[test]
    fn scale_liquidity_scales_down() {
        let raw = U256::from(1_000_000u64);
        assert_eq!(scale_liquidity(raw, 0.5), U256::from(500_000u64));
    }
}
