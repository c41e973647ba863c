//! V2-style pool address derivation and reserve reading (spec.md §4.4 step
//! 3). V2 pools are never existence-probed before the reserves fetch —
//! unreachable pools simply fail there and are dropped.

use crate::multicall::{batch_fetch_pool_data, MulticallBatcher};
use crate::types::PoolEdge;
use alloy::primitives::{keccak256, Address};
use alloy::providers::Provider;

/// Derives the CREATE2 pool address for a V2-style factory. Salt is
/// `keccak256(abi.encodePacked(token0, token1))` with tokens sorted
/// lexicographically first, so the result is invariant under caller
/// argument order (spec.md §8 testable property, scenario 2).
pub fn derive_pool_address(
    factory: Address,
    token_a: Address,
    token_b: Address,
    init_code_hash: [u8; 32],
) -> Address {
    let (token0, token1) = sort_tokens(token_a, token_b);
    let mut packed = Vec::with_capacity(40);
    packed.extend_from_slice(token0.as_slice());
    packed.extend_from_slice(token1.as_slice());
    let salt = keccak256(&packed);
    factory.create2(salt, init_code_hash)
}

/// Lexicographic ordering by raw 20-byte address, matching
/// `UniswapV2Library.sortTokens`.
pub fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Fetches reserves for a batch of already-derived V2 pool addresses and
/// emits the two directed `PoolEdge`s per pool that clears the liquidity
/// threshold. Pools the reserves call failed against (non-existent or
/// drained) are silently absent from the result (spec.md §4.4, §7
/// LiquidityError/TransportError).
pub async fn fetch_reserves_and_build_edges<P: Provider + Clone>(
    batcher: &MulticallBatcher<P>,
    pool_addresses: &[Address],
    dex_name: &str,
    fee: f64,
    gas_estimate: u64,
    liquidity_threshold: alloy::primitives::U256,
) -> Result<Vec<PoolEdge>, crate::error::EngineError> {
    let raw = batch_fetch_pool_data(batcher, pool_addresses, false).await?;
    let mut edges = Vec::with_capacity(raw.len() * 2);
    for pool in raw {
        // Invariant 1: reserve0 must strictly exceed the threshold.
        if pool.reserve0 <= liquidity_threshold {
            continue;
        }
        // `reserve0`/`reserve1` on `PoolEdge` are oriented to this edge's
        // own `token_in`/`token_out`, not pool storage order — the
        // profitability calculator (C7) reads them directly as
        // `(reserve_in, reserve_out)`.
        edges.push(PoolEdge {
            pool_address: pool.pool,
            dex_name: dex_name.to_string(),
            token_in: pool.token0,
            token_out: pool.token1,
            reserve0: pool.reserve0,
            reserve1: pool.reserve1,
            fee,
            gas_estimate,
        });
        edges.push(PoolEdge {
            pool_address: pool.pool,
            dex_name: dex_name.to_string(),
            token_in: pool.token1,
            token_out: pool.token0,
            reserve0: pool.reserve1,
            reserve1: pool.reserve0,
            fee,
            gas_estimate,
        });
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_tokens_is_order_invariant() {
        let a = Address::from([1; 20]);
        let b = Address::from([2; 20]);
        assert_eq!(sort_tokens(a, b), sort_tokens(b, a));
    }

    #[test]
    fn derive_pool_address_is_invariant_under_input_order() {
        let factory = Address::from([0x89; 20]);
        let weth = Address::from([0x42; 20]);
        let usdbc = Address::from([0x83; 20]);
        let init_code_hash = [0x96u8; 32];

        let addr1 = derive_pool_address(factory, weth, usdbc, init_code_hash);
        let addr2 = derive_pool_address(factory, usdbc, weth, init_code_hash);
        assert_eq!(addr1, addr2);
    }

    #[test]
    fn derive_pool_address_changes_with_init_code_hash() {
        let factory = Address::from([0x89; 20]);
        let token_a = Address::from([1; 20]);
        let token_b = Address::from([2; 20]);
        let addr1 = derive_pool_address(factory, token_a, token_b, [0u8; 32]);
        let addr2 = derive_pool_address(factory, token_a, token_b, [1u8; 32]);
        assert_ne!(addr1, addr2);
    }
}
