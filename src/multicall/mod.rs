//! Multicall Batcher (C2) — wraps the Multicall3 contract's `aggregate3` to
//! fold many read-only calls into one RPC round-trip.
//!
//! Grounded on the Multicall3 usage pattern of raw `eth_call` + typed
//! `abi_decode_returns` (rather than the generated contract-instance
//! wrapper), which is the shape this crate's multicall-heavy callers need
//! since most of the calls here are cross-protocol (`token0`, `getReserves`,
//! `liquidity`) rather than calls against one contract type.

use crate::contracts::{
    IERC20, IMulticall3, IUniswapV2Pair, UniswapV3Factory, UniswapV3Pool, MULTICALL3_ADDRESS,
};
use crate::error::EngineError;
use alloy::primitives::{aliases::U24, Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use std::str::FromStr;
use tracing::warn;

/// Default sub-batch size (spec.md §4.2 / §5).
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// One read-only call to fold into a batch.
#[derive(Debug, Clone)]
pub struct Call {
    pub target: Address,
    pub call_data: Bytes,
}

/// Per-call outcome. `success=false` means "unknown, skip" to the caller —
/// it never distinguishes a transport failure from a contract revert.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub success: bool,
    pub return_data: Bytes,
}

/// Wraps Multicall3 `aggregate3` with chunking and whole-batch failure
/// handling (spec.md §4.2).
#[derive(Clone)]
pub struct MulticallBatcher<P> {
    provider: P,
    multicall_address: Address,
    batch_size: usize,
}

impl<P: Provider + Clone> MulticallBatcher<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            multicall_address: Address::from_str(MULTICALL3_ADDRESS)
                .expect("MULTICALL3_ADDRESS constant is a valid address"),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// True iff the Multicall3 address has non-empty bytecode on the
    /// current chain.
    pub async fn is_available(&self) -> bool {
        match self.provider.get_code_at(self.multicall_address).await {
            Ok(code) => !code.is_empty(),
            Err(_) => false,
        }
    }

    /// Splits into sub-batches of `batch_size`, concatenating results in
    /// order. A call batch of size 0 returns `[]` without an RPC call.
    /// A transport-level failure of a sub-batch yields `success=false` for
    /// every call in that sub-batch; individual-call failures set
    /// `success=false` on that slot only.
    pub async fn execute_batch(&self, calls: Vec<Call>) -> Result<Vec<CallResult>, EngineError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(calls.len());
        for chunk in calls.chunks(self.batch_size) {
            let sol_calls: Vec<IMulticall3::Call3> = chunk
                .iter()
                .map(|c| IMulticall3::Call3 {
                    target: c.target,
                    allowFailure: true,
                    callData: c.call_data.clone(),
                })
                .collect();

            let calldata = IMulticall3::aggregate3Call { calls: sol_calls }.abi_encode();
            let tx = TransactionRequest::default()
                .to(self.multicall_address)
                .input(calldata.into());

            match self.provider.call(tx).await {
                Ok(raw) => match IMulticall3::aggregate3Call::abi_decode_returns(&raw) {
                    Ok(decoded) => {
                        for r in decoded {
                            results.push(CallResult {
                                success: r.success,
                                return_data: r.returnData,
                            });
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "multicall: failed to decode aggregate3 return data");
                        results.extend(
                            std::iter::repeat(CallResult {
                                success: false,
                                return_data: Bytes::new(),
                            })
                            .take(chunk.len()),
                        );
                    }
                },
                Err(err) => {
                    warn!(error = %err, chunk_len = chunk.len(), "multicall: sub-batch transport failure");
                    results.extend(
                        std::iter::repeat(CallResult {
                            success: false,
                            return_data: Bytes::new(),
                        })
                        .take(chunk.len()),
                    );
                }
            }
        }

        Ok(results)
    }
}

/// Raw per-pool data fetched by `batch_fetch_pool_data`, before the scanner
/// converts it into `PoolEdge`s.
#[derive(Debug, Clone)]
pub struct RawPoolData {
    pub pool: Address,
    pub token0: Address,
    pub token1: Address,
    /// V2: (reserve0, reserve1). V3: (liquidity, liquidity) — invariant 3.
    pub reserve0: U256,
    pub reserve1: U256,
}

/// For each pool address, emits three sub-calls — `token0()`, `token1()`,
/// and either `getReserves()` (V2) or `liquidity()` (V3) — decodes the
/// tuple, and drops any pool where any sub-call failed (spec.md §4.2).
pub async fn batch_fetch_pool_data<P: Provider + Clone>(
    batcher: &MulticallBatcher<P>,
    addresses: &[Address],
    is_v3: bool,
) -> Result<Vec<RawPoolData>, EngineError> {
    if addresses.is_empty() {
        return Ok(Vec::new());
    }

    let mut calls = Vec::with_capacity(addresses.len() * 3);
    for &pool in addresses {
        calls.push(Call {
            target: pool,
            call_data: IUniswapV2Pair::token0Call {}.abi_encode().into(),
        });
        calls.push(Call {
            target: pool,
            call_data: IUniswapV2Pair::token1Call {}.abi_encode().into(),
        });
        if is_v3 {
            calls.push(Call {
                target: pool,
                call_data: UniswapV3Pool::liquidityCall {}.abi_encode().into(),
            });
        } else {
            calls.push(Call {
                target: pool,
                call_data: IUniswapV2Pair::getReservesCall {}.abi_encode().into(),
            });
        }
    }

    let results = batcher.execute_batch(calls).await?;
    let mut out = Vec::with_capacity(addresses.len());

    for (i, &pool) in addresses.iter().enumerate() {
        let base = i * 3;
        let token0_res = &results[base];
        let token1_res = &results[base + 1];
        let third_res = &results[base + 2];

        if !token0_res.success || !token1_res.success || !third_res.success {
            continue; // any sub-call failed — drop this pool
        }

        let token0 = match IUniswapV2Pair::token0Call::abi_decode_returns(&token0_res.return_data)
        {
            Ok(addr) => addr,
            Err(_) => continue,
        };
        let token1 = match IUniswapV2Pair::token1Call::abi_decode_returns(&token1_res.return_data)
        {
            Ok(addr) => addr,
            Err(_) => continue,
        };

        let (reserve0, reserve1) = if is_v3 {
            let liquidity =
                match UniswapV3Pool::liquidityCall::abi_decode_returns(&third_res.return_data) {
                    Ok(l) => U256::from(l),
                    Err(_) => continue,
                };
            (liquidity, liquidity)
        } else {
            match IUniswapV2Pair::getReservesCall::abi_decode_returns(&third_res.return_data) {
                Ok(r) => (U256::from(r.reserve0), U256::from(r.reserve1)),
                Err(_) => continue,
            }
        };

        out.push(RawPoolData {
            pool,
            token0,
            token1,
            reserve0,
            reserve1,
        });
    }

    Ok(out)
}

/// Batch `factory.getPool(tokenA, tokenB, fee)` lookups for V3-style
/// discovery (spec.md §4.4 step 2). Token inputs must already be sorted by
/// the caller for a canonical query.
pub async fn batch_get_pools<P: Provider + Clone>(
    batcher: &MulticallBatcher<P>,
    factory: Address,
    queries: &[(Address, Address, u32)],
) -> Result<Vec<Option<Address>>, EngineError> {
    if queries.is_empty() {
        return Ok(Vec::new());
    }

    let calls: Vec<Call> = queries
        .iter()
        .map(|(a, b, fee)| Call {
            target: factory,
            call_data: UniswapV3Factory::getPoolCall {
                tokenA: *a,
                tokenB: *b,
                fee: U24::from(*fee),
            }
            .abi_encode()
            .into(),
        })
        .collect();

    let results = batcher.execute_batch(calls).await?;
    Ok(results
        .into_iter()
        .map(|r| {
            if !r.success {
                return None;
            }
            match UniswapV3Factory::getPoolCall::abi_decode_returns(&r.return_data) {
                Ok(addr) if addr != Address::ZERO => Some(addr),
                _ => None,
            }
        })
        .collect())
}

/// Re-exported so callers that only need `decimals()` batching don't also
/// have to import `contracts::IERC20` directly.
pub fn decimals_call(token: Address) -> Call {
    Call {
        target: token,
        call_data: IERC20::decimalsCall {}.abi_encode().into(),
    }
}

pub fn decode_decimals(result: &CallResult) -> Option<u8> {
    if !result.success {
        return None;
    }
    IERC20::decimalsCall::abi_decode_returns(&result.return_data).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_batch_size_is_spec_default() {
        assert_eq!(DEFAULT_BATCH_SIZE, 100);
    }
}
