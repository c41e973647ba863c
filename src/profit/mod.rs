//! Profitability Calculator (C7) — AMM-exact simulation of an
//! `ArbitragePath`, in integer arithmetic throughout to avoid the float
//! loss a naive port of `pool::calculator::PriceCalculator`'s `f64` math
//! would introduce (spec.md §4.7).

use crate::types::{ArbitragePath, OpportunityReport};
use alloy::primitives::{I256, U256};

/// Fee precision: fees are expressed in this crate as fractions (e.g.
/// `0.003`) but applied here as parts-per-`FEE_SCALE` integers so the
/// constant-product multiplication never touches a float.
const FEE_SCALE: u64 = 1_000_000;

/// Simulates a single hop: `amount_in' = amount_in * (1 - f)`,
/// `amount_out = amount_in' * reserve_out / (reserve_in + amount_in')`
/// (spec.md §4.7). Returns `None` if any intermediate product overflows
/// 256 bits (numerical semantics: saturate-and-exclude, not saturate-and-
/// continue) or if the hop yields zero.
fn simulate_hop(amount_in: U256, reserve_in: U256, reserve_out: U256, fee: f64) -> Option<U256> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return None;
    }
    let fee_bps_scaled = (fee * FEE_SCALE as f64).round() as u64;
    let fee_bps_scaled = fee_bps_scaled.min(FEE_SCALE);
    let multiplier = U256::from(FEE_SCALE - fee_bps_scaled);

    let amount_in_adjusted = amount_in.checked_mul(multiplier)?;
    let numerator = amount_in_adjusted.checked_mul(reserve_out)?;
    let denominator = reserve_in
        .checked_mul(U256::from(FEE_SCALE))?
        .checked_add(amount_in_adjusted)?;
    if denominator.is_zero() {
        return None;
    }
    let amount_out = numerator / denominator; // floor division (spec.md §4.7)
    if amount_out.is_zero() {
        None
    } else {
        Some(amount_out)
    }
}

/// Chains hops across the whole path. `None` propagates from any hop that
/// overflowed or yielded zero — the path as a whole is then "invalid"
/// (spec.md §4.7: "a path simulates to −1 if any hop yields zero").
pub fn simulate_path(path: &ArbitragePath, start_amount: U256) -> Option<U256> {
    let mut amount = start_amount;
    for edge in &path.edges {
        // `reserve0`/`reserve1` are oriented to this edge's own
        // `token_in`/`token_out` (see `pool::v2`), so no extra lookup of
        // the pool's token0 is needed here.
        amount = simulate_hop(amount, edge.reserve0, edge.reserve1, edge.fee)?;
    }
    Some(amount)
}

/// Same chaining as `simulate_path` but returns the output amount after
/// *every* hop, not just the final one. The executor needs these to set a
/// per-hop `minOut` (spec.md §6's `SwapStep.minOut`) rather than only
/// protecting the last leg.
pub fn simulate_path_intermediates(path: &ArbitragePath, start_amount: U256) -> Option<Vec<U256>> {
    let mut amount = start_amount;
    let mut out = Vec::with_capacity(path.edges.len());
    for edge in &path.edges {
        amount = simulate_hop(amount, edge.reserve0, edge.reserve1, edge.fee)?;
        out.push(amount);
    }
    Some(out)
}

/// `min_out` given a slippage tolerance in bps (spec.md §4.7 slippage
/// policy).
pub fn min_out_with_slippage(amount_out: U256, slippage_bps: u32) -> U256 {
    let bps = slippage_bps.min(10_000);
    amount_out * U256::from(10_000 - bps) / U256::from(10_000u64)
}

fn u256_to_i256(value: U256) -> I256 {
    I256::try_from(value).unwrap_or(I256::MAX)
}

/// Full evaluation of one path: simulates the chain, subtracts gas, and
/// produces an `OpportunityReport`. `gas_price_wei` comes from the Gas
/// Oracle (C8); `confidence` is folded in by the caller from the oracle's
/// own confidence figure. Returns `None` if the path simulation is invalid
/// (overflow or a zero-yield hop).
pub fn evaluate(
    path: ArbitragePath,
    start_amount: U256,
    gas_price_wei: U256,
    confidence: f64,
) -> Option<OpportunityReport> {
    let output_amount = simulate_path(&path, start_amount)?;

    let gross_profit = u256_to_i256(output_amount) - u256_to_i256(start_amount);

    let total_gas_units: u64 = path.edges.iter().map(|e| e.gas_estimate).sum();
    let gas_cost = U256::from(total_gas_units).saturating_mul(gas_price_wei);

    let net_profit = gross_profit - u256_to_i256(gas_cost);

    Some(OpportunityReport {
        path,
        input_amount: start_amount,
        output_amount,
        gross_profit,
        gas_cost,
        net_profit,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PoolEdge;
    use alloy::primitives::Address;
    use rust_decimal_macros::dec;

    fn edge(pool: u8, token_in: u8, token_out: u8, reserve_in: u64, reserve_out: u64, fee: f64) -> PoolEdge {
        PoolEdge {
            pool_address: Address::from([pool; 20]),
            dex_name: format!("dex-{pool}"),
            token_in: Address::from([token_in; 20]),
            token_out: Address::from([token_out; 20]),
            reserve0: U256::from(reserve_in),
            reserve1: U256::from(reserve_out),
            fee,
            gas_estimate: 120_000,
        }
    }

    #[test]
    fn single_hop_applies_fee_and_constant_product() {
        let amount_in = U256::from(1000u64);
        let out = simulate_hop(amount_in, U256::from(1_000_000u64), U256::from(1_000_000u64), 0.003).unwrap();
        // With a 0.3% fee, output is strictly less than the no-fee case.
        let out_no_fee = simulate_hop(amount_in, U256::from(1_000_000u64), U256::from(1_000_000u64), 0.0).unwrap();
        assert!(out < out_no_fee);
    }

    #[test]
    fn two_hop_round_trip_matches_spec_scenario() {
        // spec.md §8 scenario 4: start 1e18, pool A (1000e18, 2_000_000e6),
        // pool B (2_000_000e6, 1001e18), both fee 0.003.
        let start = U256::from(10u128.pow(18));
        let a = Address::from([1; 20]);
        let b = Address::from([2; 20]);
        let path = ArbitragePath::new(vec![
            PoolEdge {
                pool_address: Address::from([0xA1; 20]),
                dex_name: "dex-a".into(),
                token_in: a,
                token_out: b,
                reserve0: U256::from(1000u128) * U256::from(10u128.pow(18)),
                reserve1: U256::from(2_000_000u128) * U256::from(10u128.pow(6)),
                fee: 0.003,
                gas_estimate: 150_000,
            },
            PoolEdge {
                pool_address: Address::from([0xB1; 20]),
                dex_name: "dex-b".into(),
                token_in: b,
                token_out: a,
                reserve0: U256::from(2_000_000u128) * U256::from(10u128.pow(6)),
                reserve1: U256::from(1001u128) * U256::from(10u128.pow(18)),
                fee: 0.003,
                gas_estimate: 150_000,
            },
        ])
        .unwrap();

        let report = evaluate(path, start, U256::from(1_000_000_000u64), 1.0).unwrap();
        assert!(report.output_amount > start);
        assert!(report.gross_profit > I256::ZERO);
        assert!(report.is_profitable(I256::ZERO));
    }

    #[test]
    fn zero_reserve_hop_invalidates_path() {
        let path = ArbitragePath::new(vec![
            edge(1, 1, 2, 1000, 0, 0.003),
            edge(2, 2, 1, 1000, 1000, 0.003),
        ])
        .unwrap();
        assert!(simulate_path(&path, U256::from(100u64)).is_none());
    }

    #[test]
    fn slippage_reduces_min_out_proportionally() {
        let amount_out = U256::from(10_000u64);
        assert_eq!(min_out_with_slippage(amount_out, 0), amount_out);
        assert_eq!(min_out_with_slippage(amount_out, 100), U256::from(9_900u64));
        assert_eq!(min_out_with_slippage(amount_out, 10_000), U256::ZERO);
    }

    #[test]
    fn intermediates_track_each_hop_and_end_at_the_final_amount() {
        let path = ArbitragePath::new(vec![
            edge(1, 1, 2, 1_000_000, 1_000_000, 0.003),
            edge(2, 2, 1, 1_000_000, 1_000_000, 0.003),
        ])
        .unwrap();
        let start = U256::from(1_000u64);
        let intermediates = simulate_path_intermediates(&path, start).unwrap();
        assert_eq!(intermediates.len(), 2);
        assert_eq!(*intermediates.last().unwrap(), simulate_path(&path, start).unwrap());
    }

    #[test]
    fn decimal_sanity_reference() {
        // Sanity check that rust_decimal (used elsewhere for human-facing
        // reporting) agrees with the integer math on a simple fee.
        let fee = dec!(0.003);
        assert_eq!(fee.to_string(), "0.003");
    }
}
