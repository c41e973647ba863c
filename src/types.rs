//! Core data model: tokens, DEX configuration, pool edges, arbitrage paths,
//! and the opportunity/cache records that flow between the pipeline stages.

use alloy::primitives::{Address, I256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fee sentinel for V2 routers in ArbExecutor.sol.
/// type(uint24).max = 16777215. Signals swapExactTokensForTokens instead of V3 exactInputSingle.
/// fee=0 → Algebra (QuickSwap V3), fee=1..65535 → standard V3, fee=16777215 → V2.
pub const V2_FEE_SENTINEL: u32 = 16_777_215;

/// A token reference: address plus the metadata needed for amount<->human
/// conversions. `symbol` is display-only and never used in comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

impl TokenRef {
    pub fn new(address: Address, decimals: u8, symbol: impl Into<String>) -> Self {
        Self {
            address,
            decimals,
            symbol: symbol.into(),
        }
    }
}

/// Protocol family tag (spec.md §3's fixed set, extended with the two
/// concrete V3-style variants this registry actually speaks: SushiSwap's own
/// V3 deployment and QuickSwap's Algebra fork). `isV3Style` is the one place
/// the V2/V3 branch lives — downstream code must consume only this, never
/// re-derive it from a DEX name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    UniswapV2,
    UniswapV3,
    SushiSwap,
    SushiSwapV3,
    /// QuickSwap V3 — Algebra fork, dynamic per-pool fees, `globalState()`
    /// instead of `slot0()`.
    Algebra,
    Aerodrome,
    Curve,
    Balancer,
    SolidlyVelodrome,
}

/// Pure function: true iff pools of this protocol are fee-tiered,
/// `factory.getPool(tokenA, tokenB, fee)`-addressed, and liquidity-proxied
/// rather than reserve-paired. V2-style protocols use CREATE2 addressing and
/// `getReserves()`.
pub fn is_v3_style(protocol: Protocol) -> bool {
    matches!(
        protocol,
        Protocol::UniswapV3 | Protocol::SushiSwapV3 | Protocol::Algebra
    )
}

/// Concrete DEX identity: one variant per protocol × fee-tier combination
/// actually tradable on this registry. `DEXConfig::name` keys on the
/// `Display` form of this type; `protocol()` resolves the coarser spec.md tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DexType {
    Uniswap, // Quickswap-deployed Uniswap V2 fork on Polygon
    Sushiswap,
    Quickswap,
    Apeswap,
    UniswapV3_001,
    UniswapV3_005,
    UniswapV3_030,
    UniswapV3_100,
    SushiV3_001,
    SushiV3_005,
    SushiV3_030,
    QuickswapV3, // Algebra
    QuickSwapV2,
    SushiSwapV2,
}

impl DexType {
    /// The coarse protocol family this DEX belongs to — the single dispatch
    /// key for address-derivation and reserve-reading behavior.
    pub fn protocol(&self) -> Protocol {
        match self {
            DexType::Uniswap | DexType::Quickswap | DexType::QuickSwapV2 | DexType::Apeswap => {
                Protocol::UniswapV2
            }
            DexType::Sushiswap | DexType::SushiSwapV2 => Protocol::SushiSwap,
            DexType::UniswapV3_001
            | DexType::UniswapV3_005
            | DexType::UniswapV3_030
            | DexType::UniswapV3_100 => Protocol::UniswapV3,
            DexType::SushiV3_001 | DexType::SushiV3_005 | DexType::SushiV3_030 => {
                Protocol::SushiSwapV3
            }
            DexType::QuickswapV3 => Protocol::Algebra,
        }
    }

    pub fn is_v3(&self) -> bool {
        is_v3_style(self.protocol())
    }

    pub fn is_v2(&self) -> bool {
        !self.is_v3()
    }

    /// Fee percentage for any DEX type. V2: always 0.30%. V3: from fee
    /// tier. Algebra: dynamic, returns None (read from pool state instead).
    pub fn fee_percent(&self) -> Option<f64> {
        if self.is_v2() {
            Some(0.30)
        } else if self.is_quickswap_v3() {
            None
        } else {
            self.v3_fee_bps().map(|bps| bps as f64 / 100.0)
        }
    }

    pub fn is_quickswap_v3(&self) -> bool {
        matches!(self, DexType::QuickswapV3)
    }

    pub fn is_sushi_v3(&self) -> bool {
        matches!(
            self,
            DexType::SushiV3_001 | DexType::SushiV3_005 | DexType::SushiV3_030
        )
    }

    /// Fee in basis points for V3 pools. QuickswapV3 returns None (dynamic).
    pub fn v3_fee_bps(&self) -> Option<u32> {
        match self {
            DexType::UniswapV3_001 | DexType::SushiV3_001 => Some(1),
            DexType::UniswapV3_005 | DexType::SushiV3_005 => Some(5),
            DexType::UniswapV3_030 | DexType::SushiV3_030 => Some(30),
            DexType::UniswapV3_100 => Some(100),
            _ => None,
        }
    }

    /// V3 fee tier for factory/router calls (`UNISWAP_V3_FEE_TIERS =
    /// {100, 500, 3000, 10000}`). QuickswapV3 returns `Some(0)` — a sentinel
    /// meaning "Algebra, no fee parameter". Returns None for V2 types.
    pub fn v3_fee_tier(&self) -> Option<u32> {
        match self {
            DexType::UniswapV3_001 | DexType::SushiV3_001 => Some(100),
            DexType::UniswapV3_005 | DexType::SushiV3_005 => Some(500),
            DexType::UniswapV3_030 | DexType::SushiV3_030 => Some(3000),
            DexType::UniswapV3_100 => Some(10000),
            DexType::QuickswapV3 => Some(0),
            _ => None,
        }
    }

    /// Fee value for ArbExecutor.sol atomic execution: V2 → sentinel,
    /// Algebra → 0, V3 → actual fee tier.
    pub fn atomic_fee(&self) -> u32 {
        if self.is_v2() {
            V2_FEE_SENTINEL
        } else {
            self.v3_fee_tier().unwrap_or(0)
        }
    }
}

impl fmt::Display for DexType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DexType::Uniswap => write!(f, "Uniswap"),
            DexType::Sushiswap => write!(f, "Sushiswap"),
            DexType::Quickswap => write!(f, "Quickswap"),
            DexType::Apeswap => write!(f, "Apeswap"),
            DexType::UniswapV3_001 => write!(f, "UniswapV3_0.01%"),
            DexType::UniswapV3_005 => write!(f, "UniswapV3_0.05%"),
            DexType::UniswapV3_030 => write!(f, "UniswapV3_0.30%"),
            DexType::UniswapV3_100 => write!(f, "UniswapV3_1.00%"),
            DexType::SushiV3_001 => write!(f, "SushiV3_0.01%"),
            DexType::SushiV3_005 => write!(f, "SushiV3_0.05%"),
            DexType::SushiV3_030 => write!(f, "SushiV3_0.30%"),
            DexType::QuickswapV3 => write!(f, "QuickswapV3"),
            DexType::QuickSwapV2 => write!(f, "QuickSwapV2"),
            DexType::SushiSwapV2 => write!(f, "SushiSwapV2"),
        }
    }
}

/// Immutable-after-load DEX configuration (spec.md §3). One entry per
/// protocol×chain; `name` is the unique registry key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DEXConfig {
    pub name: String,
    pub protocol: Protocol,
    pub dex: DexType,
    pub chain_id: u64,
    pub router: Address,
    pub factory: Address,
    /// Present iff pool addresses are CREATE2-derivable (V2-style only).
    pub init_code_hash: Option<[u8; 32]>,
    pub fee_bps: u32,
    pub gas_estimate: u64,
    /// Minimum reserve/liquidity to admit a pool (invariant 1).
    pub liquidity_threshold: U256,
    /// Lower = preferred; drives registry iteration order.
    pub priority: u32,
    /// External calibration knob: scales V3's liquidity-as-reserve-proxy
    /// (L = sqrt(x*y)) before comparison against a V2-denominated threshold.
    /// Default 1.0 (no-op) — the spec declines to derive this value.
    pub v3_liquidity_scale_factor: f64,
}

impl DEXConfig {
    pub fn is_v3_style(&self) -> bool {
        is_v3_style(self.protocol)
    }
}

/// One directed swap possibility on one pool. Scanner output currency: the
/// graph and path finder consume only `PoolEdge`s, never raw pool state.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEdge {
    pub pool_address: Address,
    pub dex_name: String,
    pub token_in: Address,
    pub token_out: Address,
    /// For V3 edges both equal current `liquidity` as a size proxy
    /// (invariant 3).
    pub reserve0: U256,
    pub reserve1: U256,
    pub fee: f64,
    pub gas_estimate: u64,
}

/// Ordered sequence of `PoolEdge`s forming a cycle: `edges[i].token_out ==
/// edges[i+1].token_in`, and `edges[0].token_in == edges[n-1].token_out`
/// (spec.md §3). Construction validates both the chaining and no-pool-reuse
/// invariants; `ArbitragePath::new` is the only way to build one.
#[derive(Debug, Clone)]
pub struct ArbitragePath {
    pub edges: Vec<PoolEdge>,
}

impl ArbitragePath {
    /// Validates chaining, cyclicity, and no-pool-reuse. Returns `None` if
    /// any invariant is violated — callers treat that as "not a valid path",
    /// not as a panic-worthy bug, since path candidates are generated
    /// speculatively during DFS.
    pub fn new(edges: Vec<PoolEdge>) -> Option<Self> {
        if edges.is_empty() {
            return None;
        }
        for w in edges.windows(2) {
            if w[0].token_out != w[1].token_in {
                return None;
            }
        }
        if edges.first().unwrap().token_in != edges.last().unwrap().token_out {
            return None;
        }
        let mut seen = std::collections::HashSet::with_capacity(edges.len());
        for e in &edges {
            if !seen.insert(e.pool_address) {
                return None;
            }
        }
        Some(Self { edges })
    }

    pub fn start_token(&self) -> Address {
        self.edges[0].token_in
    }

    pub fn hops(&self) -> usize {
        self.edges.len()
    }
}

/// `PoolEdge` payload plus a monotonic fetch timestamp. Valid while `now -
/// timestamp_ms < ttl_ms`.
#[derive(Debug, Clone)]
pub struct CachedPoolEntry {
    pub edge: PoolEdge,
    pub timestamp_ms: u64,
}

impl CachedPoolEntry {
    pub fn new(edge: PoolEdge, timestamp_ms: u64) -> Self {
        Self { edge, timestamp_ms }
    }

    pub fn is_fresh(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) < ttl_ms
    }
}

/// An `ArbitragePath` plus simulated amounts and profit figures (spec.md
/// §3). `confidence` folds in gas-oracle confidence (C8) at the point the
/// orchestrator applies admissibility.
#[derive(Debug, Clone)]
pub struct OpportunityReport {
    pub path: ArbitragePath,
    pub input_amount: U256,
    pub output_amount: U256,
    pub gross_profit: I256,
    pub gas_cost: U256,
    pub net_profit: I256,
    pub confidence: f64,
}

impl OpportunityReport {
    pub fn is_profitable(&self, threshold: I256) -> bool {
        self.net_profit > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    #[test]
    fn v2_fee_sentinel_is_uint24_max() {
        assert_eq!(V2_FEE_SENTINEL, 16_777_215);
        assert_eq!(V2_FEE_SENTINEL, (1u32 << 24) - 1);
    }

    #[test]
    fn atomic_fee_v2() {
        assert_eq!(DexType::QuickSwapV2.atomic_fee(), V2_FEE_SENTINEL);
        assert_eq!(DexType::SushiSwapV2.atomic_fee(), V2_FEE_SENTINEL);
        assert_eq!(DexType::Uniswap.atomic_fee(), V2_FEE_SENTINEL);
        assert_eq!(DexType::Sushiswap.atomic_fee(), V2_FEE_SENTINEL);
    }

    #[test]
    fn atomic_fee_v3() {
        assert_eq!(DexType::UniswapV3_001.atomic_fee(), 100);
        assert_eq!(DexType::UniswapV3_005.atomic_fee(), 500);
        assert_eq!(DexType::UniswapV3_030.atomic_fee(), 3000);
        assert_eq!(DexType::UniswapV3_100.atomic_fee(), 10000);
        assert_eq!(DexType::SushiV3_001.atomic_fee(), 100);
        assert_eq!(DexType::QuickswapV3.atomic_fee(), 0);
    }

    #[test]
    fn protocol_is_v3_style_dispatch() {
        assert!(!is_v3_style(Protocol::UniswapV2));
        assert!(is_v3_style(Protocol::UniswapV3));
        assert!(is_v3_style(Protocol::SushiSwapV3));
        assert!(is_v3_style(Protocol::Algebra));
        assert_eq!(DexType::UniswapV3_030.protocol(), Protocol::UniswapV3);
        assert_eq!(DexType::QuickswapV3.protocol(), Protocol::Algebra);
        assert!(DexType::QuickswapV3.is_v3());
        assert!(DexType::QuickSwapV2.is_v2());
    }

    #[test]
    fn arbitrage_path_rejects_non_cyclic() {
        let a = addr(1);
        let b = addr(2);
        let c = addr(3);
        let edge = |token_in, token_out, pool: Address| PoolEdge {
            pool_address: pool,
            dex_name: "test".into(),
            token_in,
            token_out,
            reserve0: U256::from(1000u64),
            reserve1: U256::from(1000u64),
            fee: 0.003,
            gas_estimate: 100_000,
        };
        // a -> b -> a is cyclic and valid
        let valid = vec![edge(a, b, addr(10)), edge(b, a, addr(11))];
        assert!(ArbitragePath::new(valid).is_some());

        // a -> b -> c never returns to a: invalid
        let invalid = vec![edge(a, b, addr(10)), edge(b, c, addr(11))];
        assert!(ArbitragePath::new(invalid).is_none());
    }

    #[test]
    fn arbitrage_path_rejects_pool_reuse() {
        let a = addr(1);
        let b = addr(2);
        let pool = addr(10);
        let edge = |token_in, token_out| PoolEdge {
            pool_address: pool,
            dex_name: "test".into(),
            token_in,
            token_out,
            reserve0: U256::from(1000u64),
            reserve1: U256::from(1000u64),
            fee: 0.003,
            gas_estimate: 100_000,
        };
        let edges = vec![edge(a, b), edge(b, a)];
        assert!(ArbitragePath::new(edges).is_none());
    }

    #[test]
    fn cached_pool_entry_freshness() {
        let edge = PoolEdge {
            pool_address: Address::ZERO,
            dex_name: "test".into(),
            token_in: Address::ZERO,
            token_out: Address::ZERO,
            reserve0: U256::from(1u64),
            reserve1: U256::from(1u64),
            fee: 0.003,
            gas_estimate: 1,
        };
        let entry = CachedPoolEntry::new(edge, 1_000);
        assert!(entry.is_fresh(1_500, 1_000));
        assert!(!entry.is_fresh(5_000, 1_000));
    }
}
