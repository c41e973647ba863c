//! Pool admissibility filter: liquidity thresholds plus an explicit
//! whitelist/blacklist overlay (spec.md §4.15 supplemented feature).
//!
//! Grounded on the now-superseded `filters::whitelist::PoolWhitelist` —
//! same two-tier idea (a strict blacklist that always wins, an advisory
//! whitelist that narrows scope only when non-empty), rebuilt against this
//! crate's `PoolEdge`/`Address` types instead of ethers'.

use crate::types::PoolEdge;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// One JSON-configurable admissibility policy per chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// If non-empty, only these pool addresses (plus anything passing the
    /// liquidity threshold) are considered — an advisory narrowing, not a
    /// requirement to pass liquidity checks too.
    #[serde(default)]
    pub whitelist: HashSet<Address>,
    /// Pools that are never admitted regardless of liquidity. Always wins
    /// over the whitelist (spec.md §4.15: "blacklist entries are a strict
    /// veto").
    #[serde(default)]
    pub blacklist: HashSet<Address>,
    /// Token addresses that disqualify any pool containing them, e.g.
    /// known-rebasing or honeypot tokens.
    #[serde(default)]
    pub blacklisted_tokens: HashSet<Address>,
}

pub struct PoolFilter {
    config: FilterConfig,
}

impl PoolFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn permissive() -> Self {
        Self::new(FilterConfig::default())
    }

    /// Returns `true` when `edge` is admissible. The liquidity threshold
    /// itself is enforced upstream by the scanner (C4) at discovery time —
    /// this filter is the explicit-allow/deny overlay applied afterward.
    pub fn is_admissible(&self, edge: &PoolEdge) -> bool {
        if self.config.blacklist.contains(&edge.pool_address) {
            debug!(pool = %edge.pool_address, "pool filter: blacklisted pool rejected");
            return false;
        }
        if self.config.blacklisted_tokens.contains(&edge.token_in)
            || self.config.blacklisted_tokens.contains(&edge.token_out)
        {
            debug!(pool = %edge.pool_address, "pool filter: blacklisted token rejected");
            return false;
        }
        if !self.config.whitelist.is_empty() && !self.config.whitelist.contains(&edge.pool_address)
        {
            return false;
        }
        true
    }

    pub fn filter_edges(&self, edges: Vec<PoolEdge>) -> Vec<PoolEdge> {
        edges.into_iter().filter(|e| self.is_admissible(e)).collect()
    }

    pub fn add_to_blacklist(&mut self, pool: Address) {
        self.config.blacklist.insert(pool);
    }

    pub fn add_to_whitelist(&mut self, pool: Address) {
        self.config.whitelist.insert(pool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn edge(pool: u8, token_in: u8, token_out: u8) -> PoolEdge {
        PoolEdge {
            pool_address: Address::from([pool; 20]),
            dex_name: "test-dex".into(),
            token_in: Address::from([token_in; 20]),
            token_out: Address::from([token_out; 20]),
            reserve0: U256::from(10_000u64),
            reserve1: U256::from(10_000u64),
            fee: 0.003,
            gas_estimate: 120_000,
        }
    }

    #[test]
    fn permissive_filter_admits_everything() {
        let filter = PoolFilter::permissive();
        assert!(filter.is_admissible(&edge(1, 2, 3)));
    }

    #[test]
    fn blacklist_always_wins_over_whitelist() {
        let mut config = FilterConfig::default();
        config.whitelist.insert(Address::from([1; 20]));
        config.blacklist.insert(Address::from([1; 20]));
        let filter = PoolFilter::new(config);
        assert!(!filter.is_admissible(&edge(1, 2, 3)));
    }

    #[test]
    fn nonempty_whitelist_excludes_unlisted_pools() {
        let mut config = FilterConfig::default();
        config.whitelist.insert(Address::from([9; 20]));
        let filter = PoolFilter::new(config);
        assert!(!filter.is_admissible(&edge(1, 2, 3)));
        assert!(filter.is_admissible(&edge(9, 2, 3)));
    }

    #[test]
    fn blacklisted_token_rejects_any_pool_containing_it() {
        let mut config = FilterConfig::default();
        config.blacklisted_tokens.insert(Address::from([3; 20]));
        let filter = PoolFilter::new(config);
        assert!(!filter.is_admissible(&edge(1, 2, 3)));
    }
}
