//! Path Finder (C6) — bounded DFS enumeration of cyclic `ArbitragePath`s
//! (spec.md §4.6).

use crate::graph::ArbitrageGraph;
use crate::types::{ArbitragePath, PoolEdge};
use alloy::primitives::Address;
use std::collections::HashSet;

/// Hard cap on total paths emitted per start token, guarding against
/// pathological fan-out (spec.md §4.6 complexity guard).
pub const DEFAULT_MAX_PATHS_PER_START: usize = 10_000;

pub struct PathFinder {
    min_hops: usize,
    max_hops: usize,
    max_paths_per_start: usize,
}

impl Default for PathFinder {
    fn default() -> Self {
        Self {
            min_hops: 2,
            max_hops: 3,
            max_paths_per_start: DEFAULT_MAX_PATHS_PER_START,
        }
    }
}

impl PathFinder {
    pub fn new(min_hops: usize, max_hops: usize) -> Self {
        Self {
            min_hops,
            max_hops,
            ..Self::default()
        }
    }

    pub fn with_max_paths_per_start(mut self, cap: usize) -> Self {
        self.max_paths_per_start = cap;
        self
    }

    /// All cycles starting and ending at `start_token` with hop count in
    /// `[min_hops, max_hops]`. Emission order is DFS-stable and
    /// deterministic given the graph (spec.md §9); callers re-sort by net
    /// profit.
    pub fn find_paths(&self, graph: &ArbitrageGraph, start_token: Address) -> Vec<ArbitragePath> {
        let mut out = Vec::new();
        let mut trail: Vec<PoolEdge> = Vec::with_capacity(self.max_hops);
        let mut visited_pools: HashSet<Address> = HashSet::new();
        self.dfs(
            graph,
            start_token,
            start_token,
            &mut trail,
            &mut visited_pools,
            &mut out,
        );
        out
    }

    fn dfs(
        &self,
        graph: &ArbitrageGraph,
        start_token: Address,
        current: Address,
        trail: &mut Vec<PoolEdge>,
        visited_pools: &mut HashSet<Address>,
        out: &mut Vec<ArbitragePath>,
    ) {
        if out.len() >= self.max_paths_per_start {
            return;
        }
        if trail.len() == self.max_hops {
            return;
        }

        for edge in graph.edges_from(current) {
            if out.len() >= self.max_paths_per_start {
                return;
            }
            if visited_pools.contains(&edge.pool_address) {
                continue; // pool reuse forbidden (spec.md §3 invariant 4)
            }

            trail.push(edge.clone());
            visited_pools.insert(edge.pool_address);

            let depth = trail.len();
            if edge.token_out == start_token && depth >= self.min_hops {
                if let Some(path) = ArbitragePath::new(trail.clone()) {
                    out.push(path);
                }
            }
            if depth < self.max_hops {
                self.dfs(graph, start_token, edge.token_out, trail, visited_pools, out);
            }

            visited_pools.remove(&edge.pool_address);
            trail.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn edge(pool: u8, token_in: u8, token_out: u8) -> PoolEdge {
        PoolEdge {
            pool_address: Address::from([pool; 20]),
            dex_name: format!("dex-{pool}"),
            token_in: Address::from([token_in; 20]),
            token_out: Address::from([token_out; 20]),
            reserve0: U256::from(10_000u64),
            reserve1: U256::from(10_000u64),
            fee: 0.003,
            gas_estimate: 120_000,
        }
    }

    #[test]
    fn two_hop_cycle_detection_both_dexes() {
        // WETH(1) <-> USDC(2) via two distinct DEXes, matching spec.md §8
        // scenario 3.
        let weth = Address::from([1; 20]);
        let graph = ArbitrageGraph::from_edges([
            edge(0xA1, 1, 2),
            edge(0xA2, 2, 1),
            edge(0xB1, 1, 2),
            edge(0xB2, 2, 1),
        ]);
        let finder = PathFinder::new(2, 2);
        let paths = finder.find_paths(&graph, weth);
        assert_eq!(paths.len(), 2);
        for path in &paths {
            assert_eq!(path.hops(), 2);
            assert_eq!(path.start_token(), weth);
        }
    }

    #[test]
    fn never_reuses_a_pool_within_one_path() {
        let a = Address::from([1; 20]);
        // A single DEX offering both directions must not close a cycle
        // through itself.
        let graph = ArbitrageGraph::from_edges([edge(0xA1, 1, 2), edge(0xA1, 2, 1)]);
        let finder = PathFinder::new(2, 2);
        let paths = finder.find_paths(&graph, a);
        assert!(paths.is_empty());
    }

    #[test]
    fn respects_max_hops_bound() {
        let a = Address::from([1; 20]);
        let graph = ArbitrageGraph::from_edges([
            edge(1, 1, 2),
            edge(2, 2, 3),
            edge(3, 3, 4),
            edge(4, 4, 1),
        ]);
        let finder = PathFinder::new(2, 3);
        let paths = finder.find_paths(&graph, a);
        assert!(paths.iter().all(|p| p.hops() <= 3));
        // the 4-hop cycle back to `a` is never emitted
        assert!(paths.is_empty());
    }

    #[test]
    fn respects_path_cap() {
        let a = Address::from([1; 20]);
        let graph = ArbitrageGraph::from_edges([edge(0xA1, 1, 2), edge(0xA2, 2, 1)]);
        let finder = PathFinder::new(2, 2).with_max_paths_per_start(0);
        let paths = finder.find_paths(&graph, a);
        assert!(paths.is_empty());
    }
}
