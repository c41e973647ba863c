//! Arbitrage Graph (C5) — an adjacency index over `PoolEdge`s keyed by
//! origin token, rebuilt fresh from the Pool Store's output each cycle
//! (spec.md §4.5). Holds no state beyond the current cycle's edges.

use crate::types::PoolEdge;
use alloy::primitives::Address;
use std::collections::HashMap;

/// `token_in -> edges starting at token_in`. Built once per orchestrator
/// cycle and handed to the Path Finder (C6).
#[derive(Debug, Default, Clone)]
pub struct ArbitrageGraph {
    adjacency: HashMap<Address, Vec<PoolEdge>>,
}

impl ArbitrageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a flat edge list in one pass.
    pub fn from_edges(edges: impl IntoIterator<Item = PoolEdge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add(edge);
        }
        graph
    }

    pub fn add(&mut self, edge: PoolEdge) {
        self.adjacency.entry(edge.token_in).or_default().push(edge);
    }

    pub fn clear(&mut self) {
        self.adjacency.clear();
    }

    /// Edges leading out of `token`, empty slice if the token has none.
    pub fn edges_from(&self, token: Address) -> &[PoolEdge] {
        self.adjacency
            .get(&token)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All tokens that appear as an edge origin (candidate cycle-start
    /// points for the Path Finder).
    pub fn tokens(&self) -> impl Iterator<Item = Address> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn edge(token_in: u8, token_out: u8) -> PoolEdge {
        PoolEdge {
            pool_address: Address::from([0xAA; 20]),
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
    fn edges_indexed_by_origin_token() {
        let graph = ArbitrageGraph::from_edges([edge(1, 2), edge(1, 3), edge(2, 1)]);
        assert_eq!(graph.edges_from(Address::from([1; 20])).len(), 2);
        assert_eq!(graph.edges_from(Address::from([2; 20])).len(), 1);
        assert!(graph.edges_from(Address::from([9; 20])).is_empty());
    }

    #[test]
    fn tokens_covers_every_origin() {
        let graph = ArbitrageGraph::from_edges([edge(1, 2), edge(2, 3)]);
        let tokens: std::collections::HashSet<_> = graph.tokens().collect();
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains(&Address::from([1; 20])));
        assert!(tokens.contains(&Address::from([2; 20])));
    }

    #[test]
    fn clear_empties_graph() {
        let mut graph = ArbitrageGraph::from_edges([edge(1, 2)]);
        graph.clear();
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }
}
