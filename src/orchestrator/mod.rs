//! Orchestrator (C10) — drives one scan cycle end to end: scanner → graph
//! → paths → profit → gas filter → relay (spec.md §4.10).

pub mod cooldown;

use crate::error::EngineError;
use crate::gas::{passes_gas_filter, GasOracle};
use crate::graph::ArbitrageGraph;
use crate::pathfinder::PathFinder;
use crate::pool::{PoolFilter, PoolScanner, PoolStore};
use crate::profit;
use crate::registry::DexRegistry;
use crate::types::OpportunityReport;
use alloy::primitives::{Address, I256, U256};
use alloy::providers::Provider;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Counters exposed by `get_stats()` (spec.md §4.10).
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    pub opportunities_found: AtomicU64,
    pub profitable_before_gas: AtomicU64,
    pub profitable_after_gas: AtomicU64,
    pub blocked_by_validation: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorStatsSnapshot {
    pub opportunities_found: u64,
    pub profitable_before_gas: u64,
    pub profitable_after_gas: u64,
    pub blocked_by_validation: u64,
}

pub struct CycleConfig {
    pub chain_id: u64,
    pub tokens: Vec<Address>,
    pub start_tokens: Vec<Address>,
    pub start_amount: U256,
    pub min_profit_threshold: I256,
    pub min_gas_confidence: f64,
    pub slippage_bps: u32,
    pub top_k: usize,
}

pub struct Orchestrator<P> {
    registry: DexRegistry,
    scanner: PoolScanner<P>,
    store: PoolStore,
    filter: PoolFilter,
    pathfinder: PathFinder,
    gas_oracle: GasOracle<P>,
    cooldown: Mutex<cooldown::RouteCooldown>,
    stats: OrchestratorStats,
}

impl<P: Provider + Clone + 'static> Orchestrator<P> {
    pub fn new(
        provider: P,
        registry: DexRegistry,
        store: PoolStore,
        filter: PoolFilter,
        pathfinder: PathFinder,
    ) -> Self {
        Self {
            scanner: PoolScanner::new(provider.clone()),
            gas_oracle: GasOracle::new(provider),
            registry,
            store,
            filter,
            pathfinder,
            cooldown: Mutex::new(cooldown::RouteCooldown::new()),
            stats: OrchestratorStats::default(),
        }
    }

    /// Runs one full cycle (spec.md §4.10 steps 1-5) and returns the
    /// surviving opportunities, sorted by descending net profit and
    /// truncated to `top_k` (step 6).
    pub async fn run_cycle(
        &self,
        config: &CycleConfig,
        current_block: u64,
    ) -> Result<Vec<OpportunityReport>, EngineError> {
        // 1. Ask C4 for edges for (chain, tokens) — but only if the Pool
        // Store isn't already fresh (spec.md §4.3: "if the store is fresh
        // the scanner uses it and filters to the requested token set;
        // otherwise it refetches and updates the store"). Concurrent scans
        // for the same chain share one in-flight refresh.
        let now = crate::pool::store::now_ms();
        let edges = if self.store.is_fresh(config.chain_id, now) {
            debug!(chain_id = config.chain_id, "orchestrator: pool store fresh, skipping network scan");
            self.store.get_edges_for_tokens(config.chain_id, &config.tokens)
        } else {
            let _guard = self.store.refresh_guard(config.chain_id).await;
            // Re-check: a concurrent refresh may have completed while this
            // cycle was waiting for the lock.
            if self.store.is_fresh(config.chain_id, now) {
                debug!(chain_id = config.chain_id, "orchestrator: pool store became fresh while waiting, skipping scan");
                self.store.get_edges_for_tokens(config.chain_id, &config.tokens)
            } else {
                let fresh_edges = self.scanner.scan(&self.registry, config.chain_id, &config.tokens).await?;
                let edges = self.filter.filter_edges(fresh_edges);
                self.store.update(config.chain_id, edges.clone(), now);
                edges
            }
        };
        debug!(chain_id = config.chain_id, edges = edges.len(), "orchestrator: scan complete");

        // 2. Rebuild C5 with those edges.
        let graph = ArbitrageGraph::from_edges(edges);

        // 3. For each configured start token, request paths from C6.
        let mut candidate_paths = Vec::new();
        for &start in &config.start_tokens {
            candidate_paths.extend(self.pathfinder.find_paths(&graph, start));
        }
        self.stats
            .opportunities_found
            .fetch_add(candidate_paths.len() as u64, Ordering::Relaxed);

        // Drop cooled-down/blacklisted routes before spending cycles on C7.
        let cooldown = self.cooldown.lock().await;
        candidate_paths.retain(|p| cooldown.is_cooled_down(&cooldown::route_key(p), current_block));
        drop(cooldown);

        // 4. For each path, run C7; keep those with net_profit > threshold.
        let gas = self.gas_oracle.estimate(config.chain_id).await?;
        let mut reports = Vec::new();
        for path in candidate_paths {
            if let Some(report) = profit::evaluate(path, config.start_amount, gas.max_fee, gas.confidence) {
                if report.is_profitable(I256::ZERO) {
                    self.stats.profitable_before_gas.fetch_add(1, Ordering::Relaxed);
                }
                if report.is_profitable(config.min_profit_threshold) {
                    reports.push(report);
                } else {
                    self.stats.blocked_by_validation.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        // 5. Apply C8 admissibility.
        reports.retain(|r| {
            let admissible = passes_gas_filter(r.net_profit, gas.confidence, config.min_gas_confidence);
            if admissible {
                self.stats.profitable_after_gas.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.blocked_by_validation.fetch_add(1, Ordering::Relaxed);
            }
            admissible
        });

        // 6. Sort by net profit, forward top-k.
        reports.sort_by(|a, b| b.net_profit.cmp(&a.net_profit));
        reports.truncate(config.top_k);

        let _ = config.slippage_bps; // consumed by the executor encoding the call, not here

        info!(
            chain_id = config.chain_id,
            surviving = reports.len(),
            "orchestrator: cycle complete"
        );
        Ok(reports)
    }

    /// Records the outcome of an executed opportunity against the route
    /// cooldown (spec.md §4.15 supplemented feature).
    pub async fn record_execution_result(
        &self,
        report: &OpportunityReport,
        current_block: u64,
        succeeded: bool,
    ) {
        let route = cooldown::route_key(&report.path);
        let mut cooldown = self.cooldown.lock().await;
        if succeeded {
            cooldown.record_success(&route);
        } else {
            cooldown.record_failure(route, current_block);
        }
    }

    pub fn get_stats(&self) -> OrchestratorStatsSnapshot {
        OrchestratorStatsSnapshot {
            opportunities_found: self.stats.opportunities_found.load(Ordering::Relaxed),
            profitable_before_gas: self.stats.profitable_before_gas.load(Ordering::Relaxed),
            profitable_after_gas: self.stats.profitable_after_gas.load(Ordering::Relaxed),
            blocked_by_validation: self.stats.blocked_by_validation.load(Ordering::Relaxed),
        }
    }

    pub fn store(&self) -> &PoolStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_snapshot_starts_at_zero() {
        let stats = OrchestratorStats::default();
        assert_eq!(stats.opportunities_found.load(Ordering::Relaxed), 0);
        assert_eq!(stats.blocked_by_validation.load(Ordering::Relaxed), 0);
    }
}
