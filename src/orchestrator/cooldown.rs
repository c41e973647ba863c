//! Route-level escalating-backoff cooldown (spec.md §4.15 supplemented
//! feature). Grounded on the now-superseded `arbitrage::cooldown::RouteCooldown`
//! — same escalation factor and cap, rebuilt against this crate's
//! `ArbitragePath`.

use crate::types::ArbitragePath;
use alloy::primitives::Address;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Multiplier applied to the cooldown window on each consecutive failure.
pub const ESCALATION_FACTOR: u64 = 5;
/// Cooldown never exceeds this many blocks regardless of failure streak.
pub const DEFAULT_MAX_COOLDOWN_BLOCKS: u64 = 1800;
const DEFAULT_INITIAL_COOLDOWN_BLOCKS: u64 = 5;
/// Consecutive failures after which a route is permanently blacklisted
/// rather than merely cooled down.
const PERMANENT_BLACKLIST_THRESHOLD: u32 = 6;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A route is identified by its ordered sequence of pool addresses — the
/// same path through different pools is a different route.
pub type RouteKey = Vec<Address>;

pub fn route_key(path: &ArbitragePath) -> RouteKey {
    path.edges.iter().map(|e| e.pool_address).collect()
}

struct CooldownEntry {
    consecutive_failures: u32,
    cooldown_until_block: u64,
    permanently_blacklisted: bool,
}

pub struct RouteCooldown {
    entries: HashMap<RouteKey, CooldownEntry>,
    initial_cooldown_blocks: u64,
    max_cooldown_blocks: u64,
}

impl Default for RouteCooldown {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            initial_cooldown_blocks: DEFAULT_INITIAL_COOLDOWN_BLOCKS,
            max_cooldown_blocks: DEFAULT_MAX_COOLDOWN_BLOCKS,
        }
    }
}

impl RouteCooldown {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if this route may be attempted at `current_block`.
    pub fn is_cooled_down(&self, route: &RouteKey, current_block: u64) -> bool {
        match self.entries.get(route) {
            None => true,
            Some(entry) => !entry.permanently_blacklisted && current_block >= entry.cooldown_until_block,
        }
    }

    /// Records an execution failure, escalating the cooldown window
    /// geometrically and blacklisting permanently past the threshold.
    pub fn record_failure(&mut self, route: RouteKey, current_block: u64) {
        let entry = self.entries.entry(route).or_insert(CooldownEntry {
            consecutive_failures: 0,
            cooldown_until_block: current_block,
            permanently_blacklisted: false,
        });
        entry.consecutive_failures += 1;

        if entry.consecutive_failures >= PERMANENT_BLACKLIST_THRESHOLD {
            entry.permanently_blacklisted = true;
            return;
        }

        let window = self
            .initial_cooldown_blocks
            .saturating_mul(ESCALATION_FACTOR.saturating_pow(entry.consecutive_failures - 1))
            .min(self.max_cooldown_blocks);
        entry.cooldown_until_block = current_block + window;
    }

    /// Clears the failure streak after a successful execution.
    pub fn record_success(&mut self, route: &RouteKey) {
        self.entries.remove(route);
    }

    pub fn blacklisted_count(&self) -> usize {
        self.entries.values().filter(|e| e.permanently_blacklisted).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> RouteKey {
        vec![Address::from([n; 20])]
    }

    #[test]
    fn fresh_route_is_always_cooled_down() {
        let cooldown = RouteCooldown::new();
        assert!(cooldown.is_cooled_down(&key(1), 0));
    }

    #[test]
    fn failure_escalates_cooldown_window() {
        let mut cooldown = RouteCooldown::new();
        let route = key(1);
        cooldown.record_failure(route.clone(), 100);
        assert!(!cooldown.is_cooled_down(&route, 101));
        assert!(cooldown.is_cooled_down(&route, 100 + DEFAULT_INITIAL_COOLDOWN_BLOCKS));

        cooldown.record_failure(route.clone(), 100 + DEFAULT_INITIAL_COOLDOWN_BLOCKS);
        // second failure escalates by ESCALATION_FACTOR
        assert!(!cooldown.is_cooled_down(&route, 100 + DEFAULT_INITIAL_COOLDOWN_BLOCKS + 1));
    }

    #[test]
    fn cooldown_never_exceeds_cap() {
        let mut cooldown = RouteCooldown::new();
        let route = key(1);
        for i in 0..PERMANENT_BLACKLIST_THRESHOLD - 1 {
            cooldown.record_failure(route.clone(), i as u64);
        }
        // not yet blacklisted, but should be capped at max
        let entry = cooldown.entries.get(&route).unwrap();
        assert!(!entry.permanently_blacklisted);
        assert!(entry.cooldown_until_block <= (PERMANENT_BLACKLIST_THRESHOLD as u64) + DEFAULT_MAX_COOLDOWN_BLOCKS);
    }

    #[test]
    fn repeated_failures_trigger_permanent_blacklist() {
        let mut cooldown = RouteCooldown::new();
        let route = key(1);
        for i in 0..PERMANENT_BLACKLIST_THRESHOLD {
            cooldown.record_failure(route.clone(), i as u64 * 1000);
        }
        assert!(!cooldown.is_cooled_down(&route, u64::MAX));
        assert_eq!(cooldown.blacklisted_count(), 1);
    }

    #[test]
    fn success_clears_failure_streak() {
        let mut cooldown = RouteCooldown::new();
        let route = key(1);
        cooldown.record_failure(route.clone(), 0);
        cooldown.record_success(&route);
        assert!(cooldown.is_cooled_down(&route, 0));
    }
}
