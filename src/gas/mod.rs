//! Gas Oracle / Filter (C8) — current fee levels per chain, with a short
//! TTL cache, and the admissibility check applied to evaluated
//! opportunities (spec.md §4.8).

use crate::error::EngineError;
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{I256, U256};
use alloy::providers::Provider;
use dashmap::DashMap;
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Cache TTL — gas prices move quickly, so this is deliberately short
/// compared to the pool store's staleness window.
const DEFAULT_GAS_CACHE_TTL_MS: u64 = 12_000;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy)]
pub struct GasEstimate {
    pub base_fee: U256,
    pub priority_fee: U256,
    pub max_fee: U256,
    /// Confidence in this estimate, in `[0, 1]`. Derived from how recent
    /// the underlying sample is and (for the external-service path) the
    /// service's own reported confidence.
    pub confidence: f64,
    fetched_at_ms: u64,
}

impl GasEstimate {
    fn is_fresh(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.fetched_at_ms) < ttl_ms
    }

    /// Builds a fixed, always-fresh estimate for use by other modules'
    /// tests (the executor and orchestrator tests need a `GasEstimate`
    /// without going through a live `eth_feeHistory` round-trip).
    #[cfg(test)]
    pub fn for_test(max_fee: U256, priority_fee: U256) -> Self {
        Self {
            base_fee: max_fee.saturating_sub(priority_fee),
            priority_fee,
            max_fee,
            confidence: 1.0,
            fetched_at_ms: now_ms(),
        }
    }
}

/// Response shape for an external gas-fee service (spec.md §6: "an
/// external fee service"). Field names follow the common Etherscan-style
/// gas oracle response; unit is gwei.
#[derive(Debug, Deserialize)]
struct ExternalFeeResponse {
    #[serde(rename = "SafeGasPrice")]
    safe_gas_price: Option<f64>,
    #[serde(rename = "ProposeGasPrice")]
    propose_gas_price: Option<f64>,
    #[serde(rename = "FastGasPrice")]
    fast_gas_price: Option<f64>,
}

pub struct GasOracle<P> {
    provider: P,
    http: reqwest::Client,
    external_url: Option<String>,
    cache: DashMap<u64, GasEstimate>,
    ttl_ms: u64,
}

impl<P: Provider + Clone> GasOracle<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            http: reqwest::Client::new(),
            external_url: None,
            cache: DashMap::new(),
            ttl_ms: DEFAULT_GAS_CACHE_TTL_MS,
        }
    }

    pub fn with_external_service(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// Current fee estimate for `chain_id`, served from cache within the
    /// TTL window, otherwise refetched (spec.md §4.8).
    pub async fn estimate(&self, chain_id: u64) -> Result<GasEstimate, EngineError> {
        let now = now_ms();
        if let Some(cached) = self.cache.get(&chain_id) {
            if cached.is_fresh(now, self.ttl_ms) {
                return Ok(*cached);
            }
        }

        let estimate = match self.fetch_external().await {
            Some(e) => e,
            None => self.fetch_onchain().await?,
        };
        self.cache.insert(chain_id, estimate);
        Ok(estimate)
    }

    async fn fetch_external(&self) -> Option<GasEstimate> {
        let url = self.external_url.as_ref()?;
        let resp = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "gas oracle: external fee service request failed");
                return None;
            }
        };
        let parsed: ExternalFeeResponse = match resp.json().await {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, "gas oracle: external fee service returned unparsable body");
                return None;
            }
        };
        let base_fee = gwei_to_wei(parsed.safe_gas_price?);
        let priority_fee = gwei_to_wei(parsed.propose_gas_price? - parsed.safe_gas_price.unwrap_or(0.0));
        let max_fee = gwei_to_wei(parsed.fast_gas_price.unwrap_or(parsed.propose_gas_price?));
        Some(GasEstimate {
            base_fee,
            priority_fee,
            max_fee,
            confidence: 0.9,
            fetched_at_ms: now_ms(),
        })
    }

    async fn fetch_onchain(&self) -> Result<GasEstimate, EngineError> {
        let history = self
            .provider
            .get_fee_history(10, BlockNumberOrTag::Latest, &[50.0])
            .await
            .map_err(|e| EngineError::transport(format!("eth_feeHistory failed: {e}")))?;

        let base_fee = history
            .base_fee_per_gas
            .last()
            .copied()
            .map(U256::from)
            .unwrap_or_default();

        let priority_fee = history
            .reward
            .as_ref()
            .and_then(|rewards| rewards.last())
            .and_then(|tiers| tiers.first())
            .copied()
            .map(U256::from)
            .unwrap_or_else(|| U256::from(1_500_000_000u64)); // 1.5 gwei fallback

        let max_fee = base_fee.saturating_mul(U256::from(2u64)) + priority_fee;

        Ok(GasEstimate {
            base_fee,
            priority_fee,
            max_fee,
            confidence: 0.95,
            fetched_at_ms: now_ms(),
        })
    }
}

fn gwei_to_wei(gwei: f64) -> U256 {
    U256::from((gwei.max(0.0) * 1_000_000_000.0) as u128)
}

/// Admissibility check applied to an already-evaluated opportunity
/// (spec.md §4.8). Does not recompute `net_profit` — callers pass the
/// figure already produced by C7 against the oracle's current fee.
pub fn passes_gas_filter(net_profit: I256, confidence: f64, min_confidence: f64) -> bool {
    if confidence < min_confidence {
        debug!(confidence, min_confidence, "gas filter: confidence below threshold");
        return false;
    }
    net_profit > I256::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gwei_conversion_matches_wei_scale() {
        assert_eq!(gwei_to_wei(1.0), U256::from(1_000_000_000u64));
        assert_eq!(gwei_to_wei(0.0), U256::ZERO);
    }

    #[test]
    fn filter_rejects_low_confidence() {
        assert!(!passes_gas_filter(I256::try_from(100).unwrap(), 0.4, 0.6));
    }

    #[test]
    fn filter_rejects_nonpositive_net_profit() {
        assert!(!passes_gas_filter(I256::ZERO, 1.0, 0.6));
        assert!(!passes_gas_filter(I256::try_from(-1).unwrap(), 1.0, 0.6));
    }

    #[test]
    fn filter_admits_profitable_confident_opportunity() {
        assert!(passes_gas_filter(I256::try_from(100).unwrap(), 0.95, 0.6));
    }
}
