//! Private Relay Manager (C9) — ordered multi-relay submission with
//! privacy-level-driven candidate selection, per-relay statistics, and
//! public-mempool fallback (spec.md §4.9).
//!
//! Grounded on the pack's MEV-protection modules for the overall shape
//! (a `Bundle`/builder, per-relay statistics, a health probe) but
//! reimplemented against a single generic JSON-RPC relay client, since
//! Flashbots Protect, MEV-Share, a builder RPC, and bloXroute all reduce
//! to "POST a signed payload to an HTTPS endpoint with an auth header" —
//! one client parameterized by `RelayType` avoids four near-duplicate
//! HTTP clients.

pub mod bundle;

use crate::error::EngineError;
use bundle::Bundle;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{info, warn};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayType {
    FlashbotsProtect,
    MEVShare,
    BuilderRPC,
    Bloxroute,
    /// Fallback; always a candidate when `allow_public_fallback` is set.
    PublicRPC,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrivacyLevel {
    None,
    Basic,
    Enhanced,
    Maximum,
}

/// Relay candidates admitted at a given privacy level (spec.md §4.9 step
/// 1). `None` still prefers private relays when available but does not
/// require them. `Bloxroute` is admitted alongside the builder tier at
/// `Enhanced` and `Maximum` — like MEV-Share and builder RPCs, bloXroute
/// keeps the transaction out of the public mempool, it just speaks its own
/// `blxr_tx`/`blxr_bundle` protocol (spec.md §6) rather than Flashbots'.
fn candidates_for_privacy(level: PrivacyLevel) -> Vec<RelayType> {
    match level {
        PrivacyLevel::None => vec![
            RelayType::FlashbotsProtect,
            RelayType::MEVShare,
            RelayType::PublicRPC,
        ],
        PrivacyLevel::Basic => vec![RelayType::FlashbotsProtect],
        PrivacyLevel::Enhanced => vec![
            RelayType::MEVShare,
            RelayType::BuilderRPC,
            RelayType::Bloxroute,
        ],
        PrivacyLevel::Maximum => vec![RelayType::BuilderRPC, RelayType::Bloxroute],
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub relay_type: RelayType,
    pub endpoint: String,
    pub auth_key: Option<String>,
    pub enabled: bool,
    /// Higher submits first among candidates at the same privacy level.
    pub priority: u32,
}

#[derive(Debug, Default)]
struct RelayStatsInner {
    total_submissions: AtomicU64,
    successful_inclusions: AtomicU64,
    failed_submissions: AtomicU64,
    total_inclusion_time_ms: AtomicU64,
    last_submission_ms: AtomicU64,
    is_available: AtomicBool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayStatistics {
    pub total_submissions: u64,
    pub successful_inclusions: u64,
    pub failed_submissions: u64,
    pub avg_inclusion_time_ms: u64,
    pub last_submission: u64,
    pub is_available: bool,
}

pub struct SubmitOptions {
    pub privacy_level: PrivacyLevel,
    pub preferred_relay: Option<RelayType>,
    pub fast_mode: bool,
    pub allow_public_fallback: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            privacy_level: PrivacyLevel::Basic,
            preferred_relay: None,
            fast_mode: true,
            allow_public_fallback: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub accepted_by: RelayType,
    pub tx_hash: String,
    pub bundle_hash: Option<String>,
}

pub struct RelayManager {
    relays: Vec<RelayConfig>,
    stats: HashMap<RelayType, Arc<RelayStatsInner>>,
    http: reqwest::Client,
    public_rpc_url: String,
}

impl RelayManager {
    pub fn new(relays: Vec<RelayConfig>, public_rpc_url: impl Into<String>) -> Self {
        let stats = relays
            .iter()
            .map(|r| (r.relay_type, Arc::new(RelayStatsInner::default())))
            .collect();
        Self {
            relays,
            stats,
            http: reqwest::Client::new(),
            public_rpc_url: public_rpc_url.into(),
        }
    }

    fn candidate_relays(&self, options: &SubmitOptions) -> Vec<&RelayConfig> {
        let allowed = candidates_for_privacy(options.privacy_level);
        let mut candidates: Vec<&RelayConfig> = self
            .relays
            .iter()
            .filter(|r| r.enabled && allowed.contains(&r.relay_type))
            .collect();
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));

        if let Some(preferred) = options.preferred_relay {
            if let Some(idx) = candidates.iter().position(|r| r.relay_type == preferred) {
                let hoisted = candidates.remove(idx);
                candidates.insert(0, hoisted);
            }
        }
        candidates
    }

    /// `submit(tx, options)` (spec.md §4.9 steps 1-5).
    pub async fn submit(
        &self,
        signed_raw_tx: &str,
        options: &SubmitOptions,
    ) -> Result<SubmissionResult, EngineError> {
        let candidates = self.candidate_relays(options);

        for relay in &candidates {
            let start = now_ms();
            match self.send_raw_transaction(relay, signed_raw_tx).await {
                Ok(tx_hash) => {
                    self.record_success(relay.relay_type, now_ms().saturating_sub(start));
                    info!(relay = ?relay.relay_type, tx_hash = %tx_hash, "relay manager: submission accepted");
                    return Ok(SubmissionResult {
                        accepted_by: relay.relay_type,
                        tx_hash,
                        bundle_hash: None,
                    });
                }
                Err(err) => {
                    self.record_failure(relay.relay_type);
                    warn!(relay = ?relay.relay_type, error = %err, "relay manager: submission failed");
                    if !options.fast_mode {
                        break;
                    }
                }
            }
        }

        if options.allow_public_fallback {
            let tx_hash = self.send_to_public_rpc(signed_raw_tx).await?;
            self.record_success(RelayType::PublicRPC, 0);
            return Ok(SubmissionResult {
                accepted_by: RelayType::PublicRPC,
                tx_hash,
                bundle_hash: None,
            });
        }

        Err(EngineError::submission(
            "all candidate relays failed and public fallback is disabled",
        ))
    }

    /// `submit_bundle(txs, target_block)` (spec.md §4.9 "Bundle path").
    pub async fn submit_bundle(
        &self,
        bundle: &Bundle,
        options: &SubmitOptions,
    ) -> Result<SubmissionResult, EngineError> {
        let candidates = self.candidate_relays(options);
        let params = bundle.to_send_bundle_params();

        for relay in &candidates {
            if relay.relay_type == RelayType::PublicRPC {
                continue; // bundles are meaningless against the public mempool
            }
            let start = now_ms();
            match self.send_bundle_rpc(relay, &params).await {
                Ok(bundle_hash) => {
                    self.record_success(relay.relay_type, now_ms().saturating_sub(start));
                    return Ok(SubmissionResult {
                        accepted_by: relay.relay_type,
                        tx_hash: bundle
                            .transactions
                            .first()
                            .map(|t| t.tx_hash.clone())
                            .unwrap_or_default(),
                        bundle_hash: Some(bundle_hash),
                    });
                }
                Err(err) => {
                    self.record_failure(relay.relay_type);
                    warn!(relay = ?relay.relay_type, error = %err, "relay manager: bundle submission failed");
                    if !options.fast_mode {
                        break;
                    }
                }
            }
        }
        Err(EngineError::submission("all bundle relays failed"))
    }

    /// `check_health(relay)` — a block-number probe (spec.md §4.9
    /// "Health"). Unhealthy relays are demoted (marked unavailable) but
    /// never removed from the configured list.
    pub async fn check_health(&self, relay_type: RelayType) -> bool {
        let relay = match self.relays.iter().find(|r| r.relay_type == relay_type) {
            Some(r) => r,
            None => return false,
        };
        let healthy = self.probe_block_number(relay).await.is_ok();
        if let Some(stats) = self.stats.get(&relay_type) {
            stats.is_available.store(healthy, Ordering::Relaxed);
        }
        healthy
    }

    pub fn statistics(&self, relay_type: RelayType) -> Option<RelayStatistics> {
        self.stats.get(&relay_type).map(|s| {
            let total = s.total_submissions.load(Ordering::Relaxed);
            let successes = s.successful_inclusions.load(Ordering::Relaxed);
            let avg = if successes > 0 {
                s.total_inclusion_time_ms.load(Ordering::Relaxed) / successes
            } else {
                0
            };
            RelayStatistics {
                total_submissions: total,
                successful_inclusions: successes,
                failed_submissions: s.failed_submissions.load(Ordering::Relaxed),
                avg_inclusion_time_ms: avg,
                last_submission: s.last_submission_ms.load(Ordering::Relaxed),
                is_available: s.is_available.load(Ordering::Relaxed),
            }
        })
    }

    fn record_success(&self, relay_type: RelayType, inclusion_time_ms: u64) {
        if let Some(s) = self.stats.get(&relay_type) {
            s.total_submissions.fetch_add(1, Ordering::Relaxed);
            s.successful_inclusions.fetch_add(1, Ordering::Relaxed);
            s.total_inclusion_time_ms
                .fetch_add(inclusion_time_ms, Ordering::Relaxed);
            s.last_submission_ms.store(now_ms(), Ordering::Relaxed);
            s.is_available.store(true, Ordering::Relaxed);
        }
    }

    fn record_failure(&self, relay_type: RelayType) {
        if let Some(s) = self.stats.get(&relay_type) {
            s.total_submissions.fetch_add(1, Ordering::Relaxed);
            s.failed_submissions.fetch_add(1, Ordering::Relaxed);
            s.last_submission_ms.store(now_ms(), Ordering::Relaxed);
        }
    }

    async fn send_raw_transaction(
        &self,
        relay: &RelayConfig,
        signed_raw_tx: &str,
    ) -> Result<String, EngineError> {
        let method = match relay.relay_type {
            RelayType::Bloxroute => "blxr_tx",
            _ => "eth_sendRawTransaction",
        };
        let params = match relay.relay_type {
            RelayType::Bloxroute => json!([{ "transaction": signed_raw_tx }]),
            _ => json!([signed_raw_tx]),
        };
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let value = self.post_json(relay, &body).await?;
        value
            .get("result")
            .and_then(|r| r.as_str().map(String::from).or_else(|| r.get("txHash").and_then(|h| h.as_str()).map(String::from)))
            .ok_or_else(|| EngineError::transport(format!("{relay:?}: no tx hash in response")))
    }

    async fn send_bundle_rpc(
        &self,
        relay: &RelayConfig,
        params: &bundle::SendBundleParams,
    ) -> Result<String, EngineError> {
        let method = match relay.relay_type {
            RelayType::MEVShare => "mev_sendBundle",
            RelayType::Bloxroute => "blxr_bundle",
            _ => "eth_sendBundle",
        };
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": [params],
        });
        let value = self.post_json(relay, &body).await?;
        value
            .get("result")
            .and_then(|r| r.get("bundleHash").or(Some(r)))
            .and_then(|r| r.as_str())
            .map(String::from)
            .ok_or_else(|| EngineError::transport(format!("{relay:?}: no bundle hash in response")))
    }

    async fn send_to_public_rpc(&self, signed_raw_tx: &str) -> Result<String, EngineError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_sendRawTransaction",
            "params": [signed_raw_tx],
        });
        let public = RelayConfig {
            relay_type: RelayType::PublicRPC,
            endpoint: self.public_rpc_url.clone(),
            auth_key: None,
            enabled: true,
            priority: 0,
        };
        let value = self.post_json(&public, &body).await?;
        value
            .get("result")
            .and_then(|r| r.as_str())
            .map(String::from)
            .ok_or_else(|| EngineError::transport("public rpc: no tx hash in response".to_string()))
    }

    async fn probe_block_number(&self, relay: &RelayConfig) -> Result<u64, EngineError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_blockNumber",
            "params": [],
        });
        let value = self.post_json(relay, &body).await?;
        let hex = value
            .get("result")
            .and_then(|r| r.as_str())
            .ok_or_else(|| EngineError::transport("health probe: missing result".to_string()))?;
        u64::from_str_radix(hex.trim_start_matches("0x"), 16)
            .map_err(|e| EngineError::protocol(format!("health probe: bad block number: {e}")))
    }

    /// bloXroute authenticates via a bare `Authorization` header (spec.md
    /// §6); every other relay type here uses Flashbots' convention of
    /// signing the body and passing it as `X-Flashbots-Signature`.
    async fn post_json(
        &self,
        relay: &RelayConfig,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, EngineError> {
        let mut req = self.http.post(&relay.endpoint).json(body);
        if let Some(key) = relay.auth_key.as_deref() {
            req = match relay.relay_type {
                RelayType::Bloxroute => req.header("Authorization", key),
                _ => req.header("X-Flashbots-Signature", key),
            };
        }
        let resp = req
            .send()
            .await
            .map_err(|e| EngineError::transport(format!("relay request failed: {e}")))?;
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| EngineError::protocol(format!("relay response decode failed: {e}")))
    }
}

/// Guards serialized access to a `RelayManager` shared across concurrent
/// orchestrator cycles (the manager itself holds only atomics, but
/// submission order across relays should not interleave between two
/// concurrent opportunities targeting the same bundle slot).
pub type SharedRelayManager = Arc<Mutex<RelayManager>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn relay(relay_type: RelayType, priority: u32) -> RelayConfig {
        RelayConfig {
            relay_type,
            endpoint: "https://example.invalid".into(),
            auth_key: None,
            enabled: true,
            priority,
        }
    }

    #[test]
    fn basic_privacy_only_selects_flashbots() {
        let manager = RelayManager::new(
            vec![relay(RelayType::FlashbotsProtect, 1), relay(RelayType::BuilderRPC, 2)],
            "https://public.invalid".into(),
        );
        let options = SubmitOptions {
            privacy_level: PrivacyLevel::Basic,
            ..SubmitOptions::default()
        };
        let candidates = manager.candidate_relays(&options);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].relay_type, RelayType::FlashbotsProtect);
    }

    #[test]
    fn preferred_relay_is_hoisted_to_front() {
        let manager = RelayManager::new(
            vec![
                relay(RelayType::FlashbotsProtect, 1),
                relay(RelayType::MEVShare, 2),
            ],
            "https://public.invalid".into(),
        );
        let options = SubmitOptions {
            privacy_level: PrivacyLevel::None,
            preferred_relay: Some(RelayType::FlashbotsProtect),
            ..SubmitOptions::default()
        };
        let candidates = manager.candidate_relays(&options);
        assert_eq!(candidates[0].relay_type, RelayType::FlashbotsProtect);
    }

    #[test]
    fn bloxroute_is_reachable_at_enhanced_and_maximum_but_not_basic() {
        let manager = RelayManager::new(
            vec![relay(RelayType::Bloxroute, 1), relay(RelayType::FlashbotsProtect, 2)],
            "https://public.invalid".into(),
        );
        let basic = manager.candidate_relays(&SubmitOptions {
            privacy_level: PrivacyLevel::Basic,
            ..SubmitOptions::default()
        });
        assert!(!basic.iter().any(|r| r.relay_type == RelayType::Bloxroute));

        let enhanced = manager.candidate_relays(&SubmitOptions {
            privacy_level: PrivacyLevel::Enhanced,
            ..SubmitOptions::default()
        });
        assert!(enhanced.iter().any(|r| r.relay_type == RelayType::Bloxroute));

        let maximum = manager.candidate_relays(&SubmitOptions {
            privacy_level: PrivacyLevel::Maximum,
            ..SubmitOptions::default()
        });
        assert!(maximum.iter().any(|r| r.relay_type == RelayType::Bloxroute));
    }

    #[test]
    fn statistics_start_empty() {
        let manager = RelayManager::new(vec![relay(RelayType::FlashbotsProtect, 1)], "https://public.invalid".into());
        let stats = manager.statistics(RelayType::FlashbotsProtect).unwrap();
        assert_eq!(stats.total_submissions, 0);
        assert!(!stats.is_available);
    }

    #[test]
    fn priority_orders_candidates_descending() {
        let manager = RelayManager::new(
            vec![relay(RelayType::MEVShare, 1), relay(RelayType::BuilderRPC, 5)],
            "https://public.invalid".into(),
        );
        let options = SubmitOptions {
            privacy_level: PrivacyLevel::Enhanced,
            ..SubmitOptions::default()
        };
        let candidates = manager.candidate_relays(&options);
        assert_eq!(candidates[0].relay_type, RelayType::BuilderRPC);
    }
}
