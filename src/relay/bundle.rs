//! Bundle construction for private relay submission (spec.md §4.9 "Bundle
//! path"). Grounded on the MEV bundle builder pattern (same field shape
//! and staged builder) used elsewhere in the pack for Flashbots-style
//! bundles.

use alloy::primitives::Bytes;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct BundleTransaction {
    pub signed_raw_tx: Bytes,
    pub tx_hash: String,
}

#[derive(Debug, Clone)]
pub struct Bundle {
    pub transactions: Vec<BundleTransaction>,
    pub target_block: u64,
    pub min_timestamp: Option<u64>,
    pub max_timestamp: Option<u64>,
    pub reverting_tx_hashes: Vec<String>,
}

pub struct BundleBuilder {
    bundle: Bundle,
}

impl BundleBuilder {
    pub fn new(target_block: u64) -> Self {
        Self {
            bundle: Bundle {
                transactions: Vec::new(),
                target_block,
                min_timestamp: None,
                max_timestamp: None,
                reverting_tx_hashes: Vec::new(),
            },
        }
    }

    pub fn add_transaction(mut self, tx: BundleTransaction) -> Self {
        self.bundle.transactions.push(tx);
        self
    }

    pub fn timestamp_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.bundle.min_timestamp = min;
        self.bundle.max_timestamp = max;
        self
    }

    pub fn allow_reverting(mut self, tx_hash: impl Into<String>) -> Self {
        self.bundle.reverting_tx_hashes.push(tx_hash.into());
        self
    }

    pub fn build(self) -> Bundle {
        self.bundle
    }
}

/// `eth_sendBundle`/`mev_sendBundle` JSON-RPC param shape (spec.md §4.9,
/// §6).
#[derive(Debug, Serialize)]
pub struct SendBundleParams {
    pub txs: Vec<String>,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "minTimestamp", skip_serializing_if = "Option::is_none")]
    pub min_timestamp: Option<u64>,
    #[serde(rename = "maxTimestamp", skip_serializing_if = "Option::is_none")]
    pub max_timestamp: Option<u64>,
    #[serde(rename = "revertingTxHashes", skip_serializing_if = "Vec::is_empty")]
    pub reverting_tx_hashes: Vec<String>,
}

impl Bundle {
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn to_send_bundle_params(&self) -> SendBundleParams {
        SendBundleParams {
            txs: self
                .transactions
                .iter()
                .map(|tx| tx.signed_raw_tx.to_string())
                .collect(),
            block_number: format!("0x{:x}", self.target_block),
            min_timestamp: self.min_timestamp,
            max_timestamp: self.max_timestamp,
            reverting_tx_hashes: self.reverting_tx_hashes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_expected_shape() {
        let bundle = BundleBuilder::new(100)
            .add_transaction(BundleTransaction {
                signed_raw_tx: Bytes::from(vec![0xde, 0xad]),
                tx_hash: "0xabc".into(),
            })
            .timestamp_range(Some(1), Some(2))
            .allow_reverting("0xabc")
            .build();
        assert_eq!(bundle.transaction_count(), 1);
        let params = bundle.to_send_bundle_params();
        assert_eq!(params.block_number, "0x64");
        assert_eq!(params.reverting_tx_hashes, vec!["0xabc".to_string()]);
    }
}
