//! Execution glue: encodes an `OpportunityReport` into the flash-loan
//! contract's calldata, signs the resulting transaction, and hands the raw
//! signed bytes to the Private Relay Manager (C9) (spec.md §4.10 step 6,
//! §6 "Flash loan contract").
//!
//! Grounded on the bot's `arbitrage::executor::TradeExecutor` for the
//! overall shape (`dry_run` flag, wallet-scoped signer) — but where the
//! bot submits two sequential `swapExactTokensForTokens` calls (leg risk:
//! the buy can succeed while the sell reverts), this executor emits one
//! calldata blob for the atomic flash-loan contract's `executeArbitrage`,
//! matching spec.md §6's `(SwapStep[] path, address initiator)` ABI
//! exactly — the whole cycle either completes or the loan reverts.
//! Transaction signing follows the `TxEip1559`/`PrivateKeySigner`/
//! `TxEnvelope` raw-tx construction pattern used elsewhere in the pack
//! ahead of private relay submission.

use crate::contracts::IFlashArbExecutor::{self, SwapStep};
use crate::error::EngineError;
use crate::gas::GasEstimate;
use crate::profit;
use crate::registry::DexRegistry;
use crate::types::{is_v3_style, OpportunityReport};
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSigner;
use alloy::primitives::{aliases::U24, hex, Address, Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;

/// Flash-loan contract fixed gas overhead (loan setup/teardown) added on
/// top of the sum of per-hop `gas_estimate`s when sizing the transaction's
/// gas limit.
const FLASH_LOAN_GAS_OVERHEAD: u64 = 120_000;

/// Signs and encodes opportunities for one wallet against one flash-loan
/// contract deployment. `dry_run` gates whether the orchestrator is
/// allowed to forward the signed transaction to the relay manager — the
/// signing itself still runs so logs show exactly what would have been
/// submitted.
pub struct Executor {
    signer: PrivateKeySigner,
    chain_id: u64,
    contract_address: Address,
    dry_run: bool,
}

impl Executor {
    pub fn new(signer: PrivateKeySigner, chain_id: u64, contract_address: Address, dry_run: bool) -> Self {
        Self {
            signer,
            chain_id,
            contract_address,
            dry_run,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Encodes `report`'s path as `SwapStep[]`, applying per-hop slippage
    /// protection computed from `profit::simulate_path_intermediates`
    /// rather than only protecting the final leg.
    pub fn encode_calldata(
        &self,
        report: &OpportunityReport,
        registry: &DexRegistry,
        slippage_bps: u32,
    ) -> Result<Bytes, EngineError> {
        let intermediates = profit::simulate_path_intermediates(&report.path, report.input_amount)
            .ok_or_else(|| EngineError::overflow("path no longer simulates cleanly at encode time"))?;

        let mut path = Vec::with_capacity(report.path.edges.len());
        for (edge, &out) in report.path.edges.iter().zip(intermediates.iter()) {
            let cfg = registry
                .get(&edge.dex_name)
                .ok_or_else(|| EngineError::config(format!("no registry entry for dex {}", edge.dex_name)))?;
            let min_out = profit::min_out_with_slippage(out, slippage_bps);
            path.push(SwapStep {
                pool: edge.pool_address,
                tokenIn: edge.token_in,
                tokenOut: edge.token_out,
                fee: U24::from(cfg.dex.atomic_fee()),
                minOut: min_out,
                dexType: if is_v3_style(cfg.protocol) { 0 } else { 1 },
            });
        }

        let call = IFlashArbExecutor::executeArbitrageCall {
            path,
            initiator: self.signer.address(),
        };
        Ok(Bytes::from(call.abi_encode()))
    }

    /// Signs an EIP-1559 transaction calling the flash-loan contract with
    /// `calldata`. Returns `(signed_raw_tx_hex, tx_hash_hex)`, ready for
    /// `RelayManager::submit`.
    pub async fn sign_transaction(
        &self,
        calldata: Bytes,
        nonce: u64,
        hop_gas_estimate: u64,
        gas: &GasEstimate,
    ) -> Result<(String, String), EngineError> {
        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit: hop_gas_estimate + FLASH_LOAN_GAS_OVERHEAD,
            max_fee_per_gas: gas.max_fee.to::<u128>(),
            max_priority_fee_per_gas: gas.priority_fee.to::<u128>(),
            to: TxKind::Call(self.contract_address),
            value: U256::ZERO,
            access_list: Default::default(),
            input: calldata,
        };

        let signature = self
            .signer
            .sign_transaction(&mut tx)
            .await
            .map_err(|e| EngineError::submission(format!("signing failed: {e}")))?;
        let signed = tx.into_signed(signature);
        let tx_hash = signed.hash().to_string();
        let raw = TxEnvelope::Eip1559(signed).encoded_2718();
        Ok((format!("0x{}", hex::encode(raw)), tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DEXConfig, DexType, PoolEdge, Protocol};
    use alloy::primitives::{address, I256};

    fn test_registry() -> DexRegistry {
        let mut registry = DexRegistry::new();
        registry.add(DEXConfig {
            name: "test-v2".into(),
            protocol: Protocol::UniswapV2,
            dex: DexType::QuickSwapV2,
            chain_id: 137,
            router: Address::ZERO,
            factory: Address::ZERO,
            init_code_hash: Some([0u8; 32]),
            fee_bps: 30,
            gas_estimate: 120_000,
            liquidity_threshold: U256::ZERO,
            priority: 0,
            v3_liquidity_scale_factor: 1.0,
        });
        registry
    }

    fn sample_report() -> OpportunityReport {
        let a = address!("0000000000000000000000000000000000000001");
        let b = address!("0000000000000000000000000000000000000002");
        let pool = address!("0000000000000000000000000000000000000010");
        let edges = vec![
            PoolEdge {
                pool_address: pool,
                dex_name: "test-v2".into(),
                token_in: a,
                token_out: b,
                reserve0: U256::from(1_000_000u64),
                reserve1: U256::from(1_000_000u64),
                fee: 0.003,
                gas_estimate: 120_000,
            },
            PoolEdge {
                pool_address: address!("0000000000000000000000000000000000000011"),
                dex_name: "test-v2".into(),
                token_in: b,
                token_out: a,
                reserve0: U256::from(1_000_000u64),
                reserve1: U256::from(1_000_000u64),
                fee: 0.003,
                gas_estimate: 120_000,
            },
        ];
        let path = crate::types::ArbitragePath::new(edges).unwrap();
        OpportunityReport {
            path,
            input_amount: U256::from(1_000u64),
            output_amount: U256::from(990u64),
            gross_profit: I256::try_from(-10).unwrap(),
            gas_cost: U256::from(1u64),
            net_profit: I256::try_from(-11).unwrap(),
            confidence: 1.0,
        }
    }

    #[test]
    fn encode_calldata_maps_dex_type_and_fee() {
        let signer = PrivateKeySigner::random();
        let executor = Executor::new(signer, 137, Address::ZERO, true);
        let registry = test_registry();
        let report = sample_report();

        let calldata = executor.encode_calldata(&report, &registry, 50).unwrap();
        assert!(!calldata.is_empty());
    }

    #[test]
    fn encode_calldata_fails_for_unknown_dex() {
        let signer = PrivateKeySigner::random();
        let executor = Executor::new(signer, 137, Address::ZERO, true);
        let registry = DexRegistry::new(); // empty — "test-v2" unknown
        let report = sample_report();

        assert!(executor.encode_calldata(&report, &registry, 50).is_err());
    }

    #[tokio::test]
    async fn sign_transaction_produces_distinct_hash_per_nonce() {
        let signer = PrivateKeySigner::random();
        let executor = Executor::new(signer, 137, Address::ZERO, true);
        let gas = GasEstimate::for_test(U256::from(2_000_000_000u64), U256::from(1_000_000_000u64));

        let (raw_a, hash_a) = executor
            .sign_transaction(Bytes::from(vec![0xde, 0xad]), 0, 120_000, &gas)
            .await
            .unwrap();
        let (raw_b, hash_b) = executor
            .sign_transaction(Bytes::from(vec![0xde, 0xad]), 1, 120_000, &gas)
            .await
            .unwrap();

        assert!(raw_a.starts_with("0x"));
        assert_ne!(hash_a, hash_b);
        assert_ne!(raw_a, raw_b);
    }
}
