//! Entry point: wires the config loader, chain provider, registry, pool
//! store, path finder, orchestrator, executor, and relay manager together
//! and drives the scan/execute loop described in spec.md §4.10 and §5.

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use arb_engine::config::{self, Cli};
use arb_engine::gas::GasOracle;
use arb_engine::orchestrator::{CycleConfig, Orchestrator};
use arb_engine::pathfinder::PathFinder;
use arb_engine::pool::{PoolFilter, PoolStore};
use arb_engine::relay::{RelayManager, SubmissionResult, SubmitOptions};
use arb_engine::{DexRegistry, Executor, OpportunityReport};
use clap::Parser;
use futures::stream::StreamExt;
use signal_hook_tokio::Signals;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = Level::from_str(&cli.log_level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    info!("arb-engine starting");

    let cfg = config::load(&cli).context("loading configuration")?;

    if cfg.dry_run {
        info!("running in --dry-run mode: opportunities will be logged, not submitted");
    }

    let provider = ProviderBuilder::new().connect_http(cfg.rpc_url.parse().context("invalid RPC_URL")?);
    let latest = provider
        .get_block_number()
        .await
        .context("failed to connect to RPC")?;
    info!(chain_id = cfg.chain_id, latest_block = latest, "connected to chain");

    let mut registry = DexRegistry::with_defaults();
    for dex in cfg.dexes.iter().cloned() {
        registry.add(dex);
    }
    registry.validate(&provider).await;
    info!(dexes = registry.len(), "dex registry ready");
    let registry_for_executor = registry.clone();

    let store = PoolStore::new(cfg.pool_store_dir.clone());
    if let Err(err) = store.load_from_disk(cfg.chain_id) {
        warn!(error = %err, "no usable pool store snapshot on disk, starting cold");
    }

    let filter = PoolFilter::permissive();
    let pathfinder = PathFinder::new(cfg.min_hops, cfg.max_hops);

    let orchestrator = Orchestrator::new(provider.clone(), registry, store, filter, pathfinder);
    let gas_oracle = GasOracle::new(provider.clone());

    let relay_manager = RelayManager::new(cfg.relays.clone(), cfg.public_rpc_url.clone());

    let signer_key = cfg.wallet_private_key.trim_start_matches("0x");
    let signer = PrivateKeySigner::from_str(signer_key).context("invalid WALLET_PRIVATE_KEY")?;
    let executor_address = signer.address();
    let executor = Executor::new(signer, cfg.chain_id, cfg.flash_loan_contract, cfg.dry_run);
    info!(wallet = %executor_address, "executor ready");

    let tokens: Vec<Address> = cfg.tokens.iter().map(|t| t.address).collect();
    let cycle_config = CycleConfig {
        chain_id: cfg.chain_id,
        tokens: tokens.clone(),
        start_tokens: tokens,
        start_amount: cfg.start_amount_wei,
        min_profit_threshold: alloy::primitives::I256::try_from(alloy::primitives::U256::from(cfg.min_profit_threshold_wei))
            .unwrap_or(alloy::primitives::I256::MAX),
        min_gas_confidence: cfg.min_gas_confidence,
        slippage_bps: cfg.slippage_bps,
        top_k: cfg.top_k,
    };

    let mut signals = Signals::new([signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM])
        .context("installing signal handler")?;
    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.scan_interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current_block = match provider.get_block_number().await {
                    Ok(b) => b,
                    Err(err) => {
                        warn!(error = %err, "failed to fetch current block, skipping cycle");
                        continue;
                    }
                };

                let reports = match orchestrator.run_cycle(&cycle_config, current_block).await {
                    Ok(r) => r,
                    Err(err) => {
                        let fatal = err.is_fatal();
                        error!(error = %err, "scan cycle failed");
                        if fatal {
                            return Err(anyhow::anyhow!(err).context("fatal engine error"));
                        }
                        continue;
                    }
                };

                for report in &reports {
                    info!(
                        net_profit = %report.net_profit,
                        hops = report.path.hops(),
                        "opportunity found"
                    );

                    if cfg.dry_run {
                        continue;
                    }

                    let outcome = submit_opportunity(
                        &executor,
                        &registry_for_executor,
                        &relay_manager,
                        &provider,
                        &gas_oracle,
                        cfg.chain_id,
                        report,
                        cfg.slippage_bps,
                    )
                    .await;

                    let succeeded = match outcome {
                        Ok(result) => {
                            info!(tx_hash = %result.tx_hash, relay = ?result.accepted_by, "submitted");
                            true
                        }
                        Err(err) => {
                            warn!(error = %err, "submission failed");
                            false
                        }
                    };
                    orchestrator.record_execution_result(report, current_block, succeeded).await;
                }

                let stats = orchestrator.get_stats();
                info!(
                    found = stats.opportunities_found,
                    before_gas = stats.profitable_before_gas,
                    after_gas = stats.profitable_after_gas,
                    blocked = stats.blocked_by_validation,
                    "cycle stats"
                );
            }
            signal = signals.next() => {
                if signal.is_some() {
                    info!("shutdown signal received, saving pool store and exiting");
                    if let Err(err) = orchestrator.store().save_to_disk(cfg.chain_id) {
                        warn!(error = %err, "failed to persist pool store on shutdown");
                    }
                    break;
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn submit_opportunity<P: Provider + Clone>(
    executor: &Executor,
    registry: &DexRegistry,
    relay_manager: &RelayManager,
    provider: &P,
    gas_oracle: &GasOracle<P>,
    chain_id: u64,
    report: &OpportunityReport,
    slippage_bps: u32,
) -> Result<SubmissionResult> {
    let calldata = executor
        .encode_calldata(report, registry, slippage_bps)
        .context("encoding flash-loan calldata")?;

    let nonce = provider
        .get_transaction_count(executor.address())
        .await
        .context("fetching nonce")?;

    let hop_gas: u64 = report.path.edges.iter().map(|e| e.gas_estimate).sum();

    // A full estimate happens inside the orchestrator's own cycle already;
    // this one covers the gap between that estimate and the moment the
    // signed transaction is actually built.
    let gas = gas_oracle.estimate(chain_id).await.context("fetching gas estimate for submission")?;

    let (signed_raw_tx, tx_hash) = executor
        .sign_transaction(calldata, nonce, hop_gas, &gas)
        .await
        .context("signing transaction")?;
    info!(tx_hash = %tx_hash, "transaction signed, submitting to relay");

    relay_manager
        .submit(&signed_raw_tx, &SubmitOptions::default())
        .await
        .context("relay submission")
}
