//! Configuration management.
//!
//! Secrets and endpoints come from the environment (`dotenv` + `std::env`);
//! structured, versionable data — the DEX registry seed table, relay list,
//! and token list — comes from an optional TOML file. `clap` provides the
//! CLI surface on top of both.

use crate::error::EngineError;
use crate::relay::{RelayConfig, RelayType};
use crate::types::{DEXConfig, TokenRef};
use alloy::primitives::{Address, U256};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(name = "arb-engine", about = "On-chain multi-DEX arbitrage engine")]
pub struct Cli {
    /// Path to the TOML config file (DEX registry, relay list, tokens).
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Chain id to run against; overrides `CHAIN_ID` if set.
    #[arg(long)]
    pub chain: Option<u64>,

    /// Discover and evaluate opportunities but never submit transactions.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub wallet_private_key: String,
    pub pool_cache_duration_minutes: u64,
    pub min_profit_threshold_wei: u128,
    pub enable_bloxroute: bool,
    pub bloxroute_auth_header: Option<String>,
    pub bloxroute_chains: Vec<u64>,
    pub gas_oracle_api_key: Option<String>,
    pub dry_run: bool,

    /// The external flash-loan arbitrage contract the executor calls
    /// (spec.md §6). Required only in live (non-dry-run) mode.
    pub flash_loan_contract: Address,
    pub start_amount_wei: U256,
    pub slippage_bps: u32,
    pub top_k: usize,
    pub min_gas_confidence: f64,
    pub min_hops: usize,
    pub max_hops: usize,
    pub scan_interval_secs: u64,
    pub pool_store_dir: PathBuf,

    pub dexes: Vec<DEXConfig>,
    pub relays: Vec<RelayConfig>,
    pub tokens: Vec<TokenRef>,
    pub public_rpc_url: String,
}

/// Structured, versionable config (`config::file`). Every section falls
/// back to an empty default so the file only needs to carry the overrides
/// a deployment actually wants to change.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    dexes: Vec<FileDexConfig>,
    #[serde(default)]
    relays: Vec<FileRelayConfig>,
    #[serde(default)]
    tokens: Vec<FileTokenConfig>,
    #[serde(default)]
    public_rpc_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileDexConfig {
    name: String,
    protocol: String,
    chain_id: u64,
    router: String,
    factory: String,
    init_code_hash: Option<String>,
    #[serde(default)]
    fee_bps: u32,
    #[serde(default = "default_gas_estimate")]
    gas_estimate: u64,
    #[serde(default)]
    liquidity_threshold: String,
    #[serde(default)]
    priority: u32,
    #[serde(default = "default_scale_factor")]
    v3_liquidity_scale_factor: f64,
}

fn default_gas_estimate() -> u64 {
    150_000
}

fn default_scale_factor() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct FileRelayConfig {
    #[serde(rename = "type")]
    relay_type: String,
    endpoint: String,
    auth_key: Option<String>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    priority: u32,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct FileTokenConfig {
    address: String,
    decimals: u8,
    symbol: String,
}

impl FileConfig {
    fn load(path: &std::path::Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| EngineError::config(format!("parsing {}: {e}", path.display())))
    }
}

fn parse_relay_type(s: &str) -> Result<RelayType, EngineError> {
    match s {
        "FlashbotsProtect" => Ok(RelayType::FlashbotsProtect),
        "MEVShare" => Ok(RelayType::MEVShare),
        "BuilderRPC" => Ok(RelayType::BuilderRPC),
        "Bloxroute" => Ok(RelayType::Bloxroute),
        "PublicRPC" => Ok(RelayType::PublicRPC),
        other => Err(EngineError::config(format!("unknown relay type: {other}"))),
    }
}

fn parse_protocol(s: &str) -> Result<crate::types::Protocol, EngineError> {
    use crate::types::Protocol::*;
    match s {
        "UniswapV2" => Ok(UniswapV2),
        "UniswapV3" => Ok(UniswapV3),
        "SushiSwap" => Ok(SushiSwap),
        "SushiSwapV3" => Ok(SushiSwapV3),
        "Algebra" => Ok(Algebra),
        "Aerodrome" => Ok(Aerodrome),
        "Curve" => Ok(Curve),
        "Balancer" => Ok(Balancer),
        "SolidlyVelodrome" => Ok(SolidlyVelodrome),
        other => Err(EngineError::config(format!("unknown protocol: {other}"))),
    }
}

fn parse_address(field: &str, s: &str) -> Result<Address, EngineError> {
    Address::from_str(s).map_err(|e| EngineError::config(format!("{field} is not a valid address: {e}")))
}

fn parse_init_code_hash(s: &str) -> Result<[u8; 32], EngineError> {
    let trimmed = s.trim_start_matches("0x");
    let bytes = alloy::primitives::hex::decode(trimmed)
        .map_err(|e| EngineError::config(format!("invalid init_code_hash: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| EngineError::config("init_code_hash must be 32 bytes".to_string()))
}

/// `DEXConfig::dex` is a legacy display/fee-tier tag retained for the V3
/// fee helpers; file-configured entries get a reasonable default per
/// protocol since the TOML schema only names the protocol, not the exact
/// historical `DexType` variant.
fn default_dex_type(protocol: crate::types::Protocol) -> crate::types::DexType {
    use crate::types::DexType::*;
    use crate::types::Protocol;
    match protocol {
        Protocol::UniswapV2 => Uniswap,
        Protocol::SushiSwap => Sushiswap,
        Protocol::UniswapV3 => UniswapV3_030,
        Protocol::SushiSwapV3 => SushiV3_030,
        Protocol::Algebra => QuickswapV3,
        // Solidly/Curve/Balancer forks carry V2-shaped reserves+CREATE2
        // addressing in this registry; reuse the V2 fee sentinel tag.
        _ => QuickSwapV2,
    }
}

/// Maps well-known chain ids to the short name used in their `{CHAIN}_RPC_URL`
/// env key (spec.md §6, e.g. `BASE_RPC_URL`). Chains outside this table fall
/// back to a numeric key.
fn chain_env_name(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("ETH"),
        10 => Some("OPTIMISM"),
        56 => Some("BSC"),
        137 => Some("POLYGON"),
        8453 => Some("BASE"),
        42161 => Some("ARBITRUM"),
        43114 => Some("AVALANCHE"),
        _ => None,
    }
}

/// Loads environment variables, merges the TOML file, and applies CLI
/// overrides (spec.md §6 env keys; SPEC_FULL §4.11).
pub fn load(cli: &Cli) -> Result<EngineConfig, EngineError> {
    dotenv::dotenv().ok();

    let chain_id = cli
        .chain
        .or_else(|| std::env::var("CHAIN_ID").ok().and_then(|v| v.parse().ok()))
        .ok_or_else(|| EngineError::config("CHAIN_ID not set"))?;

    let named_rpc_url = chain_env_name(chain_id).and_then(|name| std::env::var(format!("{name}_RPC_URL")).ok());
    let rpc_url = named_rpc_url
        .ok_or(())
        .or_else(|_| std::env::var(format!("CHAIN_{chain_id}_RPC_URL")).map_err(|_| ()))
        .or_else(|_| std::env::var("RPC_URL").map_err(|_| ()))
        .map_err(|_| EngineError::config(format!("no RPC URL configured for chain {chain_id}")))?;

    let wallet_private_key = std::env::var("WALLET_PRIVATE_KEY")
        .map_err(|_| EngineError::config("WALLET_PRIVATE_KEY not set"))?;

    let pool_cache_duration_minutes = std::env::var("POOL_CACHE_DURATION")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(crate::pool::store::POOL_CACHE_DURATION_MINUTES);

    let min_profit_threshold_wei = std::env::var("MIN_PROFIT_THRESHOLD")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let enable_bloxroute = std::env::var("ENABLE_BLOXROUTE")
        .ok()
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let bloxroute_auth_header = std::env::var("BLOXROUTE_AUTH_HEADER").ok();

    let bloxroute_chains = std::env::var("BLOXROUTE_CHAINS")
        .ok()
        .map(|v| v.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();

    let gas_oracle_api_key = std::env::var("GAS_ORACLE_API_KEY").ok();

    let flash_loan_contract = match std::env::var("FLASH_LOAN_CONTRACT_ADDRESS") {
        Ok(v) => parse_address("FLASH_LOAN_CONTRACT_ADDRESS", &v)?,
        Err(_) if cli.dry_run => Address::ZERO,
        Err(_) => return Err(EngineError::config("FLASH_LOAN_CONTRACT_ADDRESS not set (required outside --dry-run)")),
    };

    let start_amount_wei = std::env::var("START_AMOUNT_WEI")
        .ok()
        .and_then(|v| U256::from_str(&v).ok())
        .unwrap_or_else(|| U256::from(10u64).pow(U256::from(18u64)));

    let slippage_bps = std::env::var("SLIPPAGE_BPS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(50);

    let top_k = std::env::var("TOP_K").ok().and_then(|v| v.parse().ok()).unwrap_or(5);

    let min_gas_confidence = std::env::var("MIN_GAS_CONFIDENCE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.5);

    let min_hops = std::env::var("MIN_HOPS").ok().and_then(|v| v.parse().ok()).unwrap_or(2);
    let max_hops = std::env::var("MAX_HOPS").ok().and_then(|v| v.parse().ok()).unwrap_or(3);

    let scan_interval_secs = std::env::var("SCAN_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(12);

    let pool_store_dir = std::env::var("POOL_STORE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data/pool_store"));

    let file_config = FileConfig::load(&cli.config)?;

    let dexes = file_config
        .dexes
        .into_iter()
        .filter(|d| d.chain_id == chain_id)
        .map(|d| {
            let protocol = parse_protocol(&d.protocol)?;
            Ok(DEXConfig {
                name: d.name,
                protocol,
                dex: default_dex_type(protocol),
                chain_id: d.chain_id,
                router: parse_address("router", &d.router)?,
                factory: parse_address("factory", &d.factory)?,
                init_code_hash: d.init_code_hash.as_deref().map(parse_init_code_hash).transpose()?,
                fee_bps: d.fee_bps,
                gas_estimate: d.gas_estimate,
                liquidity_threshold: d.liquidity_threshold.parse().unwrap_or_default(),
                priority: d.priority,
                v3_liquidity_scale_factor: d.v3_liquidity_scale_factor,
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    let mut relays = file_config
        .relays
        .into_iter()
        .map(|r| {
            Ok(RelayConfig {
                relay_type: parse_relay_type(&r.relay_type)?,
                endpoint: r.endpoint,
                auth_key: r.auth_key,
                enabled: r.enabled,
                priority: r.priority,
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    // `ENABLE_BLOXROUTE`/`BLOXROUTE_AUTH_HEADER`/`BLOXROUTE_CHAINS` (spec.md
    // §6) add a bloXroute relay on top of whatever the TOML file configures,
    // gated to the chains the operator opted it into (empty list = all
    // chains) — a config-file `relays` entry of type `Bloxroute` still takes
    // precedence if one is already present.
    if enable_bloxroute
        && (bloxroute_chains.is_empty() || bloxroute_chains.contains(&chain_id))
        && !relays.iter().any(|r| r.relay_type == RelayType::Bloxroute)
    {
        relays.push(RelayConfig {
            relay_type: RelayType::Bloxroute,
            endpoint: "https://api.blxrbdn.com".to_string(),
            auth_key: bloxroute_auth_header.clone(),
            enabled: true,
            priority: 50,
        });
    }

    let tokens = file_config
        .tokens
        .into_iter()
        .map(|t| Ok(TokenRef::new(parse_address("token.address", &t.address)?, t.decimals, t.symbol)))
        .collect::<Result<Vec<_>, EngineError>>()?;

    let public_rpc_url = file_config.public_rpc_url.unwrap_or_else(|| rpc_url.clone());

    Ok(EngineConfig {
        chain_id,
        rpc_url,
        wallet_private_key,
        pool_cache_duration_minutes,
        min_profit_threshold_wei,
        enable_bloxroute,
        bloxroute_auth_header,
        bloxroute_chains,
        gas_oracle_api_key,
        dry_run: cli.dry_run,
        flash_loan_contract,
        start_amount_wei,
        slippage_bps,
        top_k,
        min_gas_confidence,
        min_hops,
        max_hops,
        scan_interval_secs,
        pool_store_dir,
        dexes,
        relays,
        tokens,
        public_rpc_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_relay_type_rejects_unknown() {
        assert!(parse_relay_type("NotARelay").is_err());
        assert!(matches!(parse_relay_type("Bloxroute"), Ok(RelayType::Bloxroute)));
    }

    #[test]
    fn parse_init_code_hash_requires_32_bytes() {
        assert!(parse_init_code_hash("0x1234").is_err());
        let full = "0x".to_string() + &"ab".repeat(32);
        assert!(parse_init_code_hash(&full).is_ok());
    }

    #[test]
    fn chain_env_name_matches_spec_example() {
        assert_eq!(chain_env_name(8453), Some("BASE"));
        assert_eq!(chain_env_name(999_999), None);
    }

    #[test]
    fn empty_file_config_has_no_dexes() {
        let cfg = FileConfig::default();
        assert!(cfg.dexes.is_empty());
        assert!(cfg.relays.is_empty());
    }
}
