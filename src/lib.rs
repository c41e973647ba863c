//! On-chain multi-DEX arbitrage engine.
//!
//! Discovers pools across a configurable DEX registry, enumerates cyclic
//! trade paths, simulates profitability against live reserves, and submits
//! profitable opportunities through a private relay with public-mempool
//! fallback.

pub mod config;
pub mod contracts;
pub mod error;
pub mod executor;
pub mod gas;
pub mod graph;
pub mod multicall;
pub mod orchestrator;
pub mod pathfinder;
pub mod pool;
pub mod profit;
pub mod registry;
pub mod relay;
pub mod types;

pub use error::EngineError;
pub use executor::Executor;
pub use orchestrator::Orchestrator;
pub use registry::DexRegistry;
pub use types::{ArbitragePath, DEXConfig, OpportunityReport, PoolEdge};
