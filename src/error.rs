//! Error taxonomy for the arbitrage engine.
//!
//! The seven members below are the ones spec'd at module boundaries
//! (scanner, calculator, relay manager) where callers need to match on
//! error kind. Internal plumbing still uses `anyhow::Context` the way the
//! rest of the crate does; `anyhow::Error` wraps `EngineError` at the
//! outer edges.

use thiserror::Error;

/// Closed taxonomy of engine-level errors. Config and Invariant errors halt
/// the process; Transport/Protocol/Liquidity errors are recovered locally by
/// discarding the affected pool/edge/path; Submission errors surface to the
/// caller but do not halt the orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing/invalid env var, malformed address, malformed private key.
    /// Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// RPC/HTTPS failure or timeout. Scanner treats this as a per-pool
    /// failure; it does not propagate past the fetch that produced it
    /// unless the whole batch failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed contract response or ABI decode failure. The affected
    /// pool/edge is dropped; not fatal.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Pool exists but fails the liquidity threshold. Silently dropped.
    #[error("liquidity below threshold: {0}")]
    Liquidity(String),

    /// Intermediate arithmetic overflow during profitability simulation.
    /// The path is dropped as unsafe.
    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    /// All relays refused and fallback was disabled or also failed.
    /// Propagated to the executor; the opportunity is discarded.
    #[error("submission failed: {0}")]
    Submission(String),

    /// A data-model invariant was breached (e.g. an edge pair with
    /// differing reserves). Panics in debug builds, logs and drops in
    /// release — see `invariant_violation!`.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn liquidity(msg: impl Into<String>) -> Self {
        Self::Liquidity(msg.into())
    }

    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::Overflow(msg.into())
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// True for the two kinds that must halt the process rather than be
    /// recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Config(_) | EngineError::Invariant(_))
    }
}

/// Raise an `EngineError::Invariant`: panics in debug builds, logs and
/// returns the error in release, matching spec.md §7's differentiated
/// behavior for `InvariantViolation`.
#[macro_export]
macro_rules! invariant_violation {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        if cfg!(debug_assertions) {
            panic!("invariant violation: {}", msg);
        } else {
            tracing::error!(invariant = %msg, "invariant violation");
            $crate::error::EngineError::invariant(msg)
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds() {
        assert!(EngineError::config("x").is_fatal());
        assert!(EngineError::invariant("x").is_fatal());
        assert!(!EngineError::transport("x").is_fatal());
        assert!(!EngineError::protocol("x").is_fatal());
        assert!(!EngineError::liquidity("x").is_fatal());
        assert!(!EngineError::overflow("x").is_fatal());
        assert!(!EngineError::submission("x").is_fatal());
    }

    #[test]
    fn display_messages_carry_through() {
        let e = EngineError::transport("timed out after 30s");
        assert_eq!(e.to_string(), "transport error: timed out after 30s");
    }
}
