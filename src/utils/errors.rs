use alloy::primitives::{Address, TxHash, U256};
use std::time::Duration;
use thiserror::Error;

use crate::networks::NetworkIdentity;

/// Unified error type for the harness
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Transport error on {network}: {message}")]
    Transport { network: NetworkIdentity, message: String },

    #[error("Transaction {tx_hash} on {network} not included after {waited:?}")]
    Timeout { network: NetworkIdentity, tx_hash: TxHash, waited: Duration },

    #[error("Transaction {tx_hash} on {network} reverted")]
    Reverted { network: NetworkIdentity, tx_hash: TxHash },

    #[error("Ledger error: {0:#}")]
    Ledger(anyhow::Error),

    #[error("Insufficient funds in {funder}: need {needed} wei, have {available} wei")]
    FundingShortfall { funder: Address, needed: U256, available: U256 },

    #[error("Faucet request to {url} failed: {message}")]
    Faucet { url: String, message: String },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub fn transport(network: NetworkIdentity, err: impl std::fmt::Display) -> Self {
        Self::Transport { network, message: err.to_string() }
    }

    pub fn ledger(err: impl Into<anyhow::Error>) -> Self {
        Self::Ledger(err.into())
    }

    /// True for failures of the durable store rather than of the network or the test.
    pub fn is_harness_failure(&self) -> bool {
        matches!(self, Self::Ledger(_) | Self::Config(_) | Self::Io(_))
    }
}

/// Convenience alias
pub type Result<T> = std::result::Result<T, HarnessError>;
