//! Error kinds surfaced by the ledger engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("address not found: {0}")]
    UnknownAddress(String),

    #[error("insufficient funds: balance {have}, requested {need}")]
    InsufficientFunds { have: String, need: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("balance overflow for {0}")]
    BalanceOverflow(String),

    #[error("chain linkage error: {0}")]
    ChainLinkage(String),

    #[error("invalid block {index}: {reason}")]
    InvalidBlock { index: u64, reason: String },

    #[error("block {index} not found (chain height {height})")]
    NotFound { index: u64, height: u64 },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },
}

impl LedgerError {
    /// Stable name of the error kind, carried to RPC callers.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::UnknownAddress(_) => "UnknownAddress",
            LedgerError::InsufficientFunds { .. } => "InsufficientFunds",
            LedgerError::InvalidAmount(_) => "InvalidAmount",
            LedgerError::BalanceOverflow(_) => "BalanceOverflow",
            LedgerError::ChainLinkage(_) => "ChainLinkageError",
            LedgerError::InvalidBlock { .. } => "InvalidBlock",
            LedgerError::NotFound { .. } => "NotFound",
            LedgerError::Persistence(_) => "PersistenceError",
            LedgerError::MiningCancelled { .. } => "MiningCancelled",
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
