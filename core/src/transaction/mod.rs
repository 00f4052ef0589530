use crate::types::{Address, Balance};
use serde::{Deserialize, Serialize};

/// A value transfer recorded in the pool and, once mined, in a block.
///
/// Field order is part of the block hash preimage; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub value: Balance,
    pub timestamp: i64, // unix seconds
}

impl Transaction {
    /// Stamp a transfer with the current time.
    pub fn new(from: Address, to: Address, value: Balance) -> Self {
        Transaction {
            from,
            to,
            value,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
