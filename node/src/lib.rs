pub mod server;

pub use server::*;

use std::sync::Arc;
use std::time::Duration;
use wchain_core::LedgerService;

/// Everything the RPC handlers need, shared across requests.
pub struct NodeState {
    pub service: LedgerService,
    pub chain_id: u64,
    /// Upper bound on one `wcn_mineBlock` request before the search is cancelled.
    pub mining_timeout: Duration,
}

pub type NodeHandle = Arc<NodeState>;
