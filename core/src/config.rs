// Chain constants for the wChain ledger node

// ========== Proof of Work ==========
/// Leading zero hex characters required for mined blocks
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Genesis is sealed at this difficulty by a short deterministic search
pub const GENESIS_DIFFICULTY: u32 = 1;

/// Fixed genesis timestamp (unix seconds)
pub const GENESIS_TIMESTAMP: i64 = 1_730_000_000;

/// Previous-hash sentinel carried by the genesis block
pub fn genesis_previous_hash() -> String {
    "0".repeat(64)
}

// ========== Network Identity ==========
/// Chain id reported by `wcn_chainId` / `net_version`
pub const CHAIN_ID: u64 = 14006;

pub const NETWORK_NAME: &str = "Open wChain Network";
pub const SYMBOL: &str = "WCN";

// ========== Fee Quotes ==========
// No fee market exists; these are the fixed quotes wallets expect to see.

/// 5 gwei
pub const GAS_PRICE_QUOTE: u64 = 5_000_000_000;

/// Plain transfer gas
pub const GAS_ESTIMATE_QUOTE: u64 = 21_000;

// ========== Storage Layout ==========
pub const WALLETS_FILE: &str = "wallets.json";
pub const CHAIN_FILE: &str = "blocks.json";
pub const POOL_FILE: &str = "tx_pool.json";

// ========== Request Limits ==========
/// Upper bound on wallets created by one `addWallets` call
pub const MAX_WALLETS_PER_REQUEST: usize = 1_000;
