pub mod block;
pub mod blockchain;
pub mod config;
pub mod consensus;
pub mod error;
pub mod ledger;
pub mod mempool;
pub mod service;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod wallet;

// Explicit re-exports for the node and CLI crates
pub use block::Block;
pub use blockchain::Blockchain;
pub use error::{LedgerError, Result};
pub use mempool::TransactionPool;
pub use service::{LedgerService, LedgerSettings};
pub use transaction::Transaction;
pub use types::{Address, Balance, PrivateKey};
pub use wallet::{KeyGenerator, Secp256k1KeyGenerator, Wallet, WalletSummary};
