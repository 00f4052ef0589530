//! Ledger service: the operations behind every RPC method.
//!
//! Lock order (when nested): mining -> wallets -> chain. Wallet mutations
//! hold the wallet lock across mutate + persist. The proof-of-work search
//! holds only the mining lock; the chain write lock is taken just for the
//! append.

use crate::block::Block;
use crate::blockchain::Blockchain;
use crate::config::{
    CHAIN_FILE, DEFAULT_DIFFICULTY, MAX_WALLETS_PER_REQUEST, POOL_FILE, WALLETS_FILE,
};
use crate::consensus;
use crate::error::{LedgerError, Result};
use crate::ledger::BalanceLedger;
use crate::mempool::TransactionPool;
use crate::storage::{read_json, write_json_atomic};
use crate::transaction::Transaction;
use crate::types::{Address, Balance};
use crate::wallet::{KeyGenerator, Wallet, WalletSummary};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Leading zero hex characters required for mined blocks.
    pub difficulty: u32,
    /// Upper bound on nonces tried per mining request; `None` searches until
    /// cancelled.
    pub max_mining_attempts: Option<u64>,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_mining_attempts: None,
        }
    }
}

#[derive(Deserialize)]
struct WalletFile {
    wallets: Vec<Wallet>,
}

#[derive(Serialize)]
struct WalletFileRef<'a> {
    wallets: &'a [Wallet],
}

/// Balance ledger plus the file it is mirrored to.
struct WalletBook {
    ledger: BalanceLedger,
    path: PathBuf,
}

impl WalletBook {
    fn open(path: PathBuf) -> Result<Self> {
        match read_json::<WalletFile>(&path)? {
            Some(file) => {
                let ledger = BalanceLedger::from_wallets(file.wallets)?;
                log::info!("Loaded {} wallets from {}", ledger.len(), path.display());
                Ok(WalletBook { ledger, path })
            }
            None => {
                let book = WalletBook {
                    ledger: BalanceLedger::new(),
                    path,
                };
                book.persist()?;
                log::info!("Created empty wallet file at {}", book.path.display());
                Ok(book)
            }
        }
    }

    fn persist(&self) -> Result<()> {
        write_json_atomic(
            &self.path,
            &WalletFileRef {
                wallets: self.ledger.wallets(),
            },
        )
    }
}

pub struct LedgerService {
    settings: LedgerSettings,
    wallets: Mutex<WalletBook>,
    pool: Arc<TransactionPool>,
    chain: RwLock<Blockchain>,
    mining: Mutex<()>,
    keygen: Box<dyn KeyGenerator>,
}

impl LedgerService {
    /// Open (or initialise) the wallet, chain and pool files under `data_dir`.
    pub fn open(
        data_dir: &Path,
        settings: LedgerSettings,
        keygen: Box<dyn KeyGenerator>,
    ) -> Result<Self> {
        let wallets = WalletBook::open(data_dir.join(WALLETS_FILE))?;
        let chain = Blockchain::open(data_dir.join(CHAIN_FILE), settings.difficulty)?;
        let pool = Arc::new(TransactionPool::open(data_dir.join(POOL_FILE))?);

        log::info!(
            "Ledger ready: {} wallets, chain height {}, {} pending, difficulty {}",
            wallets.ledger.len(),
            chain.height(),
            pool.len(),
            settings.difficulty
        );

        Ok(LedgerService {
            settings,
            wallets: Mutex::new(wallets),
            pool,
            chain: RwLock::new(chain),
            mining: Mutex::new(()),
            keygen,
        })
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn pool(&self) -> &Arc<TransactionPool> {
        &self.pool
    }

    /// Create `count` zero-balance wallets and persist them. At most
    /// `MAX_WALLETS_PER_REQUEST` per call.
    pub fn seed_wallets(&self, count: usize) -> Result<Vec<Address>> {
        if count > MAX_WALLETS_PER_REQUEST {
            return Err(LedgerError::InvalidAmount(format!(
                "cannot create {} wallets at once (limit {})",
                count, MAX_WALLETS_PER_REQUEST
            )));
        }

        let mut book = self.wallets.lock();
        let before = book.ledger.len();

        let mut created = Vec::new();
        for _ in 0..count {
            let (address, private_key) = self.keygen.generate();
            if book.ledger.insert(Wallet::new(address.clone(), private_key)) {
                created.push(address);
            } else {
                log::warn!("Key generator produced an existing address {}, skipped", address);
            }
        }

        if let Err(e) = book.persist() {
            log::error!("Failed to persist seeded wallets: {}", e);
            book.ledger.truncate(before);
            return Err(e);
        }

        log::info!("Seeded {} wallets (total {})", created.len(), book.ledger.len());
        Ok(created)
    }

    /// Credit `amount` to an existing wallet. Returns the new balance.
    pub fn add_balance(&self, address: &Address, amount: Balance) -> Result<Balance> {
        let mut book = self.wallets.lock();
        let previous = book.ledger.balance(address)?;
        let updated = book.ledger.credit(address, amount)?;

        if let Err(e) = book.persist() {
            log::error!("Failed to persist balance of {}: {}", address, e);
            book.ledger.restore_balance(address, previous);
            return Err(e);
        }

        log::info!("Credited {} to {} (balance {})", amount, address, updated);
        Ok(updated)
    }

    /// Move `value` between wallets now and queue the record for mining.
    ///
    /// Balances settle at send time; the pooled transaction has no further
    /// economic effect when it is mined.
    pub fn send_transaction(
        &self,
        from: &Address,
        to: &Address,
        value: Balance,
    ) -> Result<Transaction> {
        let mut book = self.wallets.lock();
        let sender_before = book.ledger.balance(from)?;
        let receiver_before = book.ledger.balance(to)?;

        if let Err(e) = book.ledger.transfer(from, to, value) {
            log::warn!("Rejected transfer {} -> {} of {}: {}", from, to, value, e);
            return Err(e);
        }

        if let Err(e) = book.persist() {
            log::error!("Failed to persist transfer {} -> {}: {}", from, to, e);
            book.ledger.restore_balance(to, receiver_before);
            book.ledger.restore_balance(from, sender_before);
            return Err(e);
        }

        let tx = Transaction::new(from.clone(), to.clone(), value);
        if let Err(e) = self.pool.admit(tx.clone()) {
            log::error!("Failed to queue transfer {} -> {}: {}", from, to, e);
            book.ledger.restore_balance(to, receiver_before);
            book.ledger.restore_balance(from, sender_before);
            if let Err(undo) = book.persist() {
                log::error!("Failed to restore wallet file after pool error: {}", undo);
            }
            return Err(e);
        }
        log::info!(
            "Transfer {} -> {} of {} admitted ({} pending)",
            from,
            to,
            value,
            self.pool.len()
        );
        Ok(tx)
    }

    /// Drain the pool into a new block on top of the tip.
    ///
    /// If the search is cancelled or the append fails, the drained
    /// transactions go back to the front of the pool.
    pub fn mine_block(&self, cancel_flag: &AtomicBool) -> Result<Block> {
        let _mining = self.mining.lock();

        let (index, previous_hash) = {
            let chain = self.chain.read();
            let tip = chain.tip()?;
            (tip.index + 1, tip.hash.clone())
        };

        let transactions = self.pool.drain_all()?;
        log::info!(
            "⛏️  Mining block {} with {} transactions (difficulty {})",
            index,
            transactions.len(),
            self.settings.difficulty
        );

        let block = match consensus::mine_block(
            index,
            previous_hash,
            &transactions,
            self.settings.difficulty,
            cancel_flag,
            self.settings.max_mining_attempts,
        ) {
            Ok(block) => block,
            Err(e) => {
                self.requeue(transactions);
                return Err(e);
            }
        };

        if let Err(e) = self.chain.write().append(block.clone()) {
            self.requeue(transactions);
            return Err(e);
        }

        log::info!("✅ Mined block {} hash={} nonce={}", block.index, block.hash, block.nonce);
        Ok(block)
    }

    fn requeue(&self, transactions: Vec<Transaction>) {
        if let Err(e) = self.pool.requeue(transactions) {
            log::error!("Requeued transactions are not on disk: {}", e);
        }
    }

    pub fn get_balance(&self, address: &Address) -> Result<Balance> {
        self.wallets.lock().ledger.balance(address)
    }

    pub fn get_block_by_index(&self, index: u64) -> Result<Block> {
        self.chain.read().get_by_index(index).cloned()
    }

    pub fn latest_block(&self) -> Result<Block> {
        self.chain.read().tip().cloned()
    }

    pub fn chain_height(&self) -> u64 {
        self.chain.read().height()
    }

    pub fn list_wallets(&self) -> Vec<WalletSummary> {
        self.wallets.lock().ledger.summaries()
    }

    /// Transactions sent by `address`, mined and pending.
    pub fn transaction_count(&self, address: &Address) -> usize {
        self.chain.read().count_sent_by(address) + self.pool.count_from(address)
    }

    pub fn pending_count(&self) -> usize {
        self.pool.len()
    }
}
