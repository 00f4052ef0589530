use crate::error::Result;
use crate::storage::{read_json, write_json_atomic};
use crate::transaction::Transaction;
use crate::types::Address;
use parking_lot::Mutex;
use std::path::PathBuf;

/// Admitted-but-unmined transactions in arrival order.
///
/// Every operation takes the inner lock once, so admits racing a drain land
/// either in the drained batch or in the pool afterwards, never both.
/// A pool opened from a file rewrites it under that same lock after each
/// change.
#[derive(Debug, Default)]
pub struct TransactionPool {
    pending: Mutex<Vec<Transaction>>,
    path: Option<PathBuf>,
}

impl TransactionPool {
    /// In-memory pool with no backing file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool mirrored to `path` (a JSON array), reloading whatever was pending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let pending: Vec<Transaction> = match read_json(&path)? {
            Some(pending) => pending,
            None => {
                write_json_atomic(&path, &Vec::<Transaction>::new())?;
                Vec::new()
            }
        };
        if !pending.is_empty() {
            log::info!(
                "Reloaded {} pending transactions from {}",
                pending.len(),
                path.display()
            );
        }
        Ok(TransactionPool {
            pending: Mutex::new(pending),
            path: Some(path),
        })
    }

    fn persist(&self, pending: &[Transaction]) -> Result<()> {
        match &self.path {
            Some(path) => write_json_atomic(path, pending),
            None => Ok(()),
        }
    }

    /// Queue `tx` at the end. Not admitted if the pool file cannot be written.
    pub fn admit(&self, tx: Transaction) -> Result<()> {
        let mut pending = self.pending.lock();
        pending.push(tx);
        if let Err(e) = self.persist(&pending) {
            pending.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Take every queued transaction, leaving the pool empty.
    pub fn drain_all(&self) -> Result<Vec<Transaction>> {
        let mut pending = self.pending.lock();
        self.persist(&[])?;
        Ok(std::mem::take(&mut *pending))
    }

    /// Return a drained batch to the front of the queue, ahead of anything
    /// admitted since the drain.
    ///
    /// The batch stays queued in memory even when the file write fails.
    pub fn requeue(&self, mut batch: Vec<Transaction>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut pending = self.pending.lock();
        batch.append(&mut *pending);
        *pending = batch;
        self.persist(&pending)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.pending.lock().clone()
    }

    pub fn count_from(&self, address: &Address) -> usize {
        self.pending
            .lock()
            .iter()
            .filter(|tx| &tx.from == address)
            .count()
    }
}
