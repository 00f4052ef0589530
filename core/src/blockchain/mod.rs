use crate::block::{Block, meets_difficulty};
use crate::config::{GENESIS_DIFFICULTY, genesis_previous_hash};
use crate::consensus::seal_genesis;
use crate::error::{LedgerError, Result};
use crate::storage::{read_json, write_json_atomic};
use crate::types::Address;
use std::path::{Path, PathBuf};

/// Block store: the hash-linked chain held in memory and mirrored to a JSON
/// file, rewritten atomically on every append.
///
/// This structure is the only writer of the chain file. It guarantees:
/// - blocks[0] is the genesis block
/// - blocks[i].index == i and blocks[i].previous_hash == blocks[i - 1].hash
/// - every stored hash matches its block contents
/// - every block after genesis meets at least `min_difficulty`
pub struct Blockchain {
    path: PathBuf,
    blocks: Vec<Block>,
    min_difficulty: u32,
}

impl Blockchain {
    /// Load the persisted chain, or create and persist genesis when there is
    /// none. A chain file that fails verification is reported, not repaired.
    ///
    /// `min_difficulty` is the floor for every non-genesis block, whatever
    /// difficulty the block records for itself.
    pub fn open(path: impl Into<PathBuf>, min_difficulty: u32) -> Result<Self> {
        let path = path.into();
        let blocks: Vec<Block> = read_json(&path)?.unwrap_or_default();

        let mut chain = Blockchain {
            path,
            blocks,
            min_difficulty,
        };
        if chain.blocks.is_empty() {
            log::info!("No chain found at {}, creating genesis block", chain.path.display());
            chain.create_genesis()?;
        } else {
            Self::verify_chain(&chain.blocks, chain.min_difficulty)?;
            log::info!(
                "Loaded chain from {}: height {}, tip {}",
                chain.path.display(),
                chain.height(),
                chain.blocks.last().map(|b| b.hash.as_str()).unwrap_or_default()
            );
        }
        Ok(chain)
    }

    fn create_genesis(&mut self) -> Result<()> {
        let genesis = seal_genesis()?;
        self.blocks = vec![genesis];
        if let Err(e) = self.persist() {
            self.blocks.clear();
            return Err(e);
        }
        Ok(())
    }

    fn verify_genesis(block: &Block) -> Result<()> {
        if block.index != 0 {
            return Err(LedgerError::ChainLinkage(format!(
                "first block has index {}, expected 0",
                block.index
            )));
        }
        if block.previous_hash != genesis_previous_hash() {
            return Err(LedgerError::ChainLinkage(
                "genesis block does not carry the sentinel previous hash".to_string(),
            ));
        }
        if !block.transactions.is_empty() {
            return Err(LedgerError::InvalidBlock {
                index: 0,
                reason: format!("genesis carries {} transactions", block.transactions.len()),
            });
        }
        if block.difficulty != GENESIS_DIFFICULTY {
            return Err(LedgerError::InvalidBlock {
                index: 0,
                reason: format!(
                    "genesis difficulty {} != {}",
                    block.difficulty, GENESIS_DIFFICULTY
                ),
            });
        }
        if !block.hash_is_consistent()? {
            return Err(LedgerError::InvalidBlock {
                index: 0,
                reason: "hash does not match contents".to_string(),
            });
        }
        Ok(())
    }

    /// Check that `block` may follow `prev` and was sealed at no less than
    /// `min_difficulty`.
    pub fn validate_successor(prev: &Block, block: &Block, min_difficulty: u32) -> Result<()> {
        if block.index != prev.index + 1 {
            return Err(LedgerError::ChainLinkage(format!(
                "block index {} does not follow tip index {}",
                block.index, prev.index
            )));
        }
        if block.previous_hash != prev.hash {
            return Err(LedgerError::ChainLinkage(format!(
                "block {} previous hash {} != tip hash {}",
                block.index, block.previous_hash, prev.hash
            )));
        }
        if !block.hash_is_consistent()? {
            return Err(LedgerError::InvalidBlock {
                index: block.index,
                reason: "hash does not match contents".to_string(),
            });
        }
        if block.difficulty < min_difficulty {
            return Err(LedgerError::InvalidBlock {
                index: block.index,
                reason: format!(
                    "recorded difficulty {} is below the required {}",
                    block.difficulty, min_difficulty
                ),
            });
        }
        if !meets_difficulty(&block.hash, block.difficulty) {
            return Err(LedgerError::InvalidBlock {
                index: block.index,
                reason: format!("hash {} misses difficulty {}", block.hash, block.difficulty),
            });
        }
        Ok(())
    }

    /// Full integrity check of a loaded chain.
    pub fn verify_chain(blocks: &[Block], min_difficulty: u32) -> Result<()> {
        let Some(genesis) = blocks.first() else {
            return Err(LedgerError::ChainLinkage("chain is empty".to_string()));
        };
        Self::verify_genesis(genesis)?;
        for pair in blocks.windows(2) {
            Self::validate_successor(&pair[0], &pair[1], min_difficulty)?;
        }
        Ok(())
    }

    /// Append a block on top of the tip and persist the whole chain before
    /// returning. On a failed write the in-memory chain is rolled back.
    pub fn append(&mut self, block: Block) -> Result<()> {
        let tip = self.tip()?;
        if let Err(e) = Self::validate_successor(tip, &block, self.min_difficulty) {
            log::warn!("🚫 Rejected block {}: {}", block.index, e);
            return Err(e);
        }

        self.blocks.push(block);
        if let Err(e) = self.persist() {
            log::error!("Failed to persist chain, rolling back append: {}", e);
            self.blocks.pop();
            return Err(e);
        }

        if let Some(block) = self.blocks.last() {
            log::info!(
                "Block {} appended: hash={} txs={}",
                block.index,
                block.hash,
                block.transactions.len()
            );
        }
        Ok(())
    }

    pub fn get_by_index(&self, index: u64) -> Result<&Block> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.blocks.get(i))
            .ok_or(LedgerError::NotFound {
                index,
                height: self.height(),
            })
    }

    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn tip(&self) -> Result<&Block> {
        self.blocks
            .last()
            .ok_or_else(|| LedgerError::ChainLinkage("chain has no genesis block".to_string()))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of mined transactions sent by `address`.
    pub fn count_sent_by(&self, address: &Address) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .filter(|tx| &tx.from == address)
            .count()
    }

    fn persist(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.blocks)
    }
}
