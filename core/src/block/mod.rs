use crate::error::Result;
use crate::transaction::Transaction;
use hex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A sealed block as stored in the chain file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub previous_hash: String, // hex
    pub timestamp: i64,        // unix seconds
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    /// Difficulty the block was sealed at; not part of the hash preimage.
    pub difficulty: u32,
    pub hash: String, // hex
}

/// Canonical hash preimage. Keys are declared in sorted order so the JSON
/// encoding is stable.
#[derive(Serialize)]
struct HashPreimage<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: i64,
    transactions: &'a [Transaction],
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

pub fn to_hex(hash: &[u8; 32]) -> String {
    hex::encode(hash)
}

/// Hash over (index, previous hash, transactions, timestamp, nonce).
pub fn compute_block_hash(
    index: u64,
    previous_hash: &str,
    transactions: &[Transaction],
    timestamp: i64,
    nonce: u64,
) -> Result<String> {
    let preimage = HashPreimage {
        index,
        nonce,
        previous_hash,
        timestamp,
        transactions,
    };
    let bytes = serde_json::to_vec(&preimage)?;
    Ok(to_hex(&sha256(&bytes)))
}

/// True when the hex hash starts with at least `difficulty` zero characters.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

impl Block {
    pub fn compute_hash(&self) -> Result<String> {
        compute_block_hash(
            self.index,
            &self.previous_hash,
            &self.transactions,
            self.timestamp,
            self.nonce,
        )
    }

    /// Stored hash matches the contents.
    pub fn hash_is_consistent(&self) -> Result<bool> {
        Ok(self.compute_hash()? == self.hash)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}
