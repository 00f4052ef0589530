// core/consensus.rs
use crate::block::{Block, compute_block_hash, meets_difficulty};
use crate::config::{GENESIS_DIFFICULTY, GENESIS_TIMESTAMP, genesis_previous_hash};
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Find a nonce for fixed block contents (timestamp frozen), starting at
/// `start_nonce`. Returns (nonce, hash). Only used to seal genesis, where the
/// difficulty is tiny and the result must be reproducible.
pub fn find_valid_nonce(
    index: u64,
    previous_hash: &str,
    transactions: &[Transaction],
    timestamp: i64,
    start_nonce: u64,
    difficulty: u32,
) -> Result<(u64, String)> {
    let mut nonce = start_nonce;
    loop {
        let hash = compute_block_hash(index, previous_hash, transactions, timestamp, nonce)?;
        if meets_difficulty(&hash, difficulty) {
            return Ok((nonce, hash));
        }
        nonce = nonce.wrapping_add(1);
    }
}

/// Deterministic genesis block: index 0, sentinel previous hash, no
/// transactions, fixed timestamp.
pub fn seal_genesis() -> Result<Block> {
    let previous_hash = genesis_previous_hash();
    let (nonce, hash) = find_valid_nonce(
        0,
        &previous_hash,
        &[],
        GENESIS_TIMESTAMP,
        0,
        GENESIS_DIFFICULTY,
    )?;
    Ok(Block {
        index: 0,
        previous_hash,
        timestamp: GENESIS_TIMESTAMP,
        transactions: vec![],
        nonce,
        difficulty: GENESIS_DIFFICULTY,
        hash,
    })
}

/// Proof-of-work search for a new block.
///
/// The nonce starts at 1 and the timestamp is re-sampled on every attempt, so
/// two runs over the same inputs generally produce different blocks.
/// The search stops with `MiningCancelled` once `cancel_flag` is raised or
/// `max_attempts` hashes were tried. Caller should run this in spawn_blocking.
pub fn mine_block(
    index: u64,
    previous_hash: String,
    transactions: &[Transaction],
    difficulty: u32,
    cancel_flag: &AtomicBool,
    max_attempts: Option<u64>,
) -> Result<Block> {
    let mut nonce: u64 = 1;
    let mut attempts: u64 = 0;
    let mining_start = std::time::Instant::now();
    let mut last_hashrate_update = mining_start;
    let mut hashes_since_update: u64 = 0;

    loop {
        if cancel_flag.load(Ordering::Relaxed) {
            log::info!("⛔ Mining of block {} cancelled after {} attempts", index, attempts);
            return Err(LedgerError::MiningCancelled { attempts });
        }
        if max_attempts.is_some_and(|max| attempts >= max) {
            log::warn!(
                "Mining of block {} gave up after {} attempts (difficulty: {})",
                index,
                attempts,
                difficulty
            );
            return Err(LedgerError::MiningCancelled { attempts });
        }

        let timestamp = Utc::now().timestamp();
        let hash = compute_block_hash(index, &previous_hash, transactions, timestamp, nonce)?;
        attempts += 1;

        if meets_difficulty(&hash, difficulty) {
            log::debug!(
                "⛏️  Block {} sealed: nonce={} attempts={} in {:.2}s",
                index,
                nonce,
                attempts,
                mining_start.elapsed().as_secs_f64()
            );
            return Ok(Block {
                index,
                previous_hash,
                timestamp,
                transactions: transactions.to_vec(),
                nonce,
                difficulty,
                hash,
            });
        }

        nonce += 1;
        hashes_since_update += 1;

        if attempts % 100_000 == 0 {
            let elapsed = last_hashrate_update.elapsed();
            if elapsed.as_secs() >= 1 {
                log::debug!(
                    "⛏️  Current hashrate: {:.2} H/s (difficulty: {})",
                    hashes_since_update as f64 / elapsed.as_secs_f64(),
                    difficulty
                );
                hashes_since_update = 0;
                last_hashrate_update = std::time::Instant::now();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, Balance};

    #[test]
    fn genesis_is_reproducible() {
        let a = seal_genesis().unwrap();
        let b = seal_genesis().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.index, 0);
        assert!(a.transactions.is_empty());
        assert!(meets_difficulty(&a.hash, GENESIS_DIFFICULTY));
        assert!(a.hash_is_consistent().unwrap());
    }

    #[test]
    fn mined_block_meets_difficulty() {
        let tx = Transaction::new(
            Address::decode("Wa0a").unwrap(),
            Address::decode("Wa0b").unwrap(),
            Balance::from(5),
        );
        let flag = AtomicBool::new(false);
        let block = mine_block(3, "ab".repeat(32), &[tx.clone()], 2, &flag, None).unwrap();
        assert!(block.hash.starts_with("00"));
        assert!(block.nonce >= 1);
        assert_eq!(block.index, 3);
        assert_eq!(block.transactions, vec![tx]);
        assert!(block.hash_is_consistent().unwrap());
    }

    #[test]
    fn raised_flag_cancels_before_hashing() {
        let flag = AtomicBool::new(true);
        let err = mine_block(1, "00".repeat(32), &[], 4, &flag, None).unwrap_err();
        assert!(matches!(err, LedgerError::MiningCancelled { attempts: 0 }));
    }

    #[test]
    fn attempt_bound_stops_an_impossible_search() {
        let flag = AtomicBool::new(false);
        // 64 leading zeros is out of reach
        let err = mine_block(1, "00".repeat(32), &[], 64, &flag, Some(50)).unwrap_err();
        assert!(matches!(err, LedgerError::MiningCancelled { attempts: 50 }));
    }
}
