//! End-to-end ledger scenarios against a scratch data directory.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use tempfile::TempDir;
use wchain_core::block::meets_difficulty;
use wchain_core::{
    Address, Balance, Blockchain, KeyGenerator, LedgerService, LedgerSettings, PrivateKey,
};

struct CountingKeys(AtomicU32);

impl KeyGenerator for CountingKeys {
    fn generate(&self) -> (Address, PrivateKey) {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        let mut bytes = [0u8; 20];
        bytes[16..].copy_from_slice(&n.to_be_bytes());
        (Address::from_bytes(&bytes), PrivateKey::from_bytes(&[7; 32]))
    }
}

fn open(dir: &Path, difficulty: u32) -> LedgerService {
    LedgerService::open(
        dir,
        LedgerSettings {
            difficulty,
            max_mining_attempts: None,
        },
        Box::new(CountingKeys(AtomicU32::new(0))),
    )
    .unwrap()
}

fn not_cancelled() -> AtomicBool {
    AtomicBool::new(false)
}

#[test]
fn send_then_mine_scenario() {
    let dir = TempDir::new().unwrap();
    let service = open(dir.path(), 2);

    let wallets = service.seed_wallets(2).unwrap();
    let (a, b) = (&wallets[0], &wallets[1]);
    assert_eq!(service.get_balance(a).unwrap(), Balance::zero());
    assert_eq!(service.get_balance(b).unwrap(), Balance::zero());

    service.add_balance(a, Balance::from(100)).unwrap();
    service.send_transaction(a, b, Balance::from(40)).unwrap();

    // balances move before the transaction is mined
    assert_eq!(service.get_balance(a).unwrap(), Balance::from(60));
    assert_eq!(service.get_balance(b).unwrap(), Balance::from(40));

    let height_before = service.chain_height();
    let block = service.mine_block(&not_cancelled()).unwrap();

    assert_eq!(service.chain_height(), height_before + 1);
    assert_eq!(block.transactions.len(), 1);
    let tx = &block.transactions[0];
    assert_eq!((&tx.from, &tx.to, tx.value), (a, b, Balance::from(40)));
    assert!(meets_difficulty(&block.hash, 2));
    assert_eq!(service.pending_count(), 0);

    // mining settles nothing further
    assert_eq!(service.get_balance(a).unwrap(), Balance::from(60));
    assert_eq!(service.get_balance(b).unwrap(), Balance::from(40));
}

#[test]
fn overdraft_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let service = open(dir.path(), 1);
    let wallets = service.seed_wallets(2).unwrap();
    service.add_balance(&wallets[0], Balance::from(10)).unwrap();

    let err = service
        .send_transaction(&wallets[0], &wallets[1], Balance::from(50))
        .unwrap_err();

    assert_eq!(err.kind(), "InsufficientFunds");
    assert_eq!(service.get_balance(&wallets[0]).unwrap(), Balance::from(10));
    assert_eq!(service.get_balance(&wallets[1]).unwrap(), Balance::zero());
    assert_eq!(service.pending_count(), 0);
}

#[test]
fn unknown_receiver_is_rejected() {
    let dir = TempDir::new().unwrap();
    let service = open(dir.path(), 1);
    let wallets = service.seed_wallets(1).unwrap();
    service.add_balance(&wallets[0], Balance::from(10)).unwrap();

    let stranger = Address::from_bytes(&[0xee; 20]);
    let err = service
        .send_transaction(&wallets[0], &stranger, Balance::from(1))
        .unwrap_err();
    assert_eq!(err.kind(), "UnknownAddress");
    assert_eq!(service.get_balance(&wallets[0]).unwrap(), Balance::from(10));
}

#[test]
fn block_at_height_is_not_found() {
    let dir = TempDir::new().unwrap();
    let service = open(dir.path(), 1);
    let height = service.chain_height();
    let err = service.get_block_by_index(height).unwrap_err();
    assert_eq!(err.kind(), "NotFound");
    assert!(service.get_block_by_index(height - 1).is_ok());
}

#[test]
fn state_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let (wallets, blocks) = {
        let service = open(dir.path(), 1);
        let addrs = service.seed_wallets(3).unwrap();
        service.add_balance(&addrs[0], Balance::from(500)).unwrap();
        service.send_transaction(&addrs[0], &addrs[2], Balance::from(125)).unwrap();
        service.mine_block(&not_cancelled()).unwrap();
        service.mine_block(&not_cancelled()).unwrap();
        let blocks: Vec<_> = (0..service.chain_height())
            .map(|i| service.get_block_by_index(i).unwrap())
            .collect();
        (service.list_wallets(), blocks)
    };

    let reopened = open(dir.path(), 1);
    assert_eq!(reopened.list_wallets(), wallets);
    assert_eq!(reopened.chain_height(), blocks.len() as u64);
    for block in &blocks {
        assert_eq!(&reopened.get_block_by_index(block.index).unwrap(), block);
    }
}

#[test]
fn persisted_chain_is_hash_linked() {
    let dir = TempDir::new().unwrap();
    let service = open(dir.path(), 2);
    let addrs = service.seed_wallets(2).unwrap();
    service.add_balance(&addrs[0], Balance::from(9)).unwrap();
    for _ in 0..3 {
        service.send_transaction(&addrs[0], &addrs[1], Balance::from(1)).unwrap();
        service.mine_block(&not_cancelled()).unwrap();
    }

    let chain = Blockchain::open(dir.path().join("blocks.json"), 2).unwrap();
    let blocks = chain.blocks();
    assert_eq!(blocks.len(), 4);
    for pair in blocks.windows(2) {
        assert_eq!(pair[1].previous_hash, pair[0].hash);
        assert_eq!(pair[1].index, pair[0].index + 1);
        assert!(meets_difficulty(&pair[1].hash, 2));
    }
}

#[test]
fn concurrent_transfers_do_not_lose_updates() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(open(dir.path(), 1));
    let addrs = service.seed_wallets(2).unwrap();
    service.add_balance(&addrs[0], Balance::from(1_000)).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            let (from, to) = (addrs[0].clone(), addrs[1].clone());
            thread::spawn(move || {
                for _ in 0..25 {
                    service.send_transaction(&from, &to, Balance::from(3)).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(service.get_balance(&addrs[0]).unwrap(), Balance::from(700));
    assert_eq!(service.get_balance(&addrs[1]).unwrap(), Balance::from(300));
    assert_eq!(service.pending_count(), 100);

    let reopened = open(dir.path(), 1);
    assert_eq!(reopened.get_balance(&addrs[0]).unwrap(), Balance::from(700));
    assert_eq!(reopened.get_balance(&addrs[1]).unwrap(), Balance::from(300));
}

#[test]
fn transfers_during_mining_wait_for_the_next_block() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(open(dir.path(), 1));
    let addrs = service.seed_wallets(2).unwrap();
    service.add_balance(&addrs[0], Balance::from(100)).unwrap();
    service.send_transaction(&addrs[0], &addrs[1], Balance::from(1)).unwrap();

    let miner = {
        let service = Arc::clone(&service);
        thread::spawn(move || service.mine_block(&AtomicBool::new(false)).unwrap())
    };
    for _ in 0..10 {
        service.send_transaction(&addrs[0], &addrs[1], Balance::from(1)).unwrap();
    }
    let first = miner.join().unwrap();
    let second = service.mine_block(&not_cancelled()).unwrap();

    assert_eq!(first.transactions.len() + second.transactions.len(), 11);
    assert_eq!(service.pending_count(), 0);
}

#[test]
fn pending_transfers_are_mined_after_a_restart() {
    let dir = TempDir::new().unwrap();
    let addrs = {
        let service = open(dir.path(), 1);
        let addrs = service.seed_wallets(2).unwrap();
        service.add_balance(&addrs[0], Balance::from(50)).unwrap();
        service.send_transaction(&addrs[0], &addrs[1], Balance::from(20)).unwrap();
        service.send_transaction(&addrs[0], &addrs[1], Balance::from(5)).unwrap();
        addrs
    };

    let reopened = open(dir.path(), 1);
    assert_eq!(reopened.pending_count(), 2);
    assert_eq!(reopened.get_balance(&addrs[0]).unwrap(), Balance::from(25));

    let block = reopened.mine_block(&not_cancelled()).unwrap();
    let values: Vec<Balance> = block.transactions.iter().map(|tx| tx.value).collect();
    assert_eq!(values, vec![Balance::from(20), Balance::from(5)]);
    assert_eq!(open(dir.path(), 1).pending_count(), 0);
}
