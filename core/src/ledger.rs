//! Balance ledger: wallet arena indexed by address.

use crate::error::{LedgerError, Result};
use crate::types::{Address, Balance};
use crate::wallet::{Wallet, WalletSummary};
use std::collections::HashMap;

/// Wallets in insertion order plus an address index into them.
#[derive(Debug, Default, Clone)]
pub struct BalanceLedger {
    wallets: Vec<Wallet>,
    index: HashMap<Address, usize>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted wallet list. Duplicate addresses mean the
    /// file was edited by hand or corrupted, so they are rejected.
    pub fn from_wallets(wallets: Vec<Wallet>) -> Result<Self> {
        let mut ledger = BalanceLedger::new();
        for wallet in wallets {
            let address = wallet.address.clone();
            if !ledger.insert(wallet) {
                return Err(LedgerError::Persistence(format!(
                    "duplicate wallet address {}",
                    address
                )));
            }
        }
        Ok(ledger)
    }

    /// Add a wallet. Returns false (and leaves the ledger unchanged) when the
    /// address is already present.
    pub fn insert(&mut self, wallet: Wallet) -> bool {
        if self.index.contains_key(&wallet.address) {
            return false;
        }
        self.index.insert(wallet.address.clone(), self.wallets.len());
        self.wallets.push(wallet);
        true
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.index.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn summaries(&self) -> Vec<WalletSummary> {
        self.wallets.iter().map(Wallet::summary).collect()
    }

    fn slot(&self, address: &Address) -> Result<usize> {
        self.index
            .get(address)
            .copied()
            .ok_or_else(|| LedgerError::UnknownAddress(address.to_string()))
    }

    pub fn balance(&self, address: &Address) -> Result<Balance> {
        Ok(self.wallets[self.slot(address)?].balance)
    }

    /// Add `amount` to the balance, returning the new balance.
    pub fn credit(&mut self, address: &Address, amount: Balance) -> Result<Balance> {
        let slot = self.slot(address)?;
        let wallet = &mut self.wallets[slot];
        let updated = wallet
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow(address.to_string()))?;
        wallet.balance = updated;
        Ok(updated)
    }

    /// Subtract `amount` from the balance, returning the new balance.
    pub fn debit(&mut self, address: &Address, amount: Balance) -> Result<Balance> {
        let slot = self.slot(address)?;
        let wallet = &mut self.wallets[slot];
        let updated = wallet
            .balance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientFunds {
                have: wallet.balance.to_string(),
                need: amount.to_string(),
            })?;
        wallet.balance = updated;
        Ok(updated)
    }

    /// Move `amount` from `from` to `to`. Both new balances are computed
    /// before either is written, so a failure leaves both untouched.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: Balance) -> Result<()> {
        let from_slot = self.slot(from)?;
        let to_slot = self.slot(to)?;

        let sender = self.wallets[from_slot].balance;
        let debited = sender
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientFunds {
                have: sender.to_string(),
                need: amount.to_string(),
            })?;

        if from_slot == to_slot {
            return Ok(());
        }

        let credited = self.wallets[to_slot]
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow(to.to_string()))?;

        self.wallets[from_slot].balance = debited;
        self.wallets[to_slot].balance = credited;
        Ok(())
    }

    /// Put back a balance captured before a mutation whose persistence failed.
    pub(crate) fn restore_balance(&mut self, address: &Address, balance: Balance) {
        if let Some(&slot) = self.index.get(address) {
            self.wallets[slot].balance = balance;
        }
    }

    /// Drop wallets appended after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        for wallet in self.wallets.drain(len.min(self.wallets.len())..) {
            self.index.remove(&wallet.address);
        }
    }
}
