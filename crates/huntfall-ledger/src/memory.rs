//! In-process ledger with per-account serialization.
//!
//! [`MemoryLedger`] keeps one async mutex per account inside a shared map,
//! so concurrent mutations of one account queue while different accounts
//! proceed in parallel -- the same discipline the row-locked PostgreSQL
//! implementation gets from `SELECT ... FOR UPDATE`.
//!
//! Lock order is fixed: account cells first (ascending account ID when two
//! are held), then the shared entry log.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use huntfall_types::{AccountId, LedgerEntry, LedgerEntryId, TransactionReceipt};

use crate::{Ledger, LedgerError, Receipt};

/// Mutable per-account state guarded by its own mutex.
#[derive(Debug)]
struct AccountCell {
    balance: i64,
    version: u64,
}

/// In-process [`Ledger`] implementation.
///
/// Accounts are created on first touch with a configurable starting
/// balance. The entry log is shared and append-only.
#[derive(Debug)]
pub struct MemoryLedger {
    starting_balance: i64,
    accounts: RwLock<BTreeMap<AccountId, Arc<Mutex<AccountCell>>>>,
    log: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    /// Create a ledger whose accounts start at zero.
    pub fn new() -> Self {
        Self::with_starting_balance(0)
    }

    /// Create a ledger whose accounts start at `starting_balance`.
    pub const fn with_starting_balance(starting_balance: i64) -> Self {
        Self {
            starting_balance,
            accounts: RwLock::const_new(BTreeMap::new()),
            log: Mutex::const_new(Vec::new()),
        }
    }

    /// Fetch the cell for an account, creating it on first touch.
    async fn cell(&self, account_id: AccountId) -> Arc<Mutex<AccountCell>> {
        if let Some(cell) = self.accounts.read().await.get(&account_id) {
            return Arc::clone(cell);
        }
        let mut accounts = self.accounts.write().await;
        let cell = accounts.entry(account_id).or_insert_with(|| {
            Arc::new(Mutex::new(AccountCell {
                balance: self.starting_balance,
                version: 0,
            }))
        });
        Arc::clone(cell)
    }

    /// Validate and compute the post-delta balance for a locked cell.
    fn next_balance(
        account_id: AccountId,
        cell: &AccountCell,
        delta: i64,
    ) -> Result<i64, LedgerError> {
        if delta == 0 {
            return Err(LedgerError::InvalidAmount {
                detail: "delta must be non-zero".to_owned(),
            });
        }
        let next = cell
            .balance
            .checked_add(delta)
            .ok_or(LedgerError::BalanceOverflow { account_id })?;
        if next < 0 {
            return Err(LedgerError::InsufficientFunds {
                account_id,
                balance: cell.balance,
                requested: delta.saturating_abs(),
            });
        }
        Ok(next)
    }

    /// Commit a mutation on a locked cell and append its entry.
    async fn commit(
        &self,
        account_id: AccountId,
        cell: &mut AccountCell,
        delta: i64,
        reason: &str,
    ) -> Result<Receipt, LedgerError> {
        let new_balance = Self::next_balance(account_id, cell, delta)?;

        let entry = LedgerEntry {
            id: LedgerEntryId::new(),
            account_id,
            delta,
            balance_after: new_balance,
            reason: reason.to_owned(),
            created_at: Utc::now(),
        };

        cell.balance = new_balance;
        cell.version = cell.version.saturating_add(1);
        self.log.lock().await.push(entry.clone());

        tracing::debug!(%account_id, delta, new_balance, reason, "Ledger entry committed");
        Ok(Receipt { entry, new_balance })
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for MemoryLedger {
    async fn apply(
        &self,
        account_id: AccountId,
        delta: i64,
        reason: &str,
    ) -> Result<Receipt, LedgerError> {
        let cell = self.cell(account_id).await;
        let mut cell = cell.lock().await;
        self.commit(account_id, &mut cell, delta, reason).await
    }

    async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        reason: &str,
    ) -> Result<TransactionReceipt, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount {
                detail: format!("transfer amount must be positive, got {amount}"),
            });
        }
        if from == to {
            return Err(LedgerError::InvalidAmount {
                detail: "cannot transfer to the same account".to_owned(),
            });
        }

        let from_cell = self.cell(from).await;
        let to_cell = self.cell(to).await;

        // Lock both cells in ascending account order so concurrent opposite
        // transfers cannot deadlock.
        let (mut first, mut second) = if from < to {
            let f = from_cell.lock().await;
            let t = to_cell.lock().await;
            (f, t)
        } else {
            let t = to_cell.lock().await;
            let f = from_cell.lock().await;
            (f, t)
        };
        let (sender, recipient) = if from < to {
            (&mut *first, &mut *second)
        } else {
            (&mut *second, &mut *first)
        };

        // Validate the debit before touching either side.
        let _ = Self::next_balance(from, sender, amount.saturating_neg())?;
        let _ = Self::next_balance(to, recipient, amount)?;

        let debit = self
            .commit(from, sender, amount.saturating_neg(), reason)
            .await?;
        let credit = self.commit(to, recipient, amount, reason).await?;

        Ok(TransactionReceipt {
            from,
            to,
            amount,
            from_balance: debit.new_balance,
            to_balance: credit.new_balance,
            created_at: credit.entry.created_at,
        })
    }

    async fn balance(&self, account_id: AccountId) -> Result<i64, LedgerError> {
        if let Some(cell) = self.accounts.read().await.get(&account_id) {
            return Ok(cell.lock().await.balance);
        }
        Ok(0)
    }

    async fn entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, LedgerError> {
        let log = self.log.lock().await;
        Ok(log
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }
}
