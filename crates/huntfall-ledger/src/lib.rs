//! Transactional currency ledger for the Huntfall engine.
//!
//! The ledger is the exclusive authority for balance mutation. Every
//! currency movement -- autohunt costs and rewards, battle payouts,
//! player-to-player payments -- goes through [`Ledger::apply`] or
//! [`Ledger::transfer`], which commit the balance change and the
//! append-only [`LedgerEntry`] audit record as one indivisible unit.
//!
//! # Contract
//!
//! - A negative delta that would drive a balance below zero fails with
//!   [`LedgerError::InsufficientFunds`] and has no observable effect.
//! - Calls against the same account are strictly serialized; calls against
//!   different accounts proceed independently.
//! - The latest entry's `balance_after` always equals the account's
//!   current balance; replaying an account's deltas reconstructs it.
//!
//! # Modules
//!
//! - [`memory`] -- [`MemoryLedger`], the in-process implementation used by
//!   tests and single-node runs. The PostgreSQL implementation lives in
//!   `huntfall-db`.
//!
//! [`MemoryLedger`]: memory::MemoryLedger

pub mod memory;

pub use memory::MemoryLedger;

use huntfall_types::{AccountId, LedgerEntry, TransactionReceipt};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur applying a ledger mutation.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A debit would drive the balance below zero.
    #[error(
        "insufficient funds on account {account_id}: balance {balance}, requested {requested}"
    )]
    InsufficientFunds {
        /// The account that could not cover the debit.
        account_id: AccountId,
        /// The balance at the time of the attempt.
        balance: i64,
        /// The absolute amount that was requested.
        requested: i64,
    },

    /// The caller passed an amount the ledger rejects outright (zero
    /// delta, non-positive transfer, self-transfer).
    #[error("invalid amount: {detail}")]
    InvalidAmount {
        /// What was wrong with the amount.
        detail: String,
    },

    /// A balance computation would overflow the `i64` range.
    #[error("balance overflow on account {account_id}")]
    BalanceOverflow {
        /// The account whose balance would overflow.
        account_id: AccountId,
    },

    /// The backing store failed. Retryable at the caller's granularity.
    #[error("ledger store error: {detail}")]
    Store {
        /// Store-level detail.
        detail: String,
    },
}

/// The result of one committed [`Ledger::apply`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// The audit record that was appended.
    pub entry: LedgerEntry,
    /// The balance after the mutation committed.
    pub new_balance: i64,
}

// ---------------------------------------------------------------------------
// The Ledger trait
// ---------------------------------------------------------------------------

/// The atomic balance-mutation contract.
///
/// Implementations must guarantee that concurrent calls against one account
/// serialize, that no partial application is ever observable, and that the
/// entry log is append-only.
pub trait Ledger: Send + Sync {
    /// Atomically apply a signed `delta` to an account and append the audit
    /// entry. Accounts are created on first touch.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientFunds`] when a negative delta would drive
    /// the balance below zero; [`LedgerError::InvalidAmount`] for a zero
    /// delta. Neither leaves any trace in the log.
    fn apply(
        &self,
        account_id: AccountId,
        delta: i64,
        reason: &str,
    ) -> impl Future<Output = Result<Receipt, LedgerError>> + Send;

    /// Atomically move `amount` from one account to another, appending one
    /// debit and one credit entry. Either both sides commit or neither.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] for non-positive amounts or a
    /// self-transfer; [`LedgerError::InsufficientFunds`] when the sender
    /// cannot cover the amount.
    fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        reason: &str,
    ) -> impl Future<Output = Result<TransactionReceipt, LedgerError>> + Send;

    /// Current balance of an account; zero for accounts never touched.
    fn balance(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<i64, LedgerError>> + Send;

    /// The full audit trail for an account, oldest entry first.
    fn entries(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, LedgerError>> + Send;
}

impl<T: Ledger + ?Sized> Ledger for std::sync::Arc<T> {
    fn apply(
        &self,
        account_id: AccountId,
        delta: i64,
        reason: &str,
    ) -> impl Future<Output = Result<Receipt, LedgerError>> + Send {
        (**self).apply(account_id, delta, reason)
    }

    fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        reason: &str,
    ) -> impl Future<Output = Result<TransactionReceipt, LedgerError>> + Send {
        (**self).transfer(from, to, amount, reason)
    }

    fn balance(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<i64, LedgerError>> + Send {
        (**self).balance(account_id)
    }

    fn entries(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, LedgerError>> + Send {
        (**self).entries(account_id)
    }
}
