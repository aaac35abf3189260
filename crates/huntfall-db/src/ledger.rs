//! Row-locked ledger over `PostgreSQL`.
//!
//! [`PgLedger`] realizes the [`Ledger`] contract with one transaction per
//! apply: `SELECT ... FOR UPDATE` on the account row, balance check,
//! `UPDATE`, entry insert, commit. Account rows are the only resource in
//! the schema taking an exclusive lock; everything else is
//! optimistic-versioned. Transfers lock both rows in ascending account
//! order so concurrent opposite transfers cannot deadlock.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use huntfall_ledger::{Ledger, LedgerError, Receipt};
use huntfall_types::{AccountId, LedgerEntry, LedgerEntryId, TransactionReceipt};

use crate::error::DbError;

/// The `PostgreSQL` implementation of the [`Ledger`] trait.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
    starting_balance: i64,
}

impl PgLedger {
    /// Create a ledger over the given pool; accounts are created on first
    /// touch with `starting_balance`.
    pub const fn new(pool: PgPool, starting_balance: i64) -> Self {
        Self {
            pool,
            starting_balance,
        }
    }

    /// Ensure the account row exists and lock it, returning the current
    /// balance.
    async fn lock_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: AccountId,
    ) -> Result<i64, DbError> {
        sqlx::query(
            r"INSERT INTO accounts (id, balance, version)
              VALUES ($1, $2, 0)
              ON CONFLICT (id) DO NOTHING",
        )
        .bind(account_id.into_inner())
        .bind(self.starting_balance)
        .execute(&mut **tx)
        .await?;

        let balance: (i64,) =
            sqlx::query_as(r"SELECT balance FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(account_id.into_inner())
                .fetch_one(&mut **tx)
                .await?;
        Ok(balance.0)
    }

    /// Write the new balance and append the entry inside the open
    /// transaction. The caller has already validated the delta.
    async fn commit_mutation(
        tx: &mut Transaction<'_, Postgres>,
        account_id: AccountId,
        delta: i64,
        new_balance: i64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<LedgerEntry, DbError> {
        sqlx::query(
            r"UPDATE accounts SET balance = $2, version = version + 1 WHERE id = $1",
        )
        .bind(account_id.into_inner())
        .bind(new_balance)
        .execute(&mut **tx)
        .await?;

        let entry = LedgerEntry {
            id: LedgerEntryId::new(),
            account_id,
            delta,
            balance_after: new_balance,
            reason: reason.to_owned(),
            created_at: at,
        };
        sqlx::query(
            r"INSERT INTO ledger_entries (id, account_id, delta, balance_after, reason, created_at)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id.into_inner())
        .bind(entry.account_id.into_inner())
        .bind(entry.delta)
        .bind(entry.balance_after)
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(entry)
    }

    /// Validate a delta against a locked balance.
    fn next_balance(
        account_id: AccountId,
        balance: i64,
        delta: i64,
    ) -> Result<i64, LedgerError> {
        if delta == 0 {
            return Err(LedgerError::InvalidAmount {
                detail: "delta must be non-zero".to_owned(),
            });
        }
        let next = balance
            .checked_add(delta)
            .ok_or(LedgerError::BalanceOverflow { account_id })?;
        if next < 0 {
            return Err(LedgerError::InsufficientFunds {
                account_id,
                balance,
                requested: delta.saturating_abs(),
            });
        }
        Ok(next)
    }
}

impl Ledger for PgLedger {
    async fn apply(
        &self,
        account_id: AccountId,
        delta: i64,
        reason: &str,
    ) -> Result<Receipt, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let balance = self.lock_account(&mut tx, account_id).await?;
        let new_balance = Self::next_balance(account_id, balance, delta)?;
        let entry = Self::commit_mutation(
            &mut tx,
            account_id,
            delta,
            new_balance,
            reason,
            Utc::now(),
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;
        tracing::debug!(%account_id, delta, new_balance, reason, "Ledger entry committed");
        Ok(Receipt { entry, new_balance })
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

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // Ascending lock order prevents deadlocks between opposite
        // transfers.
        let (from_balance, to_balance) = if from < to {
            let f = self.lock_account(&mut tx, from).await?;
            let t = self.lock_account(&mut tx, to).await?;
            (f, t)
        } else {
            let t = self.lock_account(&mut tx, to).await?;
            let f = self.lock_account(&mut tx, from).await?;
            (f, t)
        };

        let new_from = Self::next_balance(from, from_balance, amount.saturating_neg())?;
        let new_to = Self::next_balance(to, to_balance, amount)?;

        let at = Utc::now();
        let _ = Self::commit_mutation(&mut tx, from, amount.saturating_neg(), new_from, reason, at)
            .await?;
        let _ = Self::commit_mutation(&mut tx, to, amount, new_to, reason, at).await?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(TransactionReceipt {
            from,
            to,
            amount,
            from_balance: new_from,
            to_balance: new_to,
            created_at: at,
        })
    }

    async fn balance(&self, account_id: AccountId) -> Result<i64, LedgerError> {
        let row: Option<(i64,)> =
            sqlx::query_as(r"SELECT balance FROM accounts WHERE id = $1")
                .bind(account_id.into_inner())
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;
        Ok(row.map_or(0, |(balance,)| balance))
    }

    async fn entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows: Vec<(Uuid, i64, i64, i64, String, DateTime<Utc>)> = sqlx::query_as(
            r"SELECT id, account_id, delta, balance_after, reason, created_at
              FROM ledger_entries
              WHERE account_id = $1
              ORDER BY id",
        )
        .bind(account_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, account, delta, balance_after, reason, created_at)| LedgerEntry {
                    id: LedgerEntryId::from(id),
                    account_id: AccountId::new(account),
                    delta,
                    balance_after,
                    reason,
                    created_at,
                },
            )
            .collect())
    }
}
