//! Durable session and battle state stores for the Huntfall engine.
//!
//! The session store owns [`AutohuntSession`] and [`BattleState`] records.
//! The scheduler and the battle engine are the only writers; each record
//! belongs to exactly one logical session or battle, so no row locking is
//! needed -- writes carry the version token the writer last read, and a
//! mismatch fails with [`StoreError::StaleVersion`], forcing a re-read.
//!
//! # Modules
//!
//! - [`memory`] -- in-process implementations used by tests and single-node
//!   runs. The PostgreSQL implementations live in `huntfall-db`.

pub mod memory;

pub use memory::{MemoryBattleStore, MemorySessionStore};

use chrono::{DateTime, Utc};

use huntfall_types::{AccountId, AutohuntSession, BattleId, BattleState};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur reading or writing durable state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write carried a version token that no longer matches the stored
    /// record. The caller must re-read and retry.
    #[error("stale version: write expected stored version {expected}, found {found}")]
    StaleVersion {
        /// The version the writer expected to replace.
        expected: u64,
        /// The version actually stored.
        found: u64,
    },

    /// A stored record could not be interpreted. Fatal for that one
    /// session or battle, never for the process.
    #[error("corrupt stored state: {detail}")]
    Corrupt {
        /// What failed to decode.
        detail: String,
    },

    /// The backing store failed. Retryable with backoff.
    #[error("transient store error: {detail}")]
    Transient {
        /// Store-level detail.
        detail: String,
    },
}

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// Durable store of autohunt session records, keyed by owning account.
pub trait SessionStore: Send + Sync {
    /// Load the session owned by `account_id`, if one exists.
    fn get_session(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Option<AutohuntSession>, StoreError>> + Send;

    /// Version-checked upsert.
    ///
    /// The write must carry the version the writer last read (0 for a new
    /// record). On success the stored version increments and the committed
    /// record is returned.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleVersion`] when the carried version does not match
    /// the stored one.
    fn save_session(
        &self,
        session: &AutohuntSession,
    ) -> impl Future<Output = Result<AutohuntSession, StoreError>> + Send;

    /// Sessions that are due for processing: enabled, with
    /// `last_run + cadence <= now`, ordered oldest-due first (by
    /// `last_run` ascending) and limited to `limit` rows so one tick
    /// cannot starve later ones.
    fn due_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<AutohuntSession>, StoreError>> + Send;
}

/// Durable store of battle state records.
///
/// Terminal battles (`Resolved`/`Abandoned`) are retained for audit and
/// remain readable forever.
pub trait BattleStore: Send + Sync {
    /// Load a battle by ID, if one exists.
    fn get_battle(
        &self,
        battle_id: BattleId,
    ) -> impl Future<Output = Result<Option<BattleState>, StoreError>> + Send;

    /// Version-checked upsert; the checkpoint primitive.
    ///
    /// Same contract as [`SessionStore::save_session`]: carry the version
    /// last read (0 for a new battle), get back the committed record.
    fn save_battle(
        &self,
        battle: &BattleState,
    ) -> impl Future<Output = Result<BattleState, StoreError>> + Send;

    /// All non-terminal battles, for crash recovery at startup.
    fn open_battles(
        &self,
    ) -> impl Future<Output = Result<Vec<BattleState>, StoreError>> + Send;
}

impl<T: SessionStore + ?Sized> SessionStore for std::sync::Arc<T> {
    fn get_session(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Option<AutohuntSession>, StoreError>> + Send {
        (**self).get_session(account_id)
    }

    fn save_session(
        &self,
        session: &AutohuntSession,
    ) -> impl Future<Output = Result<AutohuntSession, StoreError>> + Send {
        (**self).save_session(session)
    }

    fn due_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<AutohuntSession>, StoreError>> + Send {
        (**self).due_sessions(now, limit)
    }
}

impl<T: BattleStore + ?Sized> BattleStore for std::sync::Arc<T> {
    fn get_battle(
        &self,
        battle_id: BattleId,
    ) -> impl Future<Output = Result<Option<BattleState>, StoreError>> + Send {
        (**self).get_battle(battle_id)
    }

    fn save_battle(
        &self,
        battle: &BattleState,
    ) -> impl Future<Output = Result<BattleState, StoreError>> + Send {
        (**self).save_battle(battle)
    }

    fn open_battles(
        &self,
    ) -> impl Future<Output = Result<Vec<BattleState>, StoreError>> + Send {
        (**self).open_battles()
    }
}
