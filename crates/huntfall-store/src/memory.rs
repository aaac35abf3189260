//! In-process store implementations.
//!
//! Used by unit tests (deterministic, no infrastructure) and by
//! single-node runs that accept losing state on restart. Version-token
//! semantics are identical to the PostgreSQL implementations.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use huntfall_types::{AccountId, AutohuntSession, BattleId, BattleState};

use crate::{BattleStore, SessionStore, StoreError};

/// Check an optimistic write against the stored version, returning the
/// version the committed record should carry.
fn admit_write(stored: Option<u64>, carried: u64) -> Result<u64, StoreError> {
    let found = stored.unwrap_or(0);
    if found != carried {
        return Err(StoreError::StaleVersion {
            expected: carried,
            found,
        });
    }
    Ok(found.saturating_add(1))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// In-process [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<BTreeMap<AccountId, AutohuntSession>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions (enabled or not).
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn get_session(
        &self,
        account_id: AccountId,
    ) -> Result<Option<AutohuntSession>, StoreError> {
        Ok(self.sessions.read().await.get(&account_id).cloned())
    }

    async fn save_session(
        &self,
        session: &AutohuntSession,
    ) -> Result<AutohuntSession, StoreError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions.get(&session.account_id).map(|s| s.version);
        let next_version = admit_write(stored, session.version)?;

        let mut committed = session.clone();
        committed.version = next_version;
        sessions.insert(session.account_id, committed.clone());
        Ok(committed)
    }

    async fn due_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AutohuntSession>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut due: Vec<AutohuntSession> = sessions
            .values()
            .filter(|s| {
                s.enabled
                    && s.last_run
                        .checked_add_signed(Duration::seconds(
                            i64::try_from(s.cadence_secs).unwrap_or(i64::MAX),
                        ))
                        .is_some_and(|eligible_at| eligible_at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|s| s.last_run);
        due.truncate(limit);
        Ok(due)
    }
}

// ---------------------------------------------------------------------------
// Battles
// ---------------------------------------------------------------------------

/// In-process [`BattleStore`].
#[derive(Debug, Default)]
pub struct MemoryBattleStore {
    battles: RwLock<BTreeMap<BattleId, BattleState>>,
}

impl MemoryBattleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored battles, terminal ones included.
    pub async fn len(&self) -> usize {
        self.battles.read().await.len()
    }

    /// Whether the store holds no battles.
    pub async fn is_empty(&self) -> bool {
        self.battles.read().await.is_empty()
    }
}

impl BattleStore for MemoryBattleStore {
    async fn get_battle(
        &self,
        battle_id: BattleId,
    ) -> Result<Option<BattleState>, StoreError> {
        Ok(self.battles.read().await.get(&battle_id).cloned())
    }

    async fn save_battle(&self, battle: &BattleState) -> Result<BattleState, StoreError> {
        let mut battles = self.battles.write().await;
        let stored = battles.get(&battle.id).map(|b| b.version);
        let next_version = admit_write(stored, battle.version)?;

        let mut committed = battle.clone();
        committed.version = next_version;
        battles.insert(battle.id, committed.clone());
        Ok(committed)
    }

    async fn open_battles(&self) -> Result<Vec<BattleState>, StoreError> {
        let battles = self.battles.read().await;
        Ok(battles
            .values()
            .filter(|b| !b.status.is_terminal())
            .cloned()
            .collect())
    }
}
