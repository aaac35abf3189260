//! Battle checkpoint persistence with optimistic versioning.
//!
//! The full [`BattleState`] is stored as JSONB alongside a few indexed
//! columns (status, deadline, winner) so crash recovery and audit queries
//! never deserialize every row. Writes are compare-and-swap on the
//! version column; there is no row locking here.

use sqlx::PgPool;
use uuid::Uuid;

use huntfall_store::{BattleStore, StoreError};
use huntfall_types::{AccountId, BattleId, BattleKind, BattleState, BattleStatus};

use crate::error::DbError;

/// The `PostgreSQL` implementation of the [`BattleStore`] trait.
#[derive(Debug, Clone)]
pub struct PgBattleStore {
    pool: PgPool,
}

impl PgBattleStore {
    /// Create a store over the given pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read the version currently stored for a battle (0 when absent).
    async fn stored_version(&self, battle_id: BattleId) -> Result<u64, DbError> {
        let row: Option<(i64,)> =
            sqlx::query_as(r"SELECT version FROM battles WHERE id = $1")
                .bind(battle_id.into_inner())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map_or(0, |(version,)| u64::try_from(version).unwrap_or(0)))
    }
}

/// Decode a stored JSONB payload into a [`BattleState`].
fn decode_state(battle_id: Uuid, state: serde_json::Value) -> Result<BattleState, StoreError> {
    serde_json::from_value(state).map_err(|e| StoreError::Corrupt {
        detail: format!("battle {battle_id}: {e}"),
    })
}

/// The `status` column value for a lifecycle state.
const fn status_to_db(status: BattleStatus) -> &'static str {
    match status {
        BattleStatus::Pending => "pending",
        BattleStatus::Active => "active",
        BattleStatus::AwaitingAction => "awaiting_action",
        BattleStatus::Resolved => "resolved",
        BattleStatus::Abandoned => "abandoned",
    }
}

/// The `kind` column value for a battle mode.
const fn kind_to_db(kind: BattleKind) -> &'static str {
    match kind {
        BattleKind::Duel => "duel",
        BattleKind::Pve => "pve",
    }
}

impl BattleStore for PgBattleStore {
    async fn get_battle(
        &self,
        battle_id: BattleId,
    ) -> Result<Option<BattleState>, StoreError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as(r"SELECT state FROM battles WHERE id = $1")
                .bind(battle_id.into_inner())
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;
        row.map(|(state,)| decode_state(battle_id.into_inner(), state))
            .transpose()
    }

    async fn save_battle(&self, battle: &BattleState) -> Result<BattleState, StoreError> {
        let expected = i64::try_from(battle.version).unwrap_or(i64::MAX);
        let next = expected.saturating_add(1);

        let mut committed = battle.clone();
        committed.version = u64::try_from(next).unwrap_or(u64::MAX);
        let state = serde_json::to_value(&committed).map_err(DbError::from)?;
        let winner_account = committed
            .winner_account()
            .map(AccountId::into_inner);

        let affected = if battle.version == 0 {
            sqlx::query(
                r"INSERT INTO battles
                  (id, kind, status, deadline, winner_account, state, version, created_at, updated_at)
                  VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                  ON CONFLICT (id) DO NOTHING",
            )
            .bind(battle.id.into_inner())
            .bind(kind_to_db(battle.kind))
            .bind(status_to_db(battle.status))
            .bind(battle.deadline)
            .bind(winner_account)
            .bind(&state)
            .bind(next)
            .bind(battle.created_at)
            .bind(battle.updated_at)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?
            .rows_affected()
        } else {
            sqlx::query(
                r"UPDATE battles
                  SET status = $2, deadline = $3, winner_account = $4, state = $5,
                      version = $6, updated_at = $7
                  WHERE id = $1 AND version = $8",
            )
            .bind(battle.id.into_inner())
            .bind(status_to_db(battle.status))
            .bind(battle.deadline)
            .bind(winner_account)
            .bind(&state)
            .bind(next)
            .bind(battle.updated_at)
            .bind(expected)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?
            .rows_affected()
        };

        if affected == 0 {
            let found = self
                .stored_version(battle.id)
                .await
                .map_err(StoreError::from)?;
            return Err(StoreError::StaleVersion {
                expected: battle.version,
                found,
            });
        }

        tracing::debug!(battle_id = %battle.id, version = committed.version, "Battle checkpointed");
        Ok(committed)
    }

    async fn open_battles(&self) -> Result<Vec<BattleState>, StoreError> {
        let rows: Vec<(Uuid, serde_json::Value)> = sqlx::query_as(
            r"SELECT id, state FROM battles
              WHERE status NOT IN ('resolved', 'abandoned')
              ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        // A checkpoint that no longer decodes is fatal for that one
        // battle: it is marked abandoned and logged, and recovery
        // continues with the rest.
        let mut open = Vec::with_capacity(rows.len());
        for (id, state) in rows {
            match decode_state(id, state) {
                Ok(battle) => open.push(battle),
                Err(err) => {
                    tracing::error!(battle_id = %id, %err, "Abandoning corrupt battle row");
                    let _ = sqlx::query(
                        r"UPDATE battles SET status = 'abandoned', version = version + 1
                          WHERE id = $1",
                    )
                    .bind(id)
                    .execute(&self.pool)
                    .await;
                }
            }
        }
        Ok(open)
    }
}
