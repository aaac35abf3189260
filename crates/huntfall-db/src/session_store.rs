//! Autohunt session persistence with optimistic versioning.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use huntfall_store::{SessionStore, StoreError};
use huntfall_types::{AccountId, AutohuntSession, DisplayRef};

use crate::error::DbError;

/// The `PostgreSQL` implementation of the [`SessionStore`] trait.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a store over the given pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read the version currently stored for an account (0 when absent).
    async fn stored_version(&self, account_id: AccountId) -> Result<u64, DbError> {
        let row: Option<(i64,)> =
            sqlx::query_as(r"SELECT version FROM autohunt_sessions WHERE account_id = $1")
                .bind(account_id.into_inner())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map_or(0, |(version,)| u64::try_from(version).unwrap_or(0)))
    }
}

/// A row from the `autohunt_sessions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SessionRow {
    account_id: i64,
    enabled: bool,
    cadence_secs: i64,
    last_run: DateTime<Utc>,
    essence: i64,
    level: i32,
    display_ref: Option<String>,
    version: i64,
}

impl SessionRow {
    fn into_session(self) -> Result<AutohuntSession, StoreError> {
        let corrupt = |field: &str| StoreError::Corrupt {
            detail: format!("session {}: negative {field}", self.account_id),
        };
        Ok(AutohuntSession {
            account_id: AccountId::new(self.account_id),
            enabled: self.enabled,
            cadence_secs: u64::try_from(self.cadence_secs)
                .map_err(|_e| corrupt("cadence_secs"))?,
            last_run: self.last_run,
            essence: u64::try_from(self.essence).map_err(|_e| corrupt("essence"))?,
            level: u32::try_from(self.level).map_err(|_e| corrupt("level"))?,
            display_ref: self.display_ref.map(DisplayRef::new),
            version: u64::try_from(self.version).map_err(|_e| corrupt("version"))?,
        })
    }
}

const SELECT_COLUMNS: &str = r"SELECT account_id, enabled, cadence_secs, last_run, essence,
level, display_ref, version FROM autohunt_sessions";

impl SessionStore for PgSessionStore {
    async fn get_session(
        &self,
        account_id: AccountId,
    ) -> Result<Option<AutohuntSession>, StoreError> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE account_id = $1"))
                .bind(account_id.into_inner())
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;
        row.map(SessionRow::into_session).transpose()
    }

    async fn save_session(
        &self,
        session: &AutohuntSession,
    ) -> Result<AutohuntSession, StoreError> {
        let expected = i64::try_from(session.version).unwrap_or(i64::MAX);
        let next = expected.saturating_add(1);
        let cadence = i64::try_from(session.cadence_secs).unwrap_or(i64::MAX);
        let essence = i64::try_from(session.essence).unwrap_or(i64::MAX);
        let display_ref = session.display_ref.as_ref().map(DisplayRef::as_str);

        // Compare-and-swap on the version column: an insert only lands
        // when no row exists, an update only when the stored version
        // matches the one the writer read.
        let affected = if session.version == 0 {
            sqlx::query(
                r"INSERT INTO autohunt_sessions
                  (account_id, enabled, cadence_secs, last_run, essence, level, display_ref, version)
                  VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                  ON CONFLICT (account_id) DO NOTHING",
            )
            .bind(session.account_id.into_inner())
            .bind(session.enabled)
            .bind(cadence)
            .bind(session.last_run)
            .bind(essence)
            .bind(i32::try_from(session.level).unwrap_or(i32::MAX))
            .bind(display_ref)
            .bind(next)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?
            .rows_affected()
        } else {
            sqlx::query(
                r"UPDATE autohunt_sessions
                  SET enabled = $2, cadence_secs = $3, last_run = $4, essence = $5,
                      level = $6, display_ref = $7, version = $8
                  WHERE account_id = $1 AND version = $9",
            )
            .bind(session.account_id.into_inner())
            .bind(session.enabled)
            .bind(cadence)
            .bind(session.last_run)
            .bind(essence)
            .bind(i32::try_from(session.level).unwrap_or(i32::MAX))
            .bind(display_ref)
            .bind(next)
            .bind(expected)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?
            .rows_affected()
        };

        if affected == 0 {
            let found = self
                .stored_version(session.account_id)
                .await
                .map_err(StoreError::from)?;
            return Err(StoreError::StaleVersion {
                expected: session.version,
                found,
            });
        }

        let mut committed = session.clone();
        committed.version = u64::try_from(next).unwrap_or(u64::MAX);
        Ok(committed)
    }

    async fn due_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AutohuntSession>, StoreError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            r"{SELECT_COLUMNS}
              WHERE enabled
                AND last_run + make_interval(secs => cadence_secs::double precision) <= $1
              ORDER BY last_run ASC
              LIMIT $2",
        ))
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        // A row that cannot be interpreted is fatal for that one session:
        // it is disabled in place and logged, and the batch continues.
        let mut due = Vec::with_capacity(rows.len());
        for row in rows {
            let account_id = row.account_id;
            match row.into_session() {
                Ok(session) => due.push(session),
                Err(err) => {
                    tracing::error!(account_id, %err, "Disabling corrupt session row");
                    let _ = sqlx::query(
                        r"UPDATE autohunt_sessions SET enabled = FALSE, version = version + 1
                          WHERE account_id = $1",
                    )
                    .bind(account_id)
                    .execute(&self.pool)
                    .await;
                }
            }
        }
        Ok(due)
    }
}
