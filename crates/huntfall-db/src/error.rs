//! Error types for the data layer.

use huntfall_ledger::LedgerError;
use huntfall_store::StoreError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored JSON payload could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        Self::Store {
            detail: err.to_string(),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Serialization(source) => Self::Corrupt {
                detail: source.to_string(),
            },
            other => Self::Transient {
                detail: other.to_string(),
            },
        }
    }
}
