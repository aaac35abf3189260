//! `PostgreSQL` persistence for the Huntfall engine.
//!
//! Implements the `huntfall-ledger` and `huntfall-store` traits over
//! `PostgreSQL` via [`sqlx`] runtime queries, so builds never need a live
//! database. Account rows take a `SELECT ... FOR UPDATE` lock inside the
//! ledger's apply transaction; sessions and battles use optimistic
//! compare-and-swap on their version columns.
//!
//! # Modules
//!
//! - [`postgres`] -- connection pool, configuration, migrations
//! - [`ledger`] -- [`PgLedger`], the row-locked atomic-apply ledger
//! - [`session_store`] -- [`PgSessionStore`]
//! - [`battle_store`] -- [`PgBattleStore`]
//! - [`error`] -- shared error types
//!
//! [`PgLedger`]: ledger::PgLedger
//! [`PgSessionStore`]: session_store::PgSessionStore
//! [`PgBattleStore`]: battle_store::PgBattleStore

pub mod battle_store;
pub mod error;
pub mod ledger;
pub mod postgres;
pub mod session_store;

pub use battle_store::PgBattleStore;
pub use error::DbError;
pub use ledger::PgLedger;
pub use postgres::{PgConfig, PgHandle};
pub use session_store::PgSessionStore;
