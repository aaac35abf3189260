//! Turn-based battle engine for the Huntfall game.
//!
//! Battles are independent state machines: `Pending → Active →
//! (AwaitingAction ⇄ resolving) → Resolved | Abandoned`. Each runs under
//! its own async mutex so no two turns of one battle ever resolve
//! concurrently, while distinct battles and scheduler ticks interleave
//! freely. The full state is checkpointed to the battle store after every
//! resolved turn, so a crash loses at most the in-flight action.
//!
//! # Modules
//!
//! - [`config`] -- [`BattleConfig`]: deadlines, item magnitudes, reward
//!   scaling.
//! - [`damage`] -- the deterministic-plus-bounded-randomness damage
//!   formula and defender mitigation.
//! - [`creature`] -- level-scaled PvE creature generation from templates.
//! - [`turns`] -- per-turn state transitions (crate-internal).
//! - [`engine`] -- [`BattleEngine`]: registry, lifecycle, checkpointing,
//!   deadline sweeping, and reward distribution.
//!
//! [`BattleConfig`]: config::BattleConfig
//! [`BattleEngine`]: engine::BattleEngine

pub mod config;
pub mod creature;
pub mod damage;
pub mod engine;
mod turns;

pub use config::BattleConfig;
pub use creature::CreatureTemplate;
pub use engine::{BattleEngine, ChampionLoadout};

use huntfall_types::{AccountId, BattleId, BattleStatus};

/// Errors that can occur operating on battles.
#[derive(Debug, thiserror::Error)]
pub enum BattleError {
    /// No battle with the given ID exists.
    #[error("battle {battle_id} not found")]
    NotFound {
        /// The unknown battle.
        battle_id: BattleId,
    },

    /// The account is not fighting in this battle.
    #[error("account {account} is not a participant in battle {battle_id}")]
    NotAParticipant {
        /// The battle in question.
        battle_id: BattleId,
        /// The uninvolved account.
        account: AccountId,
    },

    /// An action arrived from someone other than the current turn owner.
    /// The battle state is unchanged; the caller should wait for their
    /// turn.
    #[error("not your turn in battle {battle_id} (account {account})")]
    NotYourTurn {
        /// The battle in question.
        battle_id: BattleId,
        /// The account that jumped the queue.
        account: AccountId,
    },

    /// The action is not applicable: wrong lifecycle phase, unknown item,
    /// bad switch index, malformed loadout. No state change.
    #[error("invalid action: {detail}")]
    InvalidAction {
        /// What was wrong.
        detail: String,
    },

    /// The battle already reached a terminal state.
    #[error("battle {battle_id} is already {status:?}")]
    Terminal {
        /// The battle in question.
        battle_id: BattleId,
        /// Its terminal status.
        status: BattleStatus,
    },

    /// A ledger operation failed while distributing rewards.
    #[error("ledger error: {0}")]
    Ledger(#[from] huntfall_ledger::LedgerError),

    /// A store operation failed.
    #[error("store error: {0}")]
    Store(#[from] huntfall_store::StoreError),
}
