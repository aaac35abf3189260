//! Shared type definitions for the Huntfall game engine.
//!
//! This crate is the single source of truth for all types used across the
//! Huntfall workspace: the economy (accounts, ledger entries, receipts),
//! autohunt sessions, battles (combatants, turns, battle state), and loot
//! rewards.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier wrappers
//! - [`enums`] -- Enumeration types (battle lifecycle, actions, rarity)
//! - [`structs`] -- Core entity structs (accounts, sessions, battles)
//! - [`combat`] -- Combatant variants and their capability surface

pub mod combat;
pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use combat::{ChampionCombatant, Combatant, CreatureCombatant};
pub use enums::{
    BattleAction, BattleKind, BattleStatus, DisableReason, ItemKind, OpponentSpec, Rarity,
    RewardKind, StatusEffect,
};
pub use ids::{AccountId, BattleId, DisplayRef, LedgerEntryId};
pub use structs::{
    Account, AutohuntSession, BattleRewards, BattleState, Gem, LedgerEntry, LootDraw,
    PetSnapshot, RewardItem, TransactionReceipt, TurnRecord, WeaponStats,
};
