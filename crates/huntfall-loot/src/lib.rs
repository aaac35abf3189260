//! Pure loot and reward resolution.
//!
//! The resolver turns a seeded random draw plus a rarity table into
//! concrete rewards. It has no side effects and no I/O: given a fixed
//! random source it is fully deterministic, so tests reproduce exact
//! reward sequences. Rarity weights, coin ranges, and drop chances are
//! data -- balance changes never touch this code.
//!
//! Both the autohunt scheduler and the battle engine draw from here; they
//! differ only in which table they pass.
//!
//! # Modules
//!
//! - [`tables`] -- the [`RarityTable`] data model and stock tables.
//! - [`resolve`] -- the draw functions.
//!
//! [`RarityTable`]: tables::RarityTable

pub mod resolve;
pub mod tables;

pub use resolve::{bonus_drop, coins, draw};
pub use tables::{DropSpec, RarityTable};

/// Errors that make a rarity table unusable.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The coin range is inverted.
    #[error("coin range is inverted: min {min} > max {max}")]
    InvertedCoinRange {
        /// Configured minimum.
        min: i64,
        /// Configured maximum.
        max: i64,
    },

    /// A percentage field exceeds 100.
    #[error("{field} must be at most 100, got {value}")]
    ChanceOutOfRange {
        /// Which field is out of range.
        field: &'static str,
        /// The offending value.
        value: u32,
    },

    /// Every drop in the table has zero weight.
    #[error("drop table has entries but all weights are zero")]
    ZeroTotalWeight,
}
