//! Rarity tables: the data that drives loot resolution.

use serde::{Deserialize, Serialize};

use huntfall_types::{Rarity, RewardKind};

use crate::TableError;

/// One possible item drop and its selection weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropSpec {
    /// Display name of the dropped item.
    pub name: String,
    /// What the item is.
    pub kind: RewardKind,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Selection weight relative to the other entries.
    pub weight: u32,
}

/// A complete loot table: coin range, weighted drops, and chances.
///
/// All fields deserialize from configuration; the stock tables below are
/// only the out-of-the-box defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityTable {
    /// Minimum coins per draw (inclusive).
    pub coins_min: i64,
    /// Maximum coins per draw (inclusive).
    pub coins_max: i64,
    /// Weighted item drops.
    pub drops: Vec<DropSpec>,
    /// Base chance (percent) that the weighted pick actually drops.
    #[serde(default = "default_base_drop_chance_pct")]
    pub base_drop_chance_pct: u32,
    /// Divisor applied to the picked entry's weight when boosting the drop
    /// chance (heavier entries drop a little more readily).
    #[serde(default = "default_drop_chance_weight_divisor")]
    pub drop_chance_weight_divisor: u32,
    /// Upper clamp (percent) on the effective drop chance.
    #[serde(default = "default_max_drop_chance_pct")]
    pub max_drop_chance_pct: u32,
    /// Chance (percent) of the post-battle bonus drop.
    #[serde(default = "default_bonus_drop_chance_pct")]
    pub bonus_drop_chance_pct: u32,
}

const fn default_base_drop_chance_pct() -> u32 {
    40
}

const fn default_drop_chance_weight_divisor() -> u32 {
    2
}

const fn default_max_drop_chance_pct() -> u32 {
    95
}

const fn default_bonus_drop_chance_pct() -> u32 {
    15
}

impl RarityTable {
    /// Reject tables that cannot be drawn from sensibly.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] for an inverted coin range, an out-of-range
    /// percentage, or a non-empty drop list whose weights sum to zero.
    pub fn validate(&self) -> Result<(), TableError> {
        if self.coins_min > self.coins_max {
            return Err(TableError::InvertedCoinRange {
                min: self.coins_min,
                max: self.coins_max,
            });
        }
        for (field, value) in [
            ("base_drop_chance_pct", self.base_drop_chance_pct),
            ("max_drop_chance_pct", self.max_drop_chance_pct),
            ("bonus_drop_chance_pct", self.bonus_drop_chance_pct),
        ] {
            if value > 100 {
                return Err(TableError::ChanceOutOfRange { field, value });
            }
        }
        if !self.drops.is_empty() && self.total_weight() == 0 {
            return Err(TableError::ZeroTotalWeight);
        }
        Ok(())
    }

    /// Sum of all drop weights.
    pub fn total_weight(&self) -> u64 {
        self.drops
            .iter()
            .fold(0_u64, |acc, d| acc.saturating_add(u64::from(d.weight)))
    }

    /// The stock autohunt table: modest coins, mostly gems.
    pub fn autohunt() -> Self {
        Self {
            coins_min: 10,
            coins_max: 100,
            drops: vec![
                DropSpec {
                    name: "Small Gem".to_owned(),
                    kind: RewardKind::Gem { power: 2 },
                    rarity: Rarity::Common,
                    weight: 70,
                },
                DropSpec {
                    name: "Big Gem".to_owned(),
                    kind: RewardKind::Gem { power: 5 },
                    rarity: Rarity::Rare,
                    weight: 20,
                },
                DropSpec {
                    name: "Stray Pet Egg".to_owned(),
                    kind: RewardKind::PetEgg,
                    rarity: Rarity::Uncommon,
                    weight: 10,
                },
            ],
            base_drop_chance_pct: default_base_drop_chance_pct(),
            drop_chance_weight_divisor: default_drop_chance_weight_divisor(),
            max_drop_chance_pct: default_max_drop_chance_pct(),
            bonus_drop_chance_pct: default_bonus_drop_chance_pct(),
        }
    }

    /// The stock battle table: richer coins, rarer drops.
    pub fn battle() -> Self {
        Self {
            coins_min: 25,
            coins_max: 180,
            drops: vec![
                DropSpec {
                    name: "Chipped Gem".to_owned(),
                    kind: RewardKind::Gem { power: 1 },
                    rarity: Rarity::Common,
                    weight: 55,
                },
                DropSpec {
                    name: "War Trophy".to_owned(),
                    kind: RewardKind::Trinket,
                    rarity: Rarity::Uncommon,
                    weight: 30,
                },
                DropSpec {
                    name: "Radiant Gem".to_owned(),
                    kind: RewardKind::Gem { power: 8 },
                    rarity: Rarity::Epic,
                    weight: 12,
                },
                DropSpec {
                    name: "Wyrm Egg".to_owned(),
                    kind: RewardKind::PetEgg,
                    rarity: Rarity::Legendary,
                    weight: 3,
                },
            ],
            base_drop_chance_pct: default_base_drop_chance_pct(),
            drop_chance_weight_divisor: default_drop_chance_weight_divisor(),
            max_drop_chance_pct: default_max_drop_chance_pct(),
            bonus_drop_chance_pct: default_bonus_drop_chance_pct(),
        }
    }
}

impl Default for RarityTable {
    fn default() -> Self {
        Self::autohunt()
    }
}
