//! Enumeration types shared across the Huntfall engine.

use serde::{Deserialize, Serialize};

use crate::ids::AccountId;

// ---------------------------------------------------------------------------
// Battles
// ---------------------------------------------------------------------------

/// The adversarial mode of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleKind {
    /// Player versus player.
    Duel,
    /// Player versus a generated creature.
    Pve,
}

/// Lifecycle state of a battle.
///
/// Terminal states (`Resolved`, `Abandoned`) are retained for audit and
/// never transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    /// Created, waiting for combatant confirmations.
    Pending,
    /// All combatants confirmed; initial snapshot taken.
    Active,
    /// Waiting for the turn owner's action or the turn deadline.
    AwaitingAction,
    /// Finished with a winner (or a decisive surrender).
    Resolved,
    /// Cancelled before resolution; no rewards were distributed.
    Abandoned,
}

impl BattleStatus {
    /// Whether this status admits no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Abandoned)
    }
}

/// A consumable carried into battle.
///
/// Items mutate the acting combatant's active stats before any damage
/// calculation on the turn they are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Raises weapon attack for the rest of the battle.
    AttackTonic,
    /// Hardens the user: incoming damage is reduced by a quarter.
    IronhideDraught,
    /// Restores a fixed amount of HP.
    Salve,
}

/// A player-submitted battle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BattleAction {
    /// Strike the opponent with the active loadout.
    Attack,
    /// Brace: the next incoming damage is halved.
    Defend,
    /// Consume a carried item.
    UseItem {
        /// The item to consume.
        item: ItemKind,
    },
    /// Bring a different pet from the roster into the active slot.
    Switch {
        /// Index into the combatant's roster.
        pet: usize,
    },
    /// Concede the battle; the opponent wins immediately.
    Surrender,
}

/// A persistent modifier on a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEffect {
    /// Braced for the next hit; halves one incoming damage resolution.
    Defending,
    /// Attack raised by a tonic.
    Fortified,
    /// Skin hardened by a draught; incoming damage reduced by a quarter.
    Hardened,
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

/// Rarity tier of a dropped item.
///
/// Ordering is ascending: `Common < Uncommon < ... < Legendary`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    /// The bulk of all drops.
    Common,
    /// Noticeably less frequent than common.
    Uncommon,
    /// A good day.
    Rare,
    /// A very good day.
    Epic,
    /// Announce-it-to-the-channel territory.
    Legendary,
}

/// What a dropped reward item actually is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardKind {
    /// A socketable gem contributing to the weapon's damage bonus.
    Gem {
        /// Gem power; each point is one percent of damage bonus.
        power: u32,
    },
    /// An unhatched pet.
    PetEgg,
    /// A cosmetic or vendor-fodder item.
    Trinket,
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Why an autohunt session was disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableReason {
    /// The per-cycle cost could not be paid.
    InsufficientFunds,
    /// The owner asked for it.
    UserRequest,
    /// The stored record could not be interpreted.
    CorruptState,
}

impl core::fmt::Display for DisableReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InsufficientFunds => write!(f, "insufficient funds"),
            Self::UserRequest => write!(f, "user request"),
            Self::CorruptState => write!(f, "corrupt state"),
        }
    }
}

/// Who the initiating player is fighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opponent", rename_all = "snake_case")]
pub enum OpponentSpec {
    /// Another player, identified by account.
    Player {
        /// The opposing account.
        account_id: AccountId,
    },
    /// A generated creature from a named template.
    Creature {
        /// Template name (e.g. `"goblin"`, `"wyrm"`).
        template: String,
        /// Level the creature is scaled to.
        level: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(BattleStatus::Resolved.is_terminal());
        assert!(BattleStatus::Abandoned.is_terminal());
        assert!(!BattleStatus::Pending.is_terminal());
        assert!(!BattleStatus::AwaitingAction.is_terminal());
    }

    #[test]
    fn rarity_orders_ascending() {
        assert!(Rarity::Common < Rarity::Rare);
        assert!(Rarity::Epic < Rarity::Legendary);
    }

    #[test]
    fn battle_action_serde_tagging() {
        let json = serde_json::to_string(&BattleAction::UseItem {
            item: ItemKind::Salve,
        })
        .ok();
        assert_eq!(
            json.as_deref(),
            Some(r#"{"action":"use_item","item":"salve"}"#),
        );
    }

    #[test]
    fn opponent_spec_roundtrip() {
        let spec = OpponentSpec::Creature {
            template: "goblin".to_owned(),
            level: 3,
        };
        let json = serde_json::to_string(&spec).ok();
        let back: Result<OpponentSpec, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert_eq!(back.ok(), Some(spec));
    }
}
