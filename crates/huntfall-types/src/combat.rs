//! Combatant snapshots and their shared capability surface.
//!
//! A combatant is a closed tagged variant: either a player's champion
//! (owner, pet roster, equipped weapon) or a generated creature. Both
//! expose the same capability surface -- current HP, apply-damage, attack
//! power, modifiers -- so the battle engine never shape-checks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{ItemKind, StatusEffect};
use crate::ids::AccountId;
use crate::structs::{PetSnapshot, WeaponStats};

/// A player-controlled combatant: owner, roster, weapon, and vitals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionCombatant {
    /// The controlling account.
    pub owner: AccountId,
    /// Pets brought into battle; at least one.
    pub roster: Vec<PetSnapshot>,
    /// Index into `roster` of the pet currently contributing power.
    pub active_pet: usize,
    /// Equipped weapon snapshot.
    pub weapon: WeaponStats,
    /// Current hit points.
    pub hp: u32,
    /// Hit points at battle start.
    pub max_hp: u32,
    /// Elemental affinity multiplier applied to outgoing damage.
    pub affinity: Decimal,
    /// Active status effects.
    pub status: Vec<StatusEffect>,
    /// Consumables carried into the battle.
    pub items: Vec<ItemKind>,
}

/// A system-controlled combatant generated from a creature template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureCombatant {
    /// Template this creature was generated from.
    pub template: String,
    /// Level the stats were scaled to.
    pub level: u32,
    /// Flat attack contribution.
    pub attack: u32,
    /// Current hit points.
    pub hp: u32,
    /// Hit points at generation.
    pub max_hp: u32,
    /// Elemental affinity multiplier applied to outgoing damage.
    pub affinity: Decimal,
    /// Active status effects.
    pub status: Vec<StatusEffect>,
}

/// One side of a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "side", rename_all = "snake_case")]
pub enum Combatant {
    /// A player's champion.
    Champion(ChampionCombatant),
    /// A generated creature.
    Creature(CreatureCombatant),
}

impl Combatant {
    /// Current hit points.
    pub const fn current_hp(&self) -> u32 {
        match self {
            Self::Champion(c) => c.hp,
            Self::Creature(c) => c.hp,
        }
    }

    /// Hit points at battle start.
    pub const fn max_hp(&self) -> u32 {
        match self {
            Self::Champion(c) => c.max_hp,
            Self::Creature(c) => c.max_hp,
        }
    }

    /// Whether this combatant has been reduced to zero HP.
    pub const fn is_defeated(&self) -> bool {
        self.current_hp() == 0
    }

    /// The account controlling this combatant, if any.
    pub const fn owner_account(&self) -> Option<AccountId> {
        match self {
            Self::Champion(c) => Some(c.owner),
            Self::Creature(_) => None,
        }
    }

    /// Flat attack power: weapon attack plus the active pet's power for a
    /// champion, or the creature's attack.
    pub fn attack_power(&self) -> u32 {
        match self {
            Self::Champion(c) => {
                let pet_power = c
                    .roster
                    .get(c.active_pet)
                    .map_or(0, |p| p.power);
                c.weapon.attack.saturating_add(pet_power)
            }
            Self::Creature(c) => c.attack,
        }
    }

    /// Fractional damage bonus from socketed gems (one percent per power
    /// point). Creatures carry no gems.
    pub fn gem_bonus(&self) -> Decimal {
        match self {
            Self::Champion(c) => {
                let total: u32 = c
                    .weapon
                    .gems
                    .iter()
                    .fold(0_u32, |acc, g| acc.saturating_add(g.power));
                Decimal::new(i64::from(total), 2)
            }
            Self::Creature(_) => Decimal::ZERO,
        }
    }

    /// Elemental affinity multiplier for outgoing damage.
    pub const fn affinity(&self) -> Decimal {
        match self {
            Self::Champion(c) => c.affinity,
            Self::Creature(c) => c.affinity,
        }
    }

    /// Active status effects.
    pub fn active_modifiers(&self) -> &[StatusEffect] {
        match self {
            Self::Champion(c) => &c.status,
            Self::Creature(c) => &c.status,
        }
    }

    /// Whether a given status effect is active.
    pub fn has_status(&self, effect: StatusEffect) -> bool {
        self.active_modifiers().contains(&effect)
    }

    /// Add a status effect if not already present.
    pub fn push_status(&mut self, effect: StatusEffect) {
        let status = self.status_mut();
        if !status.contains(&effect) {
            status.push(effect);
        }
    }

    /// Remove a status effect if present.
    pub fn clear_status(&mut self, effect: StatusEffect) {
        self.status_mut().retain(|e| *e != effect);
    }

    /// Subtract `amount` from HP, saturating at zero. Returns the damage
    /// actually absorbed.
    pub const fn apply_damage(&mut self, amount: u32) -> u32 {
        let hp = self.hp_mut();
        let dealt = if amount > *hp { *hp } else { amount };
        *hp = hp.saturating_sub(amount);
        dealt
    }

    /// Restore HP, capped at the battle-start maximum.
    pub fn heal(&mut self, amount: u32) {
        let max = self.max_hp();
        let hp = self.hp_mut();
        *hp = hp.saturating_add(amount).min(max);
    }

    /// Short label for logs: owner ID for champions, template for creatures.
    pub fn label(&self) -> String {
        match self {
            Self::Champion(c) => format!("champion:{}", c.owner),
            Self::Creature(c) => format!("creature:{}", c.template),
        }
    }

    const fn hp_mut(&mut self) -> &mut u32 {
        match self {
            Self::Champion(c) => &mut c.hp,
            Self::Creature(c) => &mut c.hp,
        }
    }

    fn status_mut(&mut self) -> &mut Vec<StatusEffect> {
        match self {
            Self::Champion(c) => &mut c.status,
            Self::Creature(c) => &mut c.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Gem;

    fn champion() -> Combatant {
        Combatant::Champion(ChampionCombatant {
            owner: AccountId::new(1),
            roster: vec![
                PetSnapshot {
                    species: "ember fox".to_owned(),
                    power: 12,
                    level: 3,
                },
                PetSnapshot {
                    species: "river drake".to_owned(),
                    power: 20,
                    level: 5,
                },
            ],
            active_pet: 0,
            weapon: WeaponStats {
                name: "Worn Blade".to_owned(),
                attack: 30,
                gems: vec![Gem { power: 3 }, Gem { power: 2 }],
            },
            hp: 120,
            max_hp: 120,
            affinity: Decimal::ONE,
            status: Vec::new(),
            items: vec![ItemKind::Salve],
        })
    }

    #[test]
    fn attack_power_includes_active_pet() {
        let c = champion();
        assert_eq!(c.attack_power(), 42);
    }

    #[test]
    fn gem_bonus_is_one_percent_per_power_point() {
        let c = champion();
        assert_eq!(c.gem_bonus(), Decimal::new(5, 2));
    }

    #[test]
    fn apply_damage_saturates_at_zero() {
        let mut c = champion();
        let dealt = c.apply_damage(500);
        assert_eq!(dealt, 120);
        assert_eq!(c.current_hp(), 0);
        assert!(c.is_defeated());
    }

    #[test]
    fn heal_caps_at_max() {
        let mut c = champion();
        let _ = c.apply_damage(50);
        c.heal(500);
        assert_eq!(c.current_hp(), 120);
    }

    #[test]
    fn status_push_is_idempotent() {
        let mut c = champion();
        c.push_status(StatusEffect::Defending);
        c.push_status(StatusEffect::Defending);
        assert_eq!(c.active_modifiers().len(), 1);
        c.clear_status(StatusEffect::Defending);
        assert!(!c.has_status(StatusEffect::Defending));
    }

    #[test]
    fn creatures_have_no_owner_and_no_gems() {
        let c = Combatant::Creature(CreatureCombatant {
            template: "goblin".to_owned(),
            level: 1,
            attack: 6,
            hp: 30,
            max_hp: 30,
            affinity: Decimal::ONE,
            status: Vec::new(),
        });
        assert_eq!(c.owner_account(), None);
        assert_eq!(c.gem_bonus(), Decimal::ZERO);
        assert_eq!(c.attack_power(), 6);
    }
}
