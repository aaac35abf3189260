//! PvE creature generation from level-scaled templates.
//!
//! Templates are data: base stats plus per-level growth applied at
//! generation time, with a small random spread so repeated encounters do
//! not feel stamped out. Deterministic when given a seeded rng.

use std::collections::BTreeMap;

use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;

use huntfall_types::CreatureCombatant;

/// Per-level HP growth, in percent of base.
const HP_GROWTH_PCT: u32 = 25;

/// Per-level attack growth, in percent of base.
const ATTACK_GROWTH_PCT: u32 = 18;

/// Half-width of the random stat spread, in percent.
const SPREAD_PCT: u32 = 10;

/// A creature archetype the engine can scale and spawn.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatureTemplate {
    /// Hit points at level 1.
    pub base_hp: u32,
    /// Attack at level 1.
    pub base_attack: u32,
    /// Experience granted per creature level when defeated.
    pub experience: u64,
}

/// The stock template set: a gradient from fodder to boss.
pub fn stock_templates() -> BTreeMap<String, CreatureTemplate> {
    BTreeMap::from([
        (
            "goblin".to_owned(),
            CreatureTemplate {
                base_hp: 30,
                base_attack: 6,
                experience: 10,
            },
        ),
        (
            "orc".to_owned(),
            CreatureTemplate {
                base_hp: 70,
                base_attack: 12,
                experience: 25,
            },
        ),
        (
            "wyrm".to_owned(),
            CreatureTemplate {
                base_hp: 200,
                base_attack: 35,
                experience: 100,
            },
        ),
    ])
}

/// Generate a combatant from a template at the given level.
///
/// Stats grow linearly with level and then wobble within
/// ±[`SPREAD_PCT`] percent; HP and attack never fall below 1.
pub fn generate<R: Rng + ?Sized>(
    name: &str,
    template: &CreatureTemplate,
    level: u32,
    rng: &mut R,
) -> CreatureCombatant {
    let level = level.max(1);
    let hp = spread(scale(template.base_hp, level, HP_GROWTH_PCT), rng).max(1);
    let attack = spread(scale(template.base_attack, level, ATTACK_GROWTH_PCT), rng).max(1);

    CreatureCombatant {
        template: name.to_owned(),
        level,
        attack,
        hp,
        max_hp: hp,
        affinity: Decimal::ONE,
        status: Vec::new(),
    }
}

/// Linear level scaling: `base * (100 + (level - 1) * growth_pct) / 100`.
fn scale(base: u32, level: u32, growth_pct: u32) -> u32 {
    let growth = level
        .saturating_sub(1)
        .saturating_mul(growth_pct)
        .saturating_add(100);
    u64::from(base)
        .saturating_mul(u64::from(growth))
        .checked_div(100)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(u32::MAX)
}

/// Apply the ±[`SPREAD_PCT`] percent random wobble.
fn spread<R: Rng + ?Sized>(value: u32, rng: &mut R) -> u32 {
    let low = 100_u32.saturating_sub(SPREAD_PCT);
    let pct = rng.random_range(low..=100_u32.saturating_add(SPREAD_PCT));
    u64::from(value)
        .saturating_mul(u64::from(pct))
        .checked_div(100)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(u32::MAX)
}
