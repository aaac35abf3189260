//! Damage resolution: a deterministic core with bounded randomness.
//!
//! The formula is
//!
//! ```text
//! damage = floor((weapon_attack + pet_power) * (1 + gem_bonus) * affinity * (1 + r))
//! ```
//!
//! with `r` uniform in `[0, 0.2)`. All fractional factors are [`Decimal`];
//! no floats enter the calculation, so identical inputs and draws always
//! produce identical damage. Production call sites draw `r` from an
//! OS-seeded `StdRng` (a cryptographically strong source), so outcomes
//! cannot be predicted or replayed by an external actor; tests inject a
//! seeded rng.
//!
//! Mitigation is applied on the defender after the raw roll: defending
//! halves one incoming hit, a hardened skin absorbs a quarter.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use huntfall_types::{Combatant, StatusEffect};

/// Granularity of the variance draw: thousandths.
const VARIANCE_SCALE: u32 = 3;

/// Exclusive upper bound of the variance draw, in thousandths (0.200).
const VARIANCE_CEILING: i64 = 200;

/// Draw the damage variance term `r` uniformly from `[0, 0.2)`.
pub fn roll_variance<R: Rng + ?Sized>(rng: &mut R) -> Decimal {
    Decimal::new(rng.random_range(0..VARIANCE_CEILING), VARIANCE_SCALE)
}

/// Compute the raw outgoing damage for an attacker given a variance draw.
///
/// Monotonic in attack power: raising weapon attack or active pet power
/// never lowers the result for the same draw.
pub fn attack_damage(attacker: &Combatant, variance: Decimal) -> u32 {
    let base = Decimal::from(attacker.attack_power());
    let gem_factor = Decimal::ONE.saturating_add(attacker.gem_bonus());
    let variance_factor = Decimal::ONE.saturating_add(variance);

    let product = base
        .saturating_mul(gem_factor)
        .saturating_mul(attacker.affinity())
        .saturating_mul(variance_factor);

    product.floor().to_u32().unwrap_or(u32::MAX)
}

/// Apply the defender's mitigation to a raw damage roll.
///
/// Defending halves the hit (rounding down); a hardened skin then absorbs
/// a quarter of what remains. The `Defending` mark is consumed by exactly
/// one hit -- the caller clears it after this returns `true` in the second
/// tuple position.
pub fn mitigate(defender: &Combatant, raw: u32) -> (u32, bool) {
    let mut damage = raw;
    let consumed_defend = defender.has_status(StatusEffect::Defending);
    if consumed_defend {
        damage = damage.checked_div(2).unwrap_or(0);
    }
    if defender.has_status(StatusEffect::Hardened) {
        // Keep three quarters, rounding in the defender's favor.
        damage = damage
            .saturating_mul(3)
            .checked_div(4)
            .unwrap_or(0);
    }
    (damage, consumed_defend)
}
