//! The draw functions: weighted selection over a rarity table.

use rand::Rng;

use huntfall_types::{LootDraw, RewardItem};

use crate::tables::{DropSpec, RarityTable};

/// Perform one full loot draw: coins plus an optional item drop.
///
/// Deterministic for a fixed `rng`; the coin roll always consumes one
/// draw, the item pick one more, and the drop-chance roll a third (when
/// the table has drops), so sequences reproduce exactly under a seed.
pub fn draw<R: Rng + ?Sized>(table: &RarityTable, rng: &mut R) -> LootDraw {
    let coins = roll_coins(table, rng);

    let mut items = Vec::new();
    if let Some(pick) = weighted_pick(&table.drops, rng) {
        // Heavier entries drop a little more readily, clamped so nothing
        // is ever guaranteed.
        let boost = pick
            .weight
            .checked_div(table.drop_chance_weight_divisor)
            .unwrap_or(0);
        let chance = table
            .base_drop_chance_pct
            .saturating_add(boost)
            .min(table.max_drop_chance_pct);
        if rng.random_range(0..100) < chance {
            items.push(to_reward(pick));
        }
    }

    LootDraw { coins, items }
}

/// Roll only the coin component of a table.
///
/// Battle payouts use this together with [`bonus_drop`]; the scheduler's
/// full hunt pass uses [`draw`].
pub fn coins<R: Rng + ?Sized>(table: &RarityTable, rng: &mut R) -> i64 {
    roll_coins(table, rng)
}

/// Roll the post-battle bonus drop at the table's bonus chance.
///
/// Returns `None` when the roll misses or the table has no drops.
pub fn bonus_drop<R: Rng + ?Sized>(table: &RarityTable, rng: &mut R) -> Option<RewardItem> {
    if table.drops.is_empty() {
        return None;
    }
    if rng.random_range(0..100) >= table.bonus_drop_chance_pct {
        return None;
    }
    weighted_pick(&table.drops, rng).map(to_reward)
}

/// Roll coins uniformly over the table's inclusive range.
fn roll_coins<R: Rng + ?Sized>(table: &RarityTable, rng: &mut R) -> i64 {
    if table.coins_min >= table.coins_max {
        return table.coins_min;
    }
    rng.random_range(table.coins_min..=table.coins_max)
}

/// Choose one drop proportionally to its weight.
///
/// Entries with zero weight are never chosen; returns `None` for an empty
/// list or an all-zero list.
fn weighted_pick<'a, R: Rng + ?Sized>(
    drops: &'a [DropSpec],
    rng: &mut R,
) -> Option<&'a DropSpec> {
    let total: u64 = drops
        .iter()
        .fold(0_u64, |acc, d| acc.saturating_add(u64::from(d.weight)));
    if total == 0 {
        return None;
    }

    let mut pick = rng.random_range(0..total);
    for drop in drops {
        let weight = u64::from(drop.weight);
        if pick < weight {
            return Some(drop);
        }
        pick = pick.saturating_sub(weight);
    }
    drops.last()
}

/// Materialize a drop spec into a concrete reward.
fn to_reward(spec: &DropSpec) -> RewardItem {
    RewardItem {
        name: spec.name.clone(),
        kind: spec.kind,
        rarity: spec.rarity,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use huntfall_types::{Rarity, RewardKind};

    use super::*;

    #[test]
    fn identical_seeds_yield_identical_sequences() {
        let table = RarityTable::autohunt();

        let mut a = SmallRng::seed_from_u64(1234);
        let mut b = SmallRng::seed_from_u64(1234);

        for _ in 0..50 {
            assert_eq!(draw(&table, &mut a), draw(&table, &mut b));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let table = RarityTable::autohunt();

        let mut a = SmallRng::seed_from_u64(1);
        let mut b = SmallRng::seed_from_u64(2);

        let runs_a: Vec<LootDraw> = (0..20).map(|_| draw(&table, &mut a)).collect();
        let runs_b: Vec<LootDraw> = (0..20).map(|_| draw(&table, &mut b)).collect();
        assert_ne!(runs_a, runs_b);
    }

    #[test]
    fn coins_stay_in_range() {
        let table = RarityTable::autohunt();
        let mut rng = SmallRng::seed_from_u64(99);

        for _ in 0..200 {
            let result = draw(&table, &mut rng);
            assert!(result.coins >= table.coins_min);
            assert!(result.coins <= table.coins_max);
            assert!(result.items.len() <= 1);
        }
    }

    #[test]
    fn degenerate_coin_range_yields_min() {
        let mut table = RarityTable::autohunt();
        table.coins_min = 7;
        table.coins_max = 7;
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(draw(&table, &mut rng).coins, 7);
    }

    #[test]
    fn empty_drop_list_never_drops_items() {
        let mut table = RarityTable::autohunt();
        table.drops.clear();
        let mut rng = SmallRng::seed_from_u64(5);

        for _ in 0..50 {
            assert!(draw(&table, &mut rng).items.is_empty());
        }
        assert!(bonus_drop(&table, &mut rng).is_none());
    }

    #[test]
    fn zero_weight_entries_are_never_picked() {
        let mut table = RarityTable::autohunt();
        for drop in &mut table.drops {
            if drop.name != "Big Gem" {
                drop.weight = 0;
            }
        }
        let mut rng = SmallRng::seed_from_u64(11);

        for _ in 0..200 {
            let result = draw(&table, &mut rng);
            for item in &result.items {
                assert_eq!(item.name, "Big Gem");
                assert_eq!(item.rarity, Rarity::Rare);
            }
        }
    }

    #[test]
    fn heavier_entries_dominate_over_many_draws() {
        let table = RarityTable::autohunt();
        let mut rng = SmallRng::seed_from_u64(7);

        let mut common = 0_u32;
        let mut rare = 0_u32;
        for _ in 0..2_000 {
            for item in draw(&table, &mut rng).items {
                match item.kind {
                    RewardKind::Gem { power: 2 } => common += 1,
                    RewardKind::Gem { power: 5 } => rare += 1,
                    _ => {}
                }
            }
        }
        // 70 vs 20 weight: the common gem should clearly dominate.
        assert!(common > rare * 2, "common {common} vs rare {rare}");
    }

    #[test]
    fn bonus_drop_respects_zero_chance() {
        let mut table = RarityTable::battle();
        table.bonus_drop_chance_pct = 0;
        let mut rng = SmallRng::seed_from_u64(3);

        for _ in 0..100 {
            assert!(bonus_drop(&table, &mut rng).is_none());
        }
    }

    #[test]
    fn bonus_drop_always_hits_at_full_chance() {
        let mut table = RarityTable::battle();
        table.bonus_drop_chance_pct = 100;
        let mut rng = SmallRng::seed_from_u64(3);

        for _ in 0..100 {
            assert!(bonus_drop(&table, &mut rng).is_some());
        }
    }
}
