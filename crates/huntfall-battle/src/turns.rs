//! Turn resolution: the state transitions of a single battle.
//!
//! These functions mutate a [`BattleState`] in place and report the winner
//! when a transition ends the battle. They assume the caller has already
//! verified the battle is awaiting an action and that the acting slot owns
//! the turn; the engine enforces both under the per-battle lock.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use huntfall_types::{BattleAction, BattleState, BattleStatus, Combatant, ItemKind, StatusEffect, TurnRecord};

use crate::config::BattleConfig;
use crate::damage;
use crate::BattleError;

/// Resolve one submitted action for `slot`. Returns the winning slot when
/// the action ends the battle.
pub(crate) fn resolve_action<R: Rng + ?Sized>(
    state: &mut BattleState,
    slot: usize,
    action: BattleAction,
    config: &BattleConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<Option<usize>, BattleError> {
    let opponent = BattleState::opponent_slot(slot);

    let mut damage_dealt = 0_u32;
    let mut opponent_hp_after = None;
    let mut winner = None;

    match action {
        BattleAction::Attack => {
            let variance = damage::roll_variance(rng);
            let raw = state
                .combatant(slot)
                .map(|attacker| damage::attack_damage(attacker, variance))
                .ok_or_else(|| invalid_slot(slot))?;

            let defender = state
                .combatants
                .get_mut(opponent)
                .ok_or_else(|| invalid_slot(opponent))?;
            let (mitigated, consumed_defend) = damage::mitigate(defender, raw);
            if consumed_defend {
                defender.clear_status(StatusEffect::Defending);
            }
            damage_dealt = defender.apply_damage(mitigated);
            opponent_hp_after = Some(defender.current_hp());
            if defender.is_defeated() {
                winner = Some(slot);
            }
        }
        BattleAction::Defend => {
            let actor = state
                .combatants
                .get_mut(slot)
                .ok_or_else(|| invalid_slot(slot))?;
            actor.push_status(StatusEffect::Defending);
        }
        BattleAction::UseItem { item } => {
            use_item(state, slot, item, config)?;
        }
        BattleAction::Switch { pet } => {
            switch_pet(state, slot, pet)?;
        }
        BattleAction::Surrender => {
            winner = Some(opponent);
        }
    }

    // Any action, including a surrender, proves the combatant is present.
    if let Some(count) = state.consecutive_timeouts.get_mut(slot) {
        *count = 0;
    }

    state.history.push(TurnRecord {
        turn: state.turn,
        actor: slot,
        action: Some(action),
        damage: damage_dealt,
        opponent_hp_after,
        timed_out: false,
        resolved_at: now,
    });

    advance(state, winner, config, now);
    Ok(winner)
}

/// Resolve a deadline expiry for the current turn owner.
///
/// The first expiry is recorded as a no-op turn; once the owner's
/// consecutive expiries reach the configured threshold the battle resolves
/// as that combatant's surrender.
pub(crate) fn resolve_timeout(
    state: &mut BattleState,
    config: &BattleConfig,
    now: DateTime<Utc>,
) -> Option<usize> {
    let slot = state.turn_owner;
    let opponent = BattleState::opponent_slot(slot);

    let expiries = state
        .consecutive_timeouts
        .get_mut(slot)
        .map(|count| {
            *count = count.saturating_add(1);
            *count
        })
        .unwrap_or(u32::MAX);

    let winner = (expiries >= config.timeout_surrender_threshold).then_some(opponent);

    state.history.push(TurnRecord {
        turn: state.turn,
        actor: slot,
        action: None,
        damage: 0,
        opponent_hp_after: None,
        timed_out: true,
        resolved_at: now,
    });

    advance(state, winner, config, now);
    winner
}

/// Finalize a turn: either close the battle or hand the turn over.
fn advance(
    state: &mut BattleState,
    winner: Option<usize>,
    config: &BattleConfig,
    now: DateTime<Utc>,
) {
    if let Some(winner) = winner {
        state.status = BattleStatus::Resolved;
        state.winner_slot = Some(winner);
        state.deadline = None;
    } else {
        state.turn = state.turn.saturating_add(1);
        state.turn_owner = BattleState::opponent_slot(state.turn_owner);
        state.deadline = now.checked_add_signed(Duration::seconds(
            i64::try_from(config.turn_timeout_secs).unwrap_or(i64::MAX),
        ));
    }
    state.updated_at = now;
}

/// Consume a carried item and apply its stat mutation.
fn use_item(
    state: &mut BattleState,
    slot: usize,
    item: ItemKind,
    config: &BattleConfig,
) -> Result<(), BattleError> {
    let combatant = state
        .combatants
        .get_mut(slot)
        .ok_or_else(|| invalid_slot(slot))?;

    let Combatant::Champion(champion) = combatant else {
        return Err(BattleError::InvalidAction {
            detail: "creatures carry no items".to_owned(),
        });
    };

    let Some(position) = champion.items.iter().position(|i| *i == item) else {
        return Err(BattleError::InvalidAction {
            detail: format!("item {item:?} is not carried"),
        });
    };
    champion.items.remove(position);

    match item {
        ItemKind::AttackTonic => {
            champion.weapon.attack = champion
                .weapon
                .attack
                .saturating_add(config.attack_tonic_bonus);
            if !champion.status.contains(&StatusEffect::Fortified) {
                champion.status.push(StatusEffect::Fortified);
            }
        }
        ItemKind::IronhideDraught => {
            if !champion.status.contains(&StatusEffect::Hardened) {
                champion.status.push(StatusEffect::Hardened);
            }
        }
        ItemKind::Salve => {
            champion.hp = champion
                .hp
                .saturating_add(config.salve_heal)
                .min(champion.max_hp);
        }
    }
    Ok(())
}

/// Bring a different roster pet into the active slot.
fn switch_pet(state: &mut BattleState, slot: usize, pet: usize) -> Result<(), BattleError> {
    let combatant = state
        .combatants
        .get_mut(slot)
        .ok_or_else(|| invalid_slot(slot))?;

    let Combatant::Champion(champion) = combatant else {
        return Err(BattleError::InvalidAction {
            detail: "creatures have no roster".to_owned(),
        });
    };

    if pet >= champion.roster.len() {
        return Err(BattleError::InvalidAction {
            detail: format!(
                "pet index {pet} out of range (roster size {})",
                champion.roster.len()
            ),
        });
    }
    champion.active_pet = pet;
    Ok(())
}

/// A combatant slot that does not exist; indicates a corrupt record.
fn invalid_slot(slot: usize) -> BattleError {
    BattleError::InvalidAction {
        detail: format!("combatant slot {slot} does not exist"),
    }
}
