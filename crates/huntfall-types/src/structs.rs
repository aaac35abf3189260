//! Core entity structs: accounts, ledger records, sessions, and battles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::enums::{BattleAction, BattleKind, BattleStatus, Rarity, RewardKind};
use crate::ids::{AccountId, BattleId, DisplayRef, LedgerEntryId};

// ---------------------------------------------------------------------------
// Economy
// ---------------------------------------------------------------------------

/// An economic identity and its current committed balance.
///
/// Only the ledger's atomic apply primitive may mutate an account; the
/// `version` token increments on every committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The owning platform identity.
    pub id: AccountId,
    /// Whole-unit currency balance; never negative at a committed state.
    pub balance: i64,
    /// Monotonically increasing row version.
    pub version: u64,
}

/// One immutable balance mutation record.
///
/// The entry log is append-only; replaying an account's deltas in order
/// reconstructs its balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry identifier.
    pub id: LedgerEntryId,
    /// The account whose balance changed.
    pub account_id: AccountId,
    /// Signed change applied to the balance.
    pub delta: i64,
    /// The balance immediately after this entry committed.
    pub balance_after: i64,
    /// Reason tag (e.g. `"AUTOHUNT_COST"`, `"BATTLE_REWARD"`, `"PAY_OUT"`).
    pub reason: String,
    /// Real-world commit timestamp.
    pub created_at: DateTime<Utc>,
}

/// Receipt for a completed account-to-account transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// The debited account.
    pub from: AccountId,
    /// The credited account.
    pub to: AccountId,
    /// Whole units moved (always positive).
    pub amount: i64,
    /// Sender balance after the transfer.
    pub from_balance: i64,
    /// Recipient balance after the transfer.
    pub to_balance: i64,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Autohunt sessions
// ---------------------------------------------------------------------------

/// A per-account recurring automated hunt cycle.
///
/// Created on first enable and kept forever: disabling flips the flag,
/// re-enabling reuses the record with its accumulated essence and level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutohuntSession {
    /// The owning account (unique key).
    pub account_id: AccountId,
    /// Whether the scheduler currently processes this session.
    pub enabled: bool,
    /// Minimum seconds between successive processing passes.
    pub cadence_secs: u64,
    /// When the session was last processed.
    pub last_run: DateTime<Utc>,
    /// Accumulated essence; crossing level thresholds promotes the session.
    pub essence: u64,
    /// Current session level; scales per-cycle cost and rewards.
    pub level: u32,
    /// Handle to the live display surface, once one has been created.
    pub display_ref: Option<DisplayRef>,
    /// Optimistic concurrency token.
    pub version: u64,
}

impl AutohuntSession {
    /// The level a given essence total corresponds to.
    ///
    /// Levels follow a quadratic curve: reaching level `n` (1-based)
    /// requires `level_base * (n - 1)^2` essence, so early levels come
    /// quickly and later ones stretch out.
    pub fn level_for_essence(essence: u64, level_base: u64) -> u32 {
        if level_base == 0 {
            return 1;
        }
        let steps = essence.checked_div(level_base).unwrap_or(0).isqrt();
        u32::try_from(steps.saturating_add(1)).unwrap_or(u32::MAX)
    }

    /// Add essence and promote the level across any thresholds crossed.
    /// Returns the number of levels gained.
    pub fn absorb_essence(&mut self, amount: u64, level_base: u64) -> u32 {
        self.essence = self.essence.saturating_add(amount);
        let new_level = Self::level_for_essence(self.essence, level_base);
        let gained = new_level.saturating_sub(self.level);
        self.level = new_level.max(self.level);
        gained
    }
}

// ---------------------------------------------------------------------------
// Loadout pieces
// ---------------------------------------------------------------------------

/// A gem socketed into a weapon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gem {
    /// Gem power; each point contributes one percent of damage bonus.
    pub power: u32,
}

/// Snapshot of an equipped weapon at battle start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponStats {
    /// Display name.
    pub name: String,
    /// Flat attack contribution.
    pub attack: u32,
    /// Socketed gems.
    pub gems: Vec<Gem>,
}

/// Snapshot of one pet on a combatant's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetSnapshot {
    /// Species name.
    pub species: String,
    /// Power contributed while this pet is active.
    pub power: u32,
    /// Pet level at snapshot time.
    pub level: u32,
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

/// A concrete reward produced by the loot resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardItem {
    /// Display name.
    pub name: String,
    /// What the item is.
    pub kind: RewardKind,
    /// Rarity tier.
    pub rarity: Rarity,
}

/// The outcome of one loot draw: coins plus any dropped items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootDraw {
    /// Coins awarded.
    pub coins: i64,
    /// Items dropped (usually zero or one).
    pub items: Vec<RewardItem>,
}

/// Everything the winner of a battle walks away with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRewards {
    /// Coins credited through the ledger.
    pub coins: i64,
    /// Experience awarded (credited as autohunt essence where a session
    /// exists).
    pub experience: u64,
    /// The probabilistic bonus drop, if it hit.
    pub bonus_item: Option<RewardItem>,
}

// ---------------------------------------------------------------------------
// Battles
// ---------------------------------------------------------------------------

/// One resolved turn in a battle's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Zero-based turn index.
    pub turn: u32,
    /// Combatant slot that owned the turn.
    pub actor: usize,
    /// The action taken; `None` records a deadline-expiry no-op.
    pub action: Option<BattleAction>,
    /// Damage dealt to the opponent this turn (0 for non-attacks).
    pub damage: u32,
    /// Opponent HP after the turn resolved, where damage was dealt.
    pub opponent_hp_after: Option<u32>,
    /// Whether this turn was forced by a deadline expiry.
    pub timed_out: bool,
    /// When the turn resolved.
    pub resolved_at: DateTime<Utc>,
}

/// The full durable state of one battle.
///
/// Checkpointed to the battle store after every resolved turn, so a crash
/// loses at most the in-flight action. Terminal records are retained for
/// audit and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleState {
    /// Unique battle identifier.
    pub id: BattleId,
    /// Duel or PvE.
    pub kind: BattleKind,
    /// The two combatant snapshots, by slot.
    pub combatants: Vec<Combatant>,
    /// Slots that have confirmed participation.
    pub confirmed: Vec<bool>,
    /// Zero-based index of the next turn to resolve.
    pub turn: u32,
    /// Slot whose action the engine is waiting for.
    pub turn_owner: usize,
    /// When the current turn forfeits if no action arrives.
    pub deadline: Option<DateTime<Utc>>,
    /// Lifecycle status.
    pub status: BattleStatus,
    /// Winning slot once resolved.
    pub winner_slot: Option<usize>,
    /// Per-slot count of consecutive deadline expiries; reset by any action.
    pub consecutive_timeouts: Vec<u32>,
    /// Every resolved turn, oldest first.
    pub history: Vec<TurnRecord>,
    /// Optimistic concurrency token.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last checkpoint timestamp.
    pub updated_at: DateTime<Utc>,
}

impl BattleState {
    /// Borrow the combatant in `slot`, if the slot exists.
    pub fn combatant(&self, slot: usize) -> Option<&Combatant> {
        self.combatants.get(slot)
    }

    /// The opposing slot in a two-combatant battle.
    pub const fn opponent_slot(slot: usize) -> usize {
        if slot == 0 { 1 } else { 0 }
    }

    /// The slot owned by `account`, if that account is fighting here.
    pub fn slot_of(&self, account: AccountId) -> Option<usize> {
        self.combatants
            .iter()
            .position(|c| c.owner_account() == Some(account))
    }

    /// The account owning the winning slot, if the winner is a player.
    pub fn winner_account(&self) -> Option<AccountId> {
        self.winner_slot
            .and_then(|slot| self.combatants.get(slot))
            .and_then(Combatant::owner_account)
    }

    /// Whether every slot has confirmed participation.
    pub fn all_confirmed(&self) -> bool {
        self.confirmed.iter().all(|c| *c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_slot_flips() {
        assert_eq!(BattleState::opponent_slot(0), 1);
        assert_eq!(BattleState::opponent_slot(1), 0);
    }

    #[test]
    fn essence_levels_follow_quadratic_curve() {
        // base 100: level 1 at 0, level 2 at 100, level 3 at 400.
        assert_eq!(AutohuntSession::level_for_essence(0, 100), 1);
        assert_eq!(AutohuntSession::level_for_essence(99, 100), 1);
        assert_eq!(AutohuntSession::level_for_essence(100, 100), 2);
        assert_eq!(AutohuntSession::level_for_essence(399, 100), 2);
        assert_eq!(AutohuntSession::level_for_essence(400, 100), 3);
    }

    #[test]
    fn absorb_essence_reports_levels_gained() {
        let mut session = AutohuntSession {
            account_id: AccountId::new(1),
            enabled: true,
            cadence_secs: 300,
            last_run: Utc::now(),
            essence: 90,
            level: 1,
            display_ref: None,
            version: 0,
        };
        assert_eq!(session.absorb_essence(5, 100), 0);
        assert_eq!(session.level, 1);
        assert_eq!(session.absorb_essence(310, 100), 2);
        assert_eq!(session.level, 3);
        assert_eq!(session.essence, 405);
    }

    #[test]
    fn ledger_entry_roundtrip_serde() {
        let entry = LedgerEntry {
            id: LedgerEntryId::new(),
            account_id: AccountId::new(7),
            delta: -25,
            balance_after: 75,
            reason: "AUTOHUNT_COST".to_owned(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&entry).ok();
        let back: Result<LedgerEntry, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert_eq!(back.ok(), Some(entry));
    }
}
