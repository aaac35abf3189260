//! The battle engine: registry, lifecycle, checkpointing, and rewards.
//!
//! One [`BattleEngine`] instance serves every battle in the process. Each
//! battle lives in its own async-mutex cell, so no two turns of one battle
//! ever resolve concurrently while distinct battles (and scheduler ticks)
//! interleave freely. After every resolved turn the full state is
//! checkpointed to the battle store before the next turn is awaited -- a
//! crash loses at most the in-flight action.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use huntfall_events::{Notification, Notifier};
use huntfall_ledger::Ledger;
use huntfall_loot::RarityTable;
use huntfall_store::{BattleStore, SessionStore, StoreError};
use huntfall_types::{
    AccountId, BattleAction, BattleId, BattleKind, BattleRewards, BattleState, BattleStatus,
    ChampionCombatant, Combatant, ItemKind, OpponentSpec, PetSnapshot, WeaponStats,
};

use crate::BattleError;
use crate::config::BattleConfig;
use crate::creature;
use crate::turns;

/// Everything a player brings into a battle.
///
/// The command layer resolves equipment and rosters from its inventory
/// systems; the engine snapshots the loadout at battle start and never
/// reads inventory again.
#[derive(Debug, Clone, PartialEq)]
pub struct ChampionLoadout {
    /// The controlling account.
    pub owner: AccountId,
    /// Pets brought into battle; must be non-empty.
    pub roster: Vec<PetSnapshot>,
    /// Equipped weapon.
    pub weapon: WeaponStats,
    /// Starting hit points.
    pub max_hp: u32,
    /// Elemental affinity multiplier.
    pub affinity: Decimal,
    /// Consumables carried in.
    pub items: Vec<ItemKind>,
}

impl ChampionLoadout {
    fn into_combatant(self) -> Combatant {
        Combatant::Champion(ChampionCombatant {
            owner: self.owner,
            roster: self.roster,
            active_pet: 0,
            weapon: self.weapon,
            hp: self.max_hp,
            max_hp: self.max_hp,
            affinity: self.affinity,
            status: Vec::new(),
            items: self.items,
        })
    }
}

/// The battle engine service.
///
/// Generic over its collaborators so tests wire in-memory implementations
/// and a seeded rng; production wires the PostgreSQL stores and an
/// OS-seeded CSPRNG.
pub struct BattleEngine<L, S, B, N, R = StdRng> {
    ledger: L,
    sessions: S,
    store: B,
    notifier: N,
    config: BattleConfig,
    reward_table: RarityTable,
    cells: RwLock<BTreeMap<BattleId, Arc<Mutex<BattleState>>>>,
    rng: Mutex<R>,
}

impl<L, S, B, N> BattleEngine<L, S, B, N, StdRng>
where
    L: Ledger,
    S: SessionStore,
    B: BattleStore,
    N: Notifier,
{
    /// Create an engine drawing randomness from the operating system.
    pub fn new(
        ledger: L,
        sessions: S,
        store: B,
        notifier: N,
        config: BattleConfig,
        reward_table: RarityTable,
    ) -> Self {
        Self::with_rng(
            ledger,
            sessions,
            store,
            notifier,
            config,
            reward_table,
            StdRng::from_os_rng(),
        )
    }
}

impl<L, S, B, N, R> BattleEngine<L, S, B, N, R>
where
    L: Ledger,
    S: SessionStore,
    B: BattleStore,
    N: Notifier,
    R: Rng + Send,
{
    /// Create an engine with an explicit random source (seeded in tests).
    pub fn with_rng(
        ledger: L,
        sessions: S,
        store: B,
        notifier: N,
        config: BattleConfig,
        reward_table: RarityTable,
        rng: R,
    ) -> Self {
        Self {
            ledger,
            sessions,
            store,
            notifier,
            config,
            reward_table,
            cells: RwLock::new(BTreeMap::new()),
            rng: Mutex::new(rng),
        }
    }

    /// Reload every non-terminal battle from the store into the registry.
    ///
    /// Called once at startup; a battle interrupted mid-match resumes at
    /// its last checkpoint, missing at most the in-flight action.
    pub async fn resume(&self) -> Result<usize, BattleError> {
        let open = self.store.open_battles().await?;
        let count = open.len();
        let mut cells = self.cells.write().await;
        for battle in open {
            cells
                .entry(battle.id)
                .or_insert_with(|| Arc::new(Mutex::new(battle)));
        }
        info!(count, "Resumed open battles from store");
        Ok(count)
    }

    /// Start a battle between the initiator and the given opponent.
    ///
    /// Duels stay [`BattleStatus::Pending`] until the opponent confirms;
    /// PvE creatures auto-confirm, so those battles open awaiting the
    /// initiator's first action.
    pub async fn start(
        &self,
        initiator: ChampionLoadout,
        opponent: OpponentSpec,
        opponent_loadout: Option<ChampionLoadout>,
        now: DateTime<Utc>,
    ) -> Result<BattleState, BattleError> {
        if initiator.roster.is_empty() || initiator.max_hp == 0 {
            return Err(BattleError::InvalidAction {
                detail: "initiator loadout needs at least one pet and positive HP".to_owned(),
            });
        }

        let (kind, other, other_confirmed) = match opponent {
            OpponentSpec::Player { account_id } => {
                let loadout = opponent_loadout.ok_or_else(|| BattleError::InvalidAction {
                    detail: "duels need the opponent's loadout".to_owned(),
                })?;
                if loadout.owner != account_id {
                    return Err(BattleError::InvalidAction {
                        detail: "opponent loadout owner mismatch".to_owned(),
                    });
                }
                if account_id == initiator.owner {
                    return Err(BattleError::InvalidAction {
                        detail: "cannot duel yourself".to_owned(),
                    });
                }
                (BattleKind::Duel, loadout.into_combatant(), false)
            }
            OpponentSpec::Creature { template, level } => {
                let spec = self.config.templates.get(&template).ok_or_else(|| {
                    BattleError::InvalidAction {
                        detail: format!("unknown creature template {template:?}"),
                    }
                })?;
                let generated = {
                    let mut rng = self.rng.lock().await;
                    creature::generate(&template, spec, level, &mut *rng)
                };
                (BattleKind::Pve, Combatant::Creature(generated), true)
            }
        };

        let mut state = BattleState {
            id: BattleId::new(),
            kind,
            combatants: vec![initiator.into_combatant(), other],
            confirmed: vec![true, other_confirmed],
            turn: 0,
            turn_owner: 0,
            deadline: None,
            status: BattleStatus::Pending,
            winner_slot: None,
            consecutive_timeouts: vec![0, 0],
            history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };

        if state.all_confirmed() {
            self.activate(&mut state, now);
        }
        self.checkpoint(&mut state).await?;

        info!(battle_id = %state.id, kind = ?state.kind, status = ?state.status, "Battle started");

        let cell = Arc::new(Mutex::new(state.clone()));
        self.cells.write().await.insert(state.id, cell);
        Ok(state)
    }

    /// Confirm participation in a pending duel.
    ///
    /// When the last combatant confirms, the initial snapshot is taken and
    /// the battle opens awaiting the initiator's first action.
    pub async fn confirm(
        &self,
        battle_id: BattleId,
        account: AccountId,
        now: DateTime<Utc>,
    ) -> Result<BattleState, BattleError> {
        let cell = self.cell(battle_id).await?;
        let mut state = cell.lock().await;

        if state.status != BattleStatus::Pending {
            return Err(BattleError::InvalidAction {
                detail: format!("battle is {:?}, not pending", state.status),
            });
        }
        let slot = state
            .slot_of(account)
            .ok_or(BattleError::NotAParticipant { battle_id, account })?;
        if let Some(confirmed) = state.confirmed.get_mut(slot) {
            *confirmed = true;
        }

        if state.all_confirmed() {
            self.activate(&mut state, now);
        }
        self.checkpoint(&mut state).await?;
        Ok(state.clone())
    }

    /// Submit the turn owner's action and resolve the turn.
    ///
    /// Anyone but the current turn owner is rejected with
    /// [`BattleError::NotYourTurn`] and the state is untouched.
    pub async fn submit_action(
        &self,
        battle_id: BattleId,
        actor: AccountId,
        action: BattleAction,
        now: DateTime<Utc>,
    ) -> Result<BattleState, BattleError> {
        let cell = self.cell(battle_id).await?;
        let mut state = cell.lock().await;

        if state.status.is_terminal() {
            return Err(BattleError::Terminal {
                battle_id,
                status: state.status,
            });
        }
        if state.status != BattleStatus::AwaitingAction {
            return Err(BattleError::InvalidAction {
                detail: format!("battle is {:?}, not awaiting an action", state.status),
            });
        }
        let slot = state
            .slot_of(actor)
            .ok_or(BattleError::NotAParticipant { battle_id, account: actor })?;
        if slot != state.turn_owner {
            return Err(BattleError::NotYourTurn { battle_id, account: actor });
        }

        let mut winner = {
            let mut rng = self.rng.lock().await;
            turns::resolve_action(&mut state, slot, action, &self.config, &mut *rng, now)?
        };
        debug!(%battle_id, turn = state.turn, ?action, "Turn resolved");

        if winner.is_none() {
            winner = self.play_creature_turns(&mut state, now).await;
        }

        self.checkpoint(&mut state).await?;

        if let Some(winner_slot) = winner {
            self.settle(&state, winner_slot).await;
        }
        Ok(state.clone())
    }

    /// Sweep every open battle for an expired turn deadline.
    ///
    /// Returns the IDs of battles a timeout advanced or resolved. One
    /// battle's failure is logged and does not stop the sweep.
    pub async fn sweep_deadlines(&self, now: DateTime<Utc>) -> Vec<BattleId> {
        let cells: Vec<(BattleId, Arc<Mutex<BattleState>>)> = self
            .cells
            .read()
            .await
            .iter()
            .map(|(id, cell)| (*id, Arc::clone(cell)))
            .collect();

        let mut swept = Vec::new();
        for (battle_id, cell) in cells {
            let mut state = cell.lock().await;
            let expired = state.status == BattleStatus::AwaitingAction
                && state.deadline.is_some_and(|deadline| deadline <= now);
            if !expired {
                continue;
            }

            let timed_out_slot = state.turn_owner;
            let mut winner = turns::resolve_timeout(&mut state, &self.config, now);
            warn!(
                %battle_id,
                slot = timed_out_slot,
                resolved = winner.is_some(),
                "Turn deadline expired"
            );

            if winner.is_none() {
                winner = self.play_creature_turns(&mut state, now).await;
            }

            if let Err(err) = self.checkpoint(&mut state).await {
                error!(%battle_id, %err, "Checkpoint failed after timeout");
                continue;
            }
            if let Some(winner_slot) = winner {
                self.settle(&state, winner_slot).await;
            }
            swept.push(battle_id);
        }
        swept
    }

    /// Abandon a battle at any point before resolution. No rewards.
    pub async fn abandon(
        &self,
        battle_id: BattleId,
        now: DateTime<Utc>,
    ) -> Result<BattleState, BattleError> {
        let cell = self.cell(battle_id).await?;
        let mut state = cell.lock().await;

        if state.status.is_terminal() {
            return Err(BattleError::Terminal {
                battle_id,
                status: state.status,
            });
        }
        state.status = BattleStatus::Abandoned;
        state.deadline = None;
        state.updated_at = now;
        self.checkpoint(&mut state).await?;

        info!(%battle_id, "Battle abandoned");
        Ok(state.clone())
    }

    /// Snapshot the current state of a battle.
    pub async fn battle(&self, battle_id: BattleId) -> Result<BattleState, BattleError> {
        let cell = self.cell(battle_id).await?;
        let state = cell.lock().await;
        Ok(state.clone())
    }

    /// Take the initial snapshot and open the first turn.
    ///
    /// The `Active` phase is instantaneous here: the combatant snapshots
    /// were taken at start, so activation goes straight to awaiting the
    /// initiator's first action.
    fn activate(&self, state: &mut BattleState, now: DateTime<Utc>) {
        state.turn_owner = 0;
        state.status = BattleStatus::AwaitingAction;
        state.deadline = now.checked_add_signed(Duration::seconds(
            i64::try_from(self.config.turn_timeout_secs).unwrap_or(i64::MAX),
        ));
        state.updated_at = now;
    }

    /// Play out consecutive creature turns until a player owns the turn or
    /// the battle resolves. Creatures always attack.
    async fn play_creature_turns(
        &self,
        state: &mut BattleState,
        now: DateTime<Utc>,
    ) -> Option<usize> {
        while state.status == BattleStatus::AwaitingAction {
            let owner = state.turn_owner;
            let is_creature = state
                .combatant(owner)
                .is_some_and(|c| c.owner_account().is_none());
            if !is_creature {
                return None;
            }

            let result = {
                let mut rng = self.rng.lock().await;
                turns::resolve_action(
                    state,
                    owner,
                    BattleAction::Attack,
                    &self.config,
                    &mut *rng,
                    now,
                )
            };
            match result {
                Ok(Some(winner)) => return Some(winner),
                Ok(None) => {}
                Err(err) => {
                    error!(battle_id = %state.id, %err, "Creature turn failed");
                    return None;
                }
            }
        }
        None
    }

    /// Persist a checkpoint, retrying transient store failures with a
    /// bounded backoff. On success the in-memory state adopts the
    /// committed version token.
    async fn checkpoint(&self, state: &mut BattleState) -> Result<(), BattleError> {
        let mut attempt = 0_u32;
        loop {
            attempt = attempt.saturating_add(1);
            match self.store.save_battle(state).await {
                Ok(committed) => {
                    *state = committed;
                    return Ok(());
                }
                Err(StoreError::Transient { detail })
                    if attempt < self.config.checkpoint_attempts =>
                {
                    warn!(battle_id = %state.id, attempt, detail, "Checkpoint retry");
                    let backoff = self
                        .config
                        .checkpoint_backoff_ms
                        .saturating_mul(u64::from(attempt));
                    tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Distribute rewards for a resolved battle and emit the notification.
    ///
    /// Reward failures are logged, never propagated: the battle itself is
    /// already durably resolved.
    async fn settle(&self, state: &BattleState, winner_slot: usize) {
        let (coins, bonus_item) = {
            let mut rng = self.rng.lock().await;
            (
                huntfall_loot::coins(&self.reward_table, &mut *rng),
                huntfall_loot::bonus_drop(&self.reward_table, &mut *rng),
            )
        };

        let loser_slot = BattleState::opponent_slot(winner_slot);
        let creature_level = state.combatant(loser_slot).and_then(|c| match c {
            Combatant::Creature(creature) => Some(u64::from(creature.level)),
            Combatant::Champion(_) => None,
        });
        let experience = self.config.experience_base.saturating_add(
            creature_level
                .unwrap_or(0)
                .saturating_mul(self.config.experience_per_creature_level),
        );

        let rewards = BattleRewards {
            coins,
            experience,
            bonus_item,
        };
        let winner = state.winner_account();

        if let Some(account) = winner {
            if coins > 0 {
                if let Err(err) = self.ledger.apply(account, coins, "BATTLE_REWARD").await {
                    error!(battle_id = %state.id, %account, %err, "Reward payout failed");
                }
            }
            self.credit_experience(account, experience).await;
        }

        if let Err(err) = self
            .notifier
            .notify(Notification::BattleResolved {
                battle_id: state.id,
                winner,
                rewards,
            })
            .await
        {
            warn!(battle_id = %state.id, %err, "Battle notification failed");
        }
    }

    /// Credit battle experience as autohunt essence, when the winner has a
    /// session record. Version conflicts are retried against a fresh read.
    async fn credit_experience(&self, account: AccountId, experience: u64) {
        for _ in 0..3 {
            let session = match self.sessions.get_session(account).await {
                Ok(Some(session)) => session,
                Ok(None) => return,
                Err(err) => {
                    warn!(%account, %err, "Experience credit read failed");
                    return;
                }
            };
            let mut session = session;
            let gained =
                session.absorb_essence(experience, self.config.essence_level_base);
            match self.sessions.save_session(&session).await {
                Ok(_) => {
                    debug!(%account, experience, levels_gained = gained, "Experience credited");
                    return;
                }
                Err(StoreError::StaleVersion { .. }) => {}
                Err(err) => {
                    warn!(%account, %err, "Experience credit write failed");
                    return;
                }
            }
        }
        warn!(%account, "Experience credit gave up after version conflicts");
    }

    /// Look up a battle cell, falling back to the store for records not
    /// yet resident (e.g. after a restart without [`resume`]).
    ///
    /// [`resume`]: BattleEngine::resume
    async fn cell(&self, battle_id: BattleId) -> Result<Arc<Mutex<BattleState>>, BattleError> {
        if let Some(cell) = self.cells.read().await.get(&battle_id) {
            return Ok(Arc::clone(cell));
        }
        let Some(stored) = self.store.get_battle(battle_id).await? else {
            return Err(BattleError::NotFound { battle_id });
        };
        let mut cells = self.cells.write().await;
        let cell = cells
            .entry(battle_id)
            .or_insert_with(|| Arc::new(Mutex::new(stored)));
        Ok(Arc::clone(cell))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::rngs::SmallRng;

    use huntfall_events::RecordingNotifier;
    use huntfall_ledger::MemoryLedger;
    use huntfall_store::{MemoryBattleStore, MemorySessionStore};
    use huntfall_types::AutohuntSession;

    use super::*;

    type TestEngine = BattleEngine<
        Arc<MemoryLedger>,
        Arc<MemorySessionStore>,
        Arc<MemoryBattleStore>,
        Arc<RecordingNotifier>,
        SmallRng,
    >;

    struct Harness {
        engine: TestEngine,
        ledger: Arc<MemoryLedger>,
        sessions: Arc<MemorySessionStore>,
        store: Arc<MemoryBattleStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(seed: u64) -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let store = Arc::new(MemoryBattleStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = BattleEngine::with_rng(
            Arc::clone(&ledger),
            Arc::clone(&sessions),
            Arc::clone(&store),
            Arc::clone(&notifier),
            BattleConfig::default(),
            RarityTable::battle(),
            SmallRng::seed_from_u64(seed),
        );
        Harness {
            engine,
            ledger,
            sessions,
            store,
            notifier,
        }
    }

    fn loadout(owner: i64, attack: u32, hp: u32) -> ChampionLoadout {
        ChampionLoadout {
            owner: AccountId::new(owner),
            roster: vec![
                PetSnapshot {
                    species: "ember fox".to_owned(),
                    power: 10,
                    level: 2,
                },
                PetSnapshot {
                    species: "river drake".to_owned(),
                    power: 18,
                    level: 4,
                },
            ],
            weapon: WeaponStats {
                name: "Blade".to_owned(),
                attack,
                gems: Vec::new(),
            },
            max_hp: hp,
            affinity: Decimal::ONE,
            items: vec![ItemKind::Salve, ItemKind::AttackTonic],
        }
    }

    async fn open_duel(h: &Harness, now: DateTime<Utc>) -> BattleState {
        let battle = h
            .engine
            .start(
                loadout(1, 20, 400),
                OpponentSpec::Player {
                    account_id: AccountId::new(2),
                },
                Some(loadout(2, 20, 400)),
                now,
            )
            .await
            .unwrap();
        h.engine
            .confirm(battle.id, AccountId::new(2), now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duel_waits_for_confirmation_then_opens() {
        let h = harness(1);
        let now = Utc::now();

        let battle = h
            .engine
            .start(
                loadout(1, 20, 120),
                OpponentSpec::Player {
                    account_id: AccountId::new(2),
                },
                Some(loadout(2, 20, 120)),
                now,
            )
            .await
            .unwrap();
        assert_eq!(battle.status, BattleStatus::Pending);
        assert!(battle.deadline.is_none());

        let opened = h
            .engine
            .confirm(battle.id, AccountId::new(2), now)
            .await
            .unwrap();
        assert_eq!(opened.status, BattleStatus::AwaitingAction);
        assert_eq!(opened.turn_owner, 0);
        assert!(opened.deadline.is_some());
    }

    #[tokio::test]
    async fn pve_battle_opens_immediately() {
        let h = harness(2);
        let now = Utc::now();

        let battle = h
            .engine
            .start(
                loadout(1, 20, 120),
                OpponentSpec::Creature {
                    template: "goblin".to_owned(),
                    level: 1,
                },
                None,
                now,
            )
            .await
            .unwrap();
        assert_eq!(battle.kind, BattleKind::Pve);
        assert_eq!(battle.status, BattleStatus::AwaitingAction);
        assert!(battle.combatant(1).unwrap().owner_account().is_none());
    }

    #[tokio::test]
    async fn unknown_template_is_rejected() {
        let h = harness(3);
        let result = h
            .engine
            .start(
                loadout(1, 20, 120),
                OpponentSpec::Creature {
                    template: "basilisk".to_owned(),
                    level: 1,
                },
                None,
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(BattleError::InvalidAction { .. })));
    }

    #[tokio::test]
    async fn non_turn_owner_is_rejected_without_state_change() {
        let h = harness(4);
        let now = Utc::now();
        let battle = open_duel(&h, now).await;
        let before = h.engine.battle(battle.id).await.unwrap();

        // Slot 0 (account 1) owns the first turn; account 2 jumps the queue
        // twice, as in two racing submissions.
        for _ in 0..2 {
            let result = h
                .engine
                .submit_action(battle.id, AccountId::new(2), BattleAction::Attack, now)
                .await;
            assert!(matches!(result, Err(BattleError::NotYourTurn { .. })));
        }

        let after = h.engine.battle(battle.id).await.unwrap();
        assert_eq!(before, after);

        // The actual turn owner still goes through.
        let resolved = h
            .engine
            .submit_action(battle.id, AccountId::new(1), BattleAction::Attack, now)
            .await
            .unwrap();
        assert_eq!(resolved.turn_owner, 1);
        assert_eq!(resolved.history.len(), 1);
    }

    #[tokio::test]
    async fn outsider_is_not_a_participant() {
        let h = harness(5);
        let now = Utc::now();
        let battle = open_duel(&h, now).await;

        let result = h
            .engine
            .submit_action(battle.id, AccountId::new(99), BattleAction::Attack, now)
            .await;
        assert!(matches!(result, Err(BattleError::NotAParticipant { .. })));
    }

    #[tokio::test]
    async fn attack_damages_and_checkpoints_before_next_turn() {
        let h = harness(6);
        let now = Utc::now();
        let battle = open_duel(&h, now).await;
        let opening_version = battle.version;

        let resolved = h
            .engine
            .submit_action(battle.id, AccountId::new(1), BattleAction::Attack, now)
            .await
            .unwrap();

        let record = resolved.history.first().unwrap();
        assert!(record.damage > 0);
        assert!(!record.timed_out);
        assert!(resolved.combatant(1).unwrap().current_hp() < 400);

        // The checkpoint landed in the store before the call returned.
        let stored = h.store.get_battle(battle.id).await.unwrap().unwrap();
        assert_eq!(stored, resolved);
        assert!(stored.version > opening_version);
    }

    #[tokio::test]
    async fn surrender_resolves_and_pays_the_opponent() {
        let h = harness(7);
        let now = Utc::now();
        let battle = open_duel(&h, now).await;

        let resolved = h
            .engine
            .submit_action(battle.id, AccountId::new(1), BattleAction::Surrender, now)
            .await
            .unwrap();
        assert_eq!(resolved.status, BattleStatus::Resolved);
        assert_eq!(resolved.winner_slot, Some(1));
        assert_eq!(resolved.winner_account(), Some(AccountId::new(2)));

        // The battle reward table pays at least its minimum.
        let balance = h.ledger.balance(AccountId::new(2)).await.unwrap();
        assert!(balance >= RarityTable::battle().coins_min);

        let sent = h.notifier.drain().await;
        assert!(matches!(
            sent.as_slice(),
            [Notification::BattleResolved {
                winner: Some(w),
                ..
            }] if *w == AccountId::new(2),
        ));
    }

    #[tokio::test]
    async fn pve_creature_takes_its_turn_automatically() {
        let h = harness(8);
        let now = Utc::now();
        let battle = h
            .engine
            .start(
                loadout(1, 5, 500),
                OpponentSpec::Creature {
                    template: "goblin".to_owned(),
                    level: 1,
                },
                None,
                now,
            )
            .await
            .unwrap();

        let resolved = h
            .engine
            .submit_action(battle.id, AccountId::new(1), BattleAction::Attack, now)
            .await
            .unwrap();

        // Player turn plus the creature's automatic reply, and the turn is
        // back with the player.
        assert_eq!(resolved.history.len(), 2);
        assert_eq!(resolved.turn_owner, 0);
        assert!(resolved.combatant(0).unwrap().current_hp() < 500);
    }

    #[tokio::test]
    async fn double_timeout_auto_surrenders_in_pve() {
        let h = harness(9);
        let start = Utc::now();
        let battle = h
            .engine
            .start(
                loadout(1, 5, 500),
                OpponentSpec::Creature {
                    template: "goblin".to_owned(),
                    level: 1,
                },
                None,
                start,
            )
            .await
            .unwrap();

        // First expiry: no-op turn recorded, creature replies, player's
        // turn again with a fresh deadline.
        let after_first = start + Duration::seconds(61);
        let swept = h.engine.sweep_deadlines(after_first).await;
        assert_eq!(swept, vec![battle.id]);

        let state = h.engine.battle(battle.id).await.unwrap();
        assert_eq!(state.status, BattleStatus::AwaitingAction);
        assert!(state.history.iter().any(|r| r.timed_out));

        // Second consecutive expiry on the player's turn: auto-surrender,
        // creature wins.
        let after_second = after_first + Duration::seconds(61);
        let swept = h.engine.sweep_deadlines(after_second).await;
        assert_eq!(swept, vec![battle.id]);

        let state = h.engine.battle(battle.id).await.unwrap();
        assert_eq!(state.status, BattleStatus::Resolved);
        assert_eq!(state.winner_slot, Some(1));
        assert_eq!(state.winner_account(), None);

        // A creature win credits nobody.
        assert_eq!(h.ledger.balance(AccountId::new(1)).await.unwrap(), 0);
        let sent = h.notifier.drain().await;
        assert!(matches!(
            sent.as_slice(),
            [Notification::BattleResolved { winner: None, .. }],
        ));
    }

    #[tokio::test]
    async fn action_resets_the_timeout_counter() {
        let h = harness(10);
        let start = Utc::now();
        let battle = h
            .engine
            .start(
                loadout(1, 5, 500),
                OpponentSpec::Creature {
                    template: "goblin".to_owned(),
                    level: 1,
                },
                None,
                start,
            )
            .await
            .unwrap();

        let after_first = start + Duration::seconds(61);
        let _ = h.engine.sweep_deadlines(after_first).await;

        // The player shows up and acts; their counter resets.
        let acted = h
            .engine
            .submit_action(
                battle.id,
                AccountId::new(1),
                BattleAction::Defend,
                after_first,
            )
            .await
            .unwrap();
        assert_eq!(acted.consecutive_timeouts.first().copied(), Some(0));

        // A later single expiry is again only a skipped turn.
        let after_second = after_first + Duration::seconds(61);
        let _ = h.engine.sweep_deadlines(after_second).await;
        let state = h.engine.battle(battle.id).await.unwrap();
        assert_eq!(state.status, BattleStatus::AwaitingAction);
    }

    #[tokio::test]
    async fn sweep_ignores_unexpired_battles() {
        let h = harness(11);
        let now = Utc::now();
        let battle = open_duel(&h, now).await;

        let swept = h.engine.sweep_deadlines(now + Duration::seconds(10)).await;
        assert!(swept.is_empty());
        assert_eq!(
            h.engine.battle(battle.id).await.unwrap().status,
            BattleStatus::AwaitingAction,
        );
    }

    #[tokio::test]
    async fn salve_heals_the_user() {
        let h = harness(12);
        let now = Utc::now();
        let battle = h
            .engine
            .start(
                loadout(1, 5, 500),
                OpponentSpec::Creature {
                    template: "orc".to_owned(),
                    level: 3,
                },
                None,
                now,
            )
            .await
            .unwrap();

        // Take a hit from the orc's automatic reply first.
        let hurt = h
            .engine
            .submit_action(battle.id, AccountId::new(1), BattleAction::Attack, now)
            .await
            .unwrap();
        let hp_before = hurt.combatant(0).unwrap().current_hp();
        assert!(hp_before < 500);

        let healed = h
            .engine
            .submit_action(
                battle.id,
                AccountId::new(1),
                BattleAction::UseItem {
                    item: ItemKind::Salve,
                },
                now,
            )
            .await
            .unwrap();
        // Salve lands before the creature's next reply, so the net change
        // over the round is the heal minus one incoming hit.
        assert!(healed.history.len() >= 4);

        // The salve is consumed: a second use is invalid.
        let again = h
            .engine
            .submit_action(
                battle.id,
                AccountId::new(1),
                BattleAction::UseItem {
                    item: ItemKind::Salve,
                },
                now,
            )
            .await;
        assert!(matches!(again, Err(BattleError::InvalidAction { .. })));
    }

    #[tokio::test]
    async fn switch_changes_the_active_pet() {
        let h = harness(13);
        let now = Utc::now();
        let battle = open_duel(&h, now).await;

        let switched = h
            .engine
            .submit_action(
                battle.id,
                AccountId::new(1),
                BattleAction::Switch { pet: 1 },
                now,
            )
            .await
            .unwrap();
        let active_pet = match switched.combatant(0).unwrap() {
            Combatant::Champion(champion) => Some(champion.active_pet),
            Combatant::Creature(_) => None,
        };
        assert_eq!(active_pet, Some(1));

        // Out-of-range switch from the other side is rejected.
        let result = h
            .engine
            .submit_action(
                battle.id,
                AccountId::new(2),
                BattleAction::Switch { pet: 7 },
                now,
            )
            .await;
        assert!(matches!(result, Err(BattleError::InvalidAction { .. })));
    }

    #[tokio::test]
    async fn abandon_skips_rewards_and_sticks() {
        let h = harness(14);
        let now = Utc::now();
        let battle = open_duel(&h, now).await;

        let abandoned = h.engine.abandon(battle.id, now).await.unwrap();
        assert_eq!(abandoned.status, BattleStatus::Abandoned);
        assert!(h.notifier.drain().await.is_empty());
        assert_eq!(h.ledger.balance(AccountId::new(1)).await.unwrap(), 0);
        assert_eq!(h.ledger.balance(AccountId::new(2)).await.unwrap(), 0);

        // Terminal records reject everything afterwards.
        let action = h
            .engine
            .submit_action(battle.id, AccountId::new(1), BattleAction::Attack, now)
            .await;
        assert!(matches!(action, Err(BattleError::Terminal { .. })));
        let again = h.engine.abandon(battle.id, now).await;
        assert!(matches!(again, Err(BattleError::Terminal { .. })));
    }

    #[tokio::test]
    async fn resume_picks_up_open_battles_from_the_store() {
        let h = harness(15);
        let now = Utc::now();
        let battle = open_duel(&h, now).await;

        // A second engine instance over the same store, as after a crash.
        let second = BattleEngine::with_rng(
            Arc::clone(&h.ledger),
            Arc::clone(&h.sessions),
            Arc::clone(&h.store),
            Arc::clone(&h.notifier),
            BattleConfig::default(),
            RarityTable::battle(),
            SmallRng::seed_from_u64(99),
        );
        let count = second.resume().await.unwrap();
        assert_eq!(count, 1);

        // The match continues from its last checkpoint.
        let resolved = second
            .submit_action(battle.id, AccountId::new(1), BattleAction::Attack, now)
            .await
            .unwrap();
        assert_eq!(resolved.history.len(), 1);
    }

    #[tokio::test]
    async fn experience_lands_in_the_winners_session() {
        let h = harness(16);
        let now = Utc::now();

        // Account 2 has an autohunt session; account 1 does not.
        let session = AutohuntSession {
            account_id: AccountId::new(2),
            enabled: true,
            cadence_secs: 300,
            last_run: now,
            essence: 10,
            level: 1,
            display_ref: None,
            version: 0,
        };
        let _ = h.sessions.save_session(&session).await.unwrap();

        let battle = open_duel(&h, now).await;
        let _ = h
            .engine
            .submit_action(battle.id, AccountId::new(1), BattleAction::Surrender, now)
            .await
            .unwrap();

        let updated = h
            .sessions
            .get_session(AccountId::new(2))
            .await
            .unwrap()
            .unwrap();
        // experience_base (25) on top of the starting 10.
        assert_eq!(updated.essence, 35);
    }
}
