//! The autohunt scheduler: one periodic controller for every session.
//!
//! There is never a background task per user. A single controller selects
//! the sessions that are due (`enabled AND last_run + cadence <= now`,
//! oldest-due first), processes at most a batch of them per tick with a
//! bounded worker pool, and drives the ledger and session store. Display
//! updates are best-effort and never roll back committed economics.
//!
//! Per tick: `select-due → batch → process-each → commit-or-disable →
//! update-live-state`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use huntfall_events::{
    DisplayGateway, DisplayTarget, Notification, Notifier, RenderPayload,
};
use huntfall_ledger::{Ledger, LedgerError};
use huntfall_loot::RarityTable;
use huntfall_store::{SessionStore, StoreError};
use huntfall_types::{AccountId, AutohuntSession, DisableReason, LootDraw};

use crate::clock::Clock;
use crate::config::SchedulerConfig;

/// Attempts at a version-checked session write before giving up.
const SAVE_ATTEMPTS: u32 = 3;

/// Errors that end a scheduler tick early.
///
/// Per-session failures never surface here; they are logged, counted in
/// the [`TickSummary`], and the batch continues.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The due-session query itself failed; the tick resumes next
    /// interval.
    #[error("due-session selection failed: {source}")]
    Selection {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },
}

/// Errors from the session operations consumed by the command layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The account has no autohunt session.
    #[error("account {account} has no autohunt session")]
    NoSession {
        /// The account without a session.
        account: AccountId,
    },

    /// A ledger operation failed (including `InsufficientFunds` on a
    /// manual hunt).
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Summary of a single scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick number that executed.
    pub tick: u64,
    /// Sessions selected as due this tick (bounded by the batch size).
    pub due: usize,
    /// Sessions whose cycle committed.
    pub processed: usize,
    /// Sessions disabled for insufficient funds.
    pub disabled: usize,
    /// Sessions that failed and will retry on a later tick.
    pub failed: usize,
}

/// The outcome of a manual hunt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuntOutcome {
    /// What the hunt found.
    pub draw: LootDraw,
    /// Balance after cost and reward settled.
    pub new_balance: i64,
    /// Essence added to the hunter's session, when one exists.
    pub essence_gained: u64,
    /// Levels gained by the session, when one exists.
    pub levels_gained: u32,
}

/// Per-session result inside a tick.
enum PassOutcome {
    Committed,
    Disabled,
    Failed,
}

/// The autohunt scheduler service.
///
/// Generic over its collaborators; tests wire in-memory stores, a manual
/// clock, and a seeded rng.
pub struct AutohuntScheduler<L, S, G, N, C> {
    ledger: L,
    sessions: S,
    display: G,
    notifier: N,
    clock: C,
    config: SchedulerConfig,
    loot_table: RarityTable,
    tick: AtomicU64,
    rng: Mutex<StdRng>,
}

impl<L, S, G, N, C> AutohuntScheduler<L, S, G, N, C>
where
    L: Ledger,
    S: SessionStore,
    G: DisplayGateway,
    N: Notifier,
    C: Clock,
{
    /// Create a scheduler drawing randomness from the operating system.
    pub fn new(
        ledger: L,
        sessions: S,
        display: G,
        notifier: N,
        clock: C,
        config: SchedulerConfig,
        loot_table: RarityTable,
    ) -> Self {
        Self::with_rng(
            ledger,
            sessions,
            display,
            notifier,
            clock,
            config,
            loot_table,
            StdRng::from_os_rng(),
        )
    }

    /// Create a scheduler with an explicit random source (seeded in
    /// tests).
    #[allow(clippy::too_many_arguments)]
    pub fn with_rng(
        ledger: L,
        sessions: S,
        display: G,
        notifier: N,
        clock: C,
        config: SchedulerConfig,
        loot_table: RarityTable,
        rng: StdRng,
    ) -> Self {
        Self {
            ledger,
            sessions,
            display,
            notifier,
            clock,
            config,
            loot_table,
            tick: AtomicU64::new(0),
            rng: Mutex::new(rng),
        }
    }

    /// The scheduler's configuration.
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Execute one complete scheduler tick.
    ///
    /// Selects due sessions, processes them concurrently up to the worker
    /// bound, and returns a summary. A single session's failure is
    /// isolated; only a failure of the selection query ends the tick.
    pub async fn run_tick(&self) -> Result<TickSummary, TickError> {
        let now = self.clock.now();
        let tick = self.tick.fetch_add(1, Ordering::Relaxed).saturating_add(1);

        let due = self
            .sessions
            .due_sessions(now, self.config.batch_size)
            .await?;
        let due_count = due.len();
        debug!(tick, due = due_count, "Tick selection complete");

        let outcomes: Vec<PassOutcome> = futures::stream::iter(due)
            .map(|session| self.process_session(session, now))
            .buffer_unordered(self.config.worker_limit.max(1))
            .collect()
            .await;

        let mut summary = TickSummary {
            tick,
            due: due_count,
            processed: 0,
            disabled: 0,
            failed: 0,
        };
        for outcome in outcomes {
            match outcome {
                PassOutcome::Committed => summary.processed = summary.processed.saturating_add(1),
                PassOutcome::Disabled => summary.disabled = summary.disabled.saturating_add(1),
                PassOutcome::Failed => summary.failed = summary.failed.saturating_add(1),
            }
        }

        info!(
            tick,
            due = summary.due,
            processed = summary.processed,
            disabled = summary.disabled,
            failed = summary.failed,
            "Tick complete"
        );
        Ok(summary)
    }

    /// Process one due session: charge, reward, persist, then refresh the
    /// live display.
    async fn process_session(&self, session: AutohuntSession, now: DateTime<Utc>) -> PassOutcome {
        let account = session.account_id;
        let cost = self.config.cost_for_level(session.level);

        match self.ledger.apply(account, cost.saturating_neg(), "AUTOHUNT_COST").await {
            Err(LedgerError::InsufficientFunds { balance, .. }) => {
                info!(%account, cost, balance, "Autohunt disabled: insufficient funds");
                self.disable_and_notify(account, DisableReason::InsufficientFunds)
                    .await
            }
            Err(err) => {
                warn!(%account, %err, "Autohunt cost apply failed");
                PassOutcome::Failed
            }
            Ok(_) => self.complete_cycle(session, now).await,
        }
    }

    /// The post-charge half of a cycle: loot, reward, essence, commit.
    async fn complete_cycle(&self, session: AutohuntSession, now: DateTime<Utc>) -> PassOutcome {
        let account = session.account_id;

        let draw = {
            let mut rng = self.rng.lock().await;
            huntfall_loot::draw(&self.loot_table, &mut *rng)
        };
        if draw.coins > 0 {
            if let Err(err) = self
                .ledger
                .apply(account, draw.coins, "AUTOHUNT_REWARD")
                .await
            {
                // Cost committed, reward not: last_run stays put so the
                // whole cycle reruns on a later tick.
                error!(%account, %err, "Autohunt reward apply failed");
                return PassOutcome::Failed;
            }
        }

        let essence = self.essence_for(&draw);
        let level_base = self.config.essence_level_base;
        let committed = self
            .update_session(account, move |s| {
                let _ = s.absorb_essence(essence, level_base);
                s.last_run = now;
            })
            .await;

        let committed = match committed {
            Ok(committed) => committed,
            Err(err) => {
                error!(%account, %err, "Session commit failed");
                return PassOutcome::Failed;
            }
        };
        debug!(
            %account,
            coins = draw.coins,
            items = draw.items.len(),
            essence,
            level = committed.level,
            "Cycle committed"
        );

        self.refresh_display(&committed).await;
        PassOutcome::Committed
    }

    /// Essence earned by one cycle's draw.
    fn essence_for(&self, draw: &LootDraw) -> u64 {
        let item_count = u64::try_from(draw.items.len()).unwrap_or(u64::MAX);
        let item_bonus = item_count.saturating_mul(self.config.essence_per_item);
        self.config.essence_per_cycle.saturating_add(item_bonus)
    }

    /// Disable a session and emit the notification.
    async fn disable_and_notify(&self, account: AccountId, reason: DisableReason) -> PassOutcome {
        let result = self
            .update_session(account, |s| {
                s.enabled = false;
            })
            .await;
        if let Err(err) = result {
            error!(%account, %err, "Disable write failed");
            return PassOutcome::Failed;
        }

        if let Err(err) = self
            .notifier
            .notify(Notification::SessionDisabled {
                account_id: account,
                reason,
            })
            .await
        {
            warn!(%account, %err, "Disable notification failed");
        }
        PassOutcome::Disabled
    }

    /// Best-effort live display refresh. Failures are logged and never
    /// affect the committed cycle; a newly issued surface handle is
    /// persisted on the session.
    async fn refresh_display(&self, session: &AutohuntSession) {
        let account = session.account_id;
        let payload = render_session(session);
        let result = self
            .display
            .upsert_display(
                DisplayTarget::Session {
                    account_id: account,
                },
                session.display_ref.clone(),
                payload,
            )
            .await;

        match result {
            Ok(display_ref) => {
                if session.display_ref.as_ref() != Some(&display_ref) {
                    let persisted = self
                        .update_session(account, move |s| {
                            s.display_ref = Some(display_ref.clone());
                        })
                        .await;
                    if let Err(err) = persisted {
                        warn!(%account, %err, "Display handle persist failed");
                    }
                }
            }
            Err(err) => {
                warn!(%account, %err, "Display update failed");
            }
        }
    }

    /// Apply a mutation to the stored session with optimistic-version
    /// retry: re-read, re-apply, re-save, a bounded number of times.
    async fn update_session<F>(
        &self,
        account: AccountId,
        mutate: F,
    ) -> Result<AutohuntSession, SessionError>
    where
        F: Fn(&mut AutohuntSession),
    {
        let mut attempt = 0_u32;
        loop {
            let Some(mut session) = self.sessions.get_session(account).await? else {
                return Err(SessionError::NoSession { account });
            };
            mutate(&mut session);
            match self.sessions.save_session(&session).await {
                Ok(committed) => return Ok(committed),
                Err(StoreError::StaleVersion { .. }) if attempt < SAVE_ATTEMPTS => {
                    attempt = attempt.saturating_add(1);
                    debug!(%account, attempt, "Session write raced, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    // -----------------------------------------------------------------
    // Session operations (consumed by the command layer)
    // -----------------------------------------------------------------

    /// Enable autohunt for an account: create the session on first use,
    /// re-enable the existing record afterwards.
    pub async fn enable_autohunt(
        &self,
        account: AccountId,
    ) -> Result<AutohuntSession, SessionError> {
        let now = self.clock.now();
        if self.sessions.get_session(account).await?.is_some() {
            return self.update_session(account, |s| {
                s.enabled = true;
            })
            .await;
        }

        let session = AutohuntSession {
            account_id: account,
            enabled: true,
            cadence_secs: self.config.default_cadence_secs,
            last_run: now,
            essence: 0,
            level: 1,
            display_ref: None,
            version: 0,
        };
        let committed = self.sessions.save_session(&session).await?;
        info!(%account, cadence_secs = committed.cadence_secs, "Autohunt enabled");
        Ok(committed)
    }

    /// Disable autohunt at the owner's request. Takes effect on the next
    /// tick; an in-flight pass for the current tick still completes.
    pub async fn disable_autohunt(
        &self,
        account: AccountId,
    ) -> Result<AutohuntSession, SessionError> {
        let committed = self
            .update_session(account, |s| {
                s.enabled = false;
            })
            .await?;

        if let Err(err) = self
            .notifier
            .notify(Notification::SessionDisabled {
                account_id: account,
                reason: DisableReason::UserRequest,
            })
            .await
        {
            warn!(%account, %err, "Disable notification failed");
        }
        Ok(committed)
    }

    /// Perform one manual hunt outside any session cadence.
    ///
    /// Charges the same per-cycle cost (surfacing `InsufficientFunds` to
    /// the caller instead of disabling anything), draws loot, and credits
    /// essence when the hunter has a session record.
    pub async fn hunt_once(&self, account: AccountId) -> Result<HuntOutcome, SessionError> {
        let session = self.sessions.get_session(account).await?;
        let level = session.as_ref().map_or(1, |s| s.level);
        let cost = self.config.cost_for_level(level);

        let _ = self
            .ledger
            .apply(account, cost.saturating_neg(), "HUNT_COST")
            .await?;

        let draw = {
            let mut rng = self.rng.lock().await;
            huntfall_loot::draw(&self.loot_table, &mut *rng)
        };
        let receipt = if draw.coins > 0 {
            Some(self.ledger.apply(account, draw.coins, "HUNT_REWARD").await?)
        } else {
            None
        };
        let new_balance = match receipt {
            Some(receipt) => receipt.new_balance,
            None => self.ledger.balance(account).await?,
        };

        let essence = self.essence_for(&draw);
        let mut levels_gained = 0;
        let mut essence_gained = 0;
        if session.is_some() {
            let level_base = self.config.essence_level_base;
            let committed = self
                .update_session(account, move |s| {
                    let _ = s.absorb_essence(essence, level_base);
                })
                .await?;
            levels_gained = committed.level.saturating_sub(level);
            essence_gained = essence;
        }

        debug!(%account, coins = draw.coins, essence_gained, "Manual hunt complete");
        Ok(HuntOutcome {
            draw,
            new_balance,
            essence_gained,
            levels_gained,
        })
    }

    /// Snapshot a session record.
    pub async fn session(
        &self,
        account: AccountId,
    ) -> Result<Option<AutohuntSession>, SessionError> {
        Ok(self.sessions.get_session(account).await?)
    }
}

/// Render a session into the platform-agnostic display payload.
fn render_session(session: &AutohuntSession) -> RenderPayload {
    RenderPayload {
        title: format!("Autohunt — Level {}", session.level),
        lines: vec![
            format!("Essence: {}", session.essence),
            format!("Cadence: every {}s", session.cadence_secs),
            format!("Last run: {}", session.last_run.format("%Y-%m-%d %H:%M:%S UTC")),
        ],
        as_of: session.last_run,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    use huntfall_events::{DisplayError, NullDisplayGateway, RecordingNotifier};
    use huntfall_ledger::MemoryLedger;
    use huntfall_store::MemorySessionStore;
    use huntfall_types::DisplayRef;

    use super::*;
    use crate::clock::ManualClock;

    type TestScheduler<G> = AutohuntScheduler<
        Arc<MemoryLedger>,
        Arc<MemorySessionStore>,
        G,
        Arc<RecordingNotifier>,
        Arc<ManualClock>,
    >;

    struct Harness<G> {
        scheduler: TestScheduler<G>,
        ledger: Arc<MemoryLedger>,
        sessions: Arc<MemorySessionStore>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualClock>,
    }

    fn start_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).single().unwrap()
    }

    fn harness(config: SchedulerConfig) -> Harness<NullDisplayGateway> {
        harness_with_display(config, NullDisplayGateway::new())
    }

    fn harness_with_display<G: DisplayGateway>(
        config: SchedulerConfig,
        display: G,
    ) -> Harness<G> {
        let ledger = Arc::new(MemoryLedger::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::new(start_instant()));
        let scheduler = AutohuntScheduler::with_rng(
            Arc::clone(&ledger),
            Arc::clone(&sessions),
            display,
            Arc::clone(&notifier),
            Arc::clone(&clock),
            config,
            RarityTable::autohunt(),
            StdRng::seed_from_u64(42),
        );
        Harness {
            scheduler,
            ledger,
            sessions,
            notifier,
            clock,
        }
    }

    /// A gateway that refuses every upsert, for failure-isolation tests.
    struct BrokenDisplay;

    impl DisplayGateway for BrokenDisplay {
        async fn upsert_display(
            &self,
            _target: DisplayTarget,
            _existing: Option<DisplayRef>,
            _payload: RenderPayload,
        ) -> Result<DisplayRef, DisplayError> {
            Err(DisplayError::Upstream {
                detail: "platform down".to_owned(),
            })
        }
    }

    #[tokio::test]
    async fn enable_creates_then_reuses_the_record() {
        let h = harness(SchedulerConfig::default());
        let account = AccountId::new(1);

        let created = h.scheduler.enable_autohunt(account).await.unwrap();
        assert!(created.enabled);
        assert_eq!(created.level, 1);
        assert_eq!(created.cadence_secs, 300);

        let disabled = h.scheduler.disable_autohunt(account).await.unwrap();
        assert!(!disabled.enabled);

        // Re-enable keeps essence and version history, not a fresh row.
        let reenabled = h.scheduler.enable_autohunt(account).await.unwrap();
        assert!(reenabled.enabled);
        assert!(reenabled.version > created.version);
        assert_eq!(h.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn disable_emits_a_user_request_notification() {
        let h = harness(SchedulerConfig::default());
        let account = AccountId::new(1);
        let _ = h.scheduler.enable_autohunt(account).await.unwrap();
        let _ = h.scheduler.disable_autohunt(account).await.unwrap();

        let sent = h.notifier.drain().await;
        assert!(matches!(
            sent.as_slice(),
            [Notification::SessionDisabled {
                reason: DisableReason::UserRequest,
                ..
            }],
        ));
    }

    #[tokio::test]
    async fn disable_without_session_is_an_error() {
        let h = harness(SchedulerConfig::default());
        let result = h.scheduler.disable_autohunt(AccountId::new(9)).await;
        assert!(matches!(result, Err(SessionError::NoSession { .. })));
    }

    #[tokio::test]
    async fn exactly_one_pass_per_eligible_interval() {
        let h = harness(SchedulerConfig::default());
        let account = AccountId::new(1);
        let _ = h.ledger.apply(account, 10_000, "SEED").await.unwrap();
        let enabled = h.scheduler.enable_autohunt(account).await.unwrap();

        // Not yet due: nothing happens.
        let summary = h.scheduler.run_tick().await.unwrap();
        assert_eq!(summary.due, 0);
        let unchanged = h.scheduler.session(account).await.unwrap().unwrap();
        assert_eq!(unchanged.last_run, enabled.last_run);

        // Advance across K cadence boundaries, one tick each: last_run
        // advances by exactly one interval per eligible tick, and a
        // second tick inside the same interval is a no-op.
        for k in 1..=3 {
            h.clock.advance(Duration::seconds(301));
            let summary = h.scheduler.run_tick().await.unwrap();
            assert_eq!(summary.processed, 1, "tick {k}");

            let repeat = h.scheduler.run_tick().await.unwrap();
            assert_eq!(repeat.due, 0, "tick {k} repeat");

            let session = h.scheduler.session(account).await.unwrap().unwrap();
            assert_eq!(session.last_run, h.clock.now(), "tick {k} last_run");
        }

        // Three cycles committed: three costs and up to three rewards.
        let entries = h.ledger.entries(account).await.unwrap();
        let costs = entries.iter().filter(|e| e.reason == "AUTOHUNT_COST").count();
        assert_eq!(costs, 3);
    }

    #[tokio::test]
    async fn insufficient_funds_disables_and_notifies() {
        let h = harness(SchedulerConfig::default());
        let account = AccountId::new(1);
        // Balance 5 against a level-1 cost of 10.
        let _ = h.ledger.apply(account, 5, "SEED").await.unwrap();
        let _ = h.scheduler.enable_autohunt(account).await.unwrap();

        h.clock.advance(Duration::seconds(400));
        let summary = h.scheduler.run_tick().await.unwrap();
        assert_eq!(summary.disabled, 1);
        assert_eq!(summary.processed, 0);

        // Balance untouched, session off, notification out.
        assert_eq!(h.ledger.balance(account).await.unwrap(), 5);
        let session = h.scheduler.session(account).await.unwrap().unwrap();
        assert!(!session.enabled);

        let sent = h.notifier.drain().await;
        assert!(matches!(
            sent.as_slice(),
            [Notification::SessionDisabled {
                reason: DisableReason::InsufficientFunds,
                ..
            }],
        ));

        // Disabled sessions never come due again.
        h.clock.advance(Duration::seconds(400));
        let summary = h.scheduler.run_tick().await.unwrap();
        assert_eq!(summary.due, 0);
    }

    #[tokio::test]
    async fn batches_are_bounded_and_oldest_due_first() {
        let config = SchedulerConfig {
            batch_size: 2,
            ..SchedulerConfig::default()
        };
        let h = harness(config);

        // Five sessions, enabled at staggered instants so their last_run
        // values order them 1 (oldest) .. 5 (newest).
        for account in 1..=5 {
            let id = AccountId::new(account);
            let _ = h.ledger.apply(id, 1_000, "SEED").await.unwrap();
            let _ = h.scheduler.enable_autohunt(id).await.unwrap();
            h.clock.advance(Duration::seconds(10));
        }

        h.clock.advance(Duration::seconds(300));
        let summary = h.scheduler.run_tick().await.unwrap();
        assert_eq!(summary.due, 2);
        assert_eq!(summary.processed, 2);

        // The two oldest-due sessions ran; the newer three roll over.
        let ran_1 = h.scheduler.session(AccountId::new(1)).await.unwrap().unwrap();
        let ran_2 = h.scheduler.session(AccountId::new(2)).await.unwrap().unwrap();
        let waiting = h.scheduler.session(AccountId::new(3)).await.unwrap().unwrap();
        assert_eq!(ran_1.last_run, h.clock.now());
        assert_eq!(ran_2.last_run, h.clock.now());
        assert_ne!(waiting.last_run, h.clock.now());

        // The next tick drains two more.
        let summary = h.scheduler.run_tick().await.unwrap();
        assert_eq!(summary.processed, 2);
        let summary = h.scheduler.run_tick().await.unwrap();
        assert_eq!(summary.processed, 1);
    }

    #[tokio::test]
    async fn cycles_accrue_essence_and_rewards() {
        let h = harness(SchedulerConfig::default());
        let account = AccountId::new(1);
        let _ = h.ledger.apply(account, 1_000, "SEED").await.unwrap();
        let _ = h.scheduler.enable_autohunt(account).await.unwrap();

        h.clock.advance(Duration::seconds(301));
        let _ = h.scheduler.run_tick().await.unwrap();

        let session = h.scheduler.session(account).await.unwrap().unwrap();
        // At least the per-cycle essence, more if an item dropped.
        assert!(session.essence >= 5);

        let entries = h.ledger.entries(account).await.unwrap();
        assert!(entries.iter().any(|e| e.reason == "AUTOHUNT_COST" && e.delta == -10));
        // The autohunt table's coin floor is positive, so a reward entry
        // always follows a successful cycle.
        assert!(entries.iter().any(|e| e.reason == "AUTOHUNT_REWARD" && e.delta >= 10));
    }

    #[tokio::test]
    async fn display_handle_is_requested_once_and_reused() {
        let h = harness(SchedulerConfig::default());
        let account = AccountId::new(1);
        let _ = h.ledger.apply(account, 1_000, "SEED").await.unwrap();
        let _ = h.scheduler.enable_autohunt(account).await.unwrap();

        h.clock.advance(Duration::seconds(301));
        let _ = h.scheduler.run_tick().await.unwrap();
        let first = h.scheduler.session(account).await.unwrap().unwrap();
        let handle = first.display_ref.clone();
        assert!(handle.is_some());

        h.clock.advance(Duration::seconds(301));
        let _ = h.scheduler.run_tick().await.unwrap();
        let second = h.scheduler.session(account).await.unwrap().unwrap();
        assert_eq!(second.display_ref, handle);
    }

    #[tokio::test]
    async fn display_failure_never_rolls_back_economics() {
        let h = harness_with_display(SchedulerConfig::default(), BrokenDisplay);
        let account = AccountId::new(1);
        let _ = h.ledger.apply(account, 1_000, "SEED").await.unwrap();
        let _ = h.scheduler.enable_autohunt(account).await.unwrap();

        h.clock.advance(Duration::seconds(301));
        let summary = h.scheduler.run_tick().await.unwrap();

        // The cycle still counts as committed and the economics stand.
        assert_eq!(summary.processed, 1);
        let session = h.scheduler.session(account).await.unwrap().unwrap();
        assert_eq!(session.last_run, h.clock.now());
        assert!(session.display_ref.is_none());
        let entries = h.ledger.entries(account).await.unwrap();
        assert!(entries.iter().any(|e| e.reason == "AUTOHUNT_COST"));
    }

    #[tokio::test]
    async fn manual_hunt_awards_and_accrues() {
        let h = harness(SchedulerConfig::default());
        let account = AccountId::new(1);
        let _ = h.ledger.apply(account, 100, "SEED").await.unwrap();
        let _ = h.scheduler.enable_autohunt(account).await.unwrap();

        let outcome = h.scheduler.hunt_once(account).await.unwrap();
        assert!(outcome.draw.coins >= 10);
        assert!(outcome.essence_gained >= 5);
        assert_eq!(
            outcome.new_balance,
            h.ledger.balance(account).await.unwrap(),
        );

        // Manual hunts never touch the cadence clock.
        let session = h.scheduler.session(account).await.unwrap().unwrap();
        assert!(session.essence >= 5);
    }

    #[tokio::test]
    async fn manual_hunt_without_session_still_pays_out() {
        let h = harness(SchedulerConfig::default());
        let account = AccountId::new(7);
        let _ = h.ledger.apply(account, 50, "SEED").await.unwrap();

        let outcome = h.scheduler.hunt_once(account).await.unwrap();
        assert_eq!(outcome.essence_gained, 0);
        assert_eq!(outcome.levels_gained, 0);
        assert!(outcome.new_balance >= 40);
    }

    #[tokio::test]
    async fn broke_hunter_is_rejected_not_disabled() {
        let h = harness(SchedulerConfig::default());
        let account = AccountId::new(1);
        let _ = h.ledger.apply(account, 3, "SEED").await.unwrap();
        let _ = h.scheduler.enable_autohunt(account).await.unwrap();

        let result = h.scheduler.hunt_once(account).await;
        assert!(matches!(
            result,
            Err(SessionError::Ledger(LedgerError::InsufficientFunds { .. }))
        ));
        // A manual shortfall does not flip the session off.
        let session = h.scheduler.session(account).await.unwrap().unwrap();
        assert!(session.enabled);
        assert_eq!(h.ledger.balance(account).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn higher_levels_pay_higher_costs() {
        let config = SchedulerConfig::default();
        let h = harness(config);
        let account = AccountId::new(1);
        let _ = h.ledger.apply(account, 10_000, "SEED").await.unwrap();
        let _ = h.scheduler.enable_autohunt(account).await.unwrap();

        // Push the session to level 3 (400 essence at base 100).
        let _ = h
            .scheduler
            .update_session(account, |s| {
                let _ = s.absorb_essence(400, 100);
            })
            .await
            .unwrap();

        h.clock.advance(Duration::seconds(301));
        let _ = h.scheduler.run_tick().await.unwrap();

        let entries = h.ledger.entries(account).await.unwrap();
        // Level 3 cost: 10 + 2 * 2.
        assert!(entries.iter().any(|e| e.reason == "AUTOHUNT_COST" && e.delta == -14));
    }

    #[tokio::test]
    async fn concurrent_essence_writer_does_not_lose_the_cycle() {
        let h = harness(SchedulerConfig::default());
        let account = AccountId::new(1);
        let _ = h.ledger.apply(account, 1_000, "SEED").await.unwrap();
        let _ = h.scheduler.enable_autohunt(account).await.unwrap();

        // Another writer (the battle engine crediting experience) lands
        // its write first; the scheduler's commit must build on it rather
        // than clobber it.
        let racing = h.sessions.get_session(account).await.unwrap().unwrap();
        h.clock.advance(Duration::seconds(301));

        let mut racer = racing;
        let _ = racer.absorb_essence(50, 100);
        let _ = h.sessions.save_session(&racer).await.unwrap();

        let summary = h.scheduler.run_tick().await.unwrap();
        assert_eq!(summary.processed, 1);

        let session = h.scheduler.session(account).await.unwrap().unwrap();
        // Both the racer's 50 and the cycle's essence survived.
        assert!(session.essence >= 55);
        assert_eq!(session.last_run, h.clock.now());
    }
}
