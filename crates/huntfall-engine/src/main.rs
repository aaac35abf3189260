//! Huntfall engine binary.
//!
//! The composition root: loads configuration, initializes structured
//! logging, wires the ledger and stores (PostgreSQL when a URL is
//! configured, in-memory otherwise), and runs the two long-lived loops --
//! the autohunt scheduler and the battle deadline sweeper -- until
//! interrupted.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `huntfall-config.yaml`
//! 3. Connect persistence and run migrations (or select in-memory stores)
//! 4. Resume open battles from their checkpoints
//! 5. Run the scheduler loop and the deadline sweeper
//! 6. Shut down cleanly on ctrl-c

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use huntfall_battle::BattleEngine;
use huntfall_core::{AutohuntScheduler, SystemClock, run_scheduler};
use huntfall_db::{PgBattleStore, PgConfig, PgHandle, PgLedger, PgSessionStore};
use huntfall_events::{LogNotifier, NullDisplayGateway};
use huntfall_ledger::{Ledger, MemoryLedger};
use huntfall_store::{BattleStore, MemoryBattleStore, MemorySessionStore, SessionStore};

use crate::config::{DEFAULT_CONFIG_PATH, EngineConfig};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration loading or persistence setup fails;
/// runtime loop failures are logged and retried instead.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Structured logging; RUST_LOG wins over the config default.
    let config_path = std::env::var("HUNTFALL_CONFIG")
        .map_or_else(|_e| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = EngineConfig::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_e| EnvFilter::new(config.core.logging.level.clone()));
    if config.core.logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    }

    info!(
        config = %config_path.display(),
        tick_interval_secs = config.core.scheduler.tick_interval_secs,
        batch_size = config.core.scheduler.batch_size,
        turn_timeout_secs = config.battle.turn_timeout_secs,
        "huntfall-engine starting"
    );

    // 2. Persistence: PostgreSQL when configured, in-memory otherwise.
    match config.core.infrastructure.postgres_url.clone() {
        Some(url) => {
            let handle = PgHandle::connect(&PgConfig::new(&url)).await?;
            handle.run_migrations().await?;
            info!("Using PostgreSQL persistence");

            let ledger = PgLedger::new(
                handle.pool().clone(),
                config.core.economy.starting_balance,
            );
            let sessions = Arc::new(PgSessionStore::new(handle.pool().clone()));
            let battles = PgBattleStore::new(handle.pool().clone());
            run(config, ledger, sessions, battles).await;

            handle.close().await;
        }
        None => {
            warn!("No postgres_url configured; state will not survive restarts");
            let ledger = Arc::new(MemoryLedger::with_starting_balance(
                config.core.economy.starting_balance,
            ));
            let sessions = Arc::new(MemorySessionStore::new());
            let battles = Arc::new(MemoryBattleStore::new());
            run(config, ledger, sessions, battles).await;
        }
    }

    info!("huntfall-engine stopped");
    Ok(())
}

/// Wire the services and drive both loops until ctrl-c.
async fn run<L, S, B>(config: EngineConfig, ledger: L, sessions: Arc<S>, battles: B)
where
    L: Ledger + Clone + 'static,
    S: SessionStore + Send + Sync + 'static,
    B: BattleStore + Send + Sync + 'static,
{
    let notifier = LogNotifier;
    let display = NullDisplayGateway::new();

    let scheduler = AutohuntScheduler::new(
        ledger.clone(),
        Arc::clone(&sessions),
        display,
        notifier,
        SystemClock,
        config.core.scheduler.clone(),
        config.core.loot.autohunt.clone(),
    );

    let battle_engine = Arc::new(BattleEngine::new(
        ledger,
        Arc::clone(&sessions),
        battles,
        notifier,
        config.battle.clone(),
        config.core.loot.battle.clone(),
    ));

    // 3. Resume any battle interrupted mid-match.
    match battle_engine.resume().await {
        Ok(count) if count > 0 => info!(count, "Open battles resumed"),
        Ok(_) => {}
        Err(err) => error!(%err, "Battle resume failed"),
    }

    // 4. Both loops run until the shutdown signal flips.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = {
        let engine = Arc::clone(&battle_engine);
        let mut shutdown = shutdown_rx.clone();
        let interval_secs = config.battle.sweep_interval_secs.max(1);
        tokio::spawn(async move {
            let mut timer =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = timer.tick() => {
                        let swept = engine.sweep_deadlines(chrono::Utc::now()).await;
                        if !swept.is_empty() {
                            info!(count = swept.len(), "Deadlines swept");
                        }
                    }
                }
            }
        })
    };

    let scheduler_loop = run_scheduler(&scheduler, shutdown_rx, 0);

    tokio::select! {
        result = scheduler_loop => {
            info!(total_ticks = result.total_ticks, "Scheduler loop ended");
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                error!(%err, "Signal handler failed");
            }
            info!("Shutdown requested");
        }
    }

    shutdown_tx.send(true).ok();
    sweeper.await.ok();
}
