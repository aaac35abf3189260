//! The periodic scheduler loop with graceful shutdown.
//!
//! Wraps the single-tick [`run_tick`] in a timed loop. A failed tick is
//! logged and the loop resumes at the next interval; only shutdown (or an
//! optional tick bound, used by tests and batch runs) ends the loop.
//!
//! [`run_tick`]: crate::scheduler::AutohuntScheduler::run_tick

use tokio::sync::watch;
use tracing::{error, info};

use huntfall_events::{DisplayGateway, Notifier};
use huntfall_ledger::Ledger;
use huntfall_store::SessionStore;

use crate::clock::Clock;
use crate::scheduler::{AutohuntScheduler, TickSummary};

/// Why the scheduler loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEndReason {
    /// The shutdown signal flipped.
    Shutdown,
    /// The configured tick bound was reached.
    MaxTicksReached,
}

/// Result of a scheduler loop run.
#[derive(Debug)]
pub struct RunResult {
    /// Why the loop ended.
    pub end_reason: RunEndReason,
    /// The last completed tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Ticks attempted, including failed ones.
    pub total_ticks: u64,
}

/// Drive the scheduler until shutdown or an optional tick bound.
///
/// `max_ticks` of `0` means unbounded. The shutdown receiver ends the
/// loop as soon as its value flips to `true`.
pub async fn run_scheduler<L, S, G, N, C>(
    scheduler: &AutohuntScheduler<L, S, G, N, C>,
    mut shutdown: watch::Receiver<bool>,
    max_ticks: u64,
) -> RunResult
where
    L: Ledger,
    S: SessionStore,
    G: DisplayGateway,
    N: Notifier,
    C: Clock,
{
    let interval = scheduler.config().tick_interval_secs;
    let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval.max(1)));
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(interval_secs = interval, max_ticks, "Scheduler loop starting");

    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                let stop = changed.is_err() || *shutdown.borrow();
                if stop {
                    info!(total_ticks, "Scheduler loop shutting down");
                    return RunResult {
                        end_reason: RunEndReason::Shutdown,
                        final_summary: last_summary,
                        total_ticks,
                    };
                }
            }
            _ = timer.tick() => {
                total_ticks = total_ticks.saturating_add(1);
                match scheduler.run_tick().await {
                    Ok(summary) => last_summary = Some(summary),
                    Err(err) => {
                        // The tick ends early; selection retries on the
                        // next interval.
                        error!(%err, "Tick failed");
                    }
                }

                if max_ticks > 0 && total_ticks >= max_ticks {
                    info!(total_ticks, "Tick bound reached");
                    return RunResult {
                        end_reason: RunEndReason::MaxTicksReached,
                        final_summary: last_summary,
                        total_ticks,
                    };
                }
            }
        }
    }
}
