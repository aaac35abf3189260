//! Autohunt scheduler, clock, and configuration for the Huntfall engine.
//!
//! This crate owns the single periodic controller that re-evaluates every
//! autohunt session: due-session selection, bounded batching, the
//! charge/reward/commit pass, and the best-effort live-display refresh.
//! It never spawns one task per user.
//!
//! # Modules
//!
//! - [`clock`] -- injectable wall-clock time ([`Clock`], [`SystemClock`],
//!   [`ManualClock`]) so time-dependent behavior is tested with a
//!   simulated clock instead of sleeps.
//! - [`config`] -- typed configuration loaded from
//!   `huntfall-config.yaml`.
//! - [`scheduler`] -- [`AutohuntScheduler`]: the per-tick controller and
//!   the session operations (`enable`, `disable`, manual hunt).
//! - [`runner`] -- the periodic loop driver with graceful shutdown.
//!
//! [`Clock`]: clock::Clock
//! [`SystemClock`]: clock::SystemClock
//! [`ManualClock`]: clock::ManualClock
//! [`AutohuntScheduler`]: scheduler::AutohuntScheduler

pub mod clock;
pub mod config;
pub mod runner;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, CoreConfig, SchedulerConfig};
pub use runner::{run_scheduler, RunEndReason, RunResult};
pub use scheduler::{AutohuntScheduler, HuntOutcome, SessionError, TickError, TickSummary};
