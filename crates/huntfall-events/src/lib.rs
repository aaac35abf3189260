//! Notification and display-surface interfaces for the Huntfall engine.
//!
//! The engine never talks to the chat platform directly. Everything
//! outward-facing crosses one of two seams defined here:
//!
//! - [`Notifier`] -- fire-and-forget game notifications (a session was
//!   disabled, a battle resolved). The command layer renders and delivers
//!   them.
//! - [`DisplayGateway`] -- the "live embed" surface: the engine asks the
//!   command layer to create or update a rendered view of a session or
//!   battle and stores only the opaque [`DisplayRef`] it gets back.
//!
//! Both seams are one-way: failures are logged by callers and never
//! propagate into committed game-state transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use huntfall_types::{AccountId, BattleId, BattleRewards, DisableReason, DisplayRef};

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// A game event the command layer should surface to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// An autohunt session was turned off by the engine or its owner.
    SessionDisabled {
        /// The session's owning account.
        account_id: AccountId,
        /// Why the session was disabled.
        reason: DisableReason,
    },
    /// A battle reached its terminal `Resolved` state.
    BattleResolved {
        /// The battle that finished.
        battle_id: BattleId,
        /// The winning account, when the winner is a player.
        winner: Option<AccountId>,
        /// What the winner received.
        rewards: BattleRewards,
    },
}

/// Errors delivering a notification to the command layer.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The command layer rejected or failed to deliver the notification.
    #[error("notification delivery failed: {detail}")]
    Delivery {
        /// Transport-level detail.
        detail: String,
    },
}

/// Receiver for engine notifications.
///
/// Implemented by the command layer; the engine calls this and moves on.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    fn notify(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

// ---------------------------------------------------------------------------
// Display surfaces
// ---------------------------------------------------------------------------

/// What a display surface is rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum DisplayTarget {
    /// An autohunt session's live status card.
    Session {
        /// The owning account.
        account_id: AccountId,
    },
    /// A battle's live status card.
    Battle {
        /// The battle being rendered.
        battle_id: BattleId,
    },
}

/// Platform-agnostic render content for a display surface.
///
/// The command layer turns this into whatever its platform draws (an embed,
/// a card, a plain message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderPayload {
    /// Headline.
    pub title: String,
    /// Body lines, top to bottom.
    pub lines: Vec<String>,
    /// When the underlying state was captured.
    pub as_of: DateTime<Utc>,
}

/// Errors creating or updating a display surface.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// The referenced surface no longer exists (e.g. message deleted).
    #[error("display surface is gone: {reference}")]
    Gone {
        /// The stale handle.
        reference: DisplayRef,
    },
    /// The command layer failed to render or deliver the update.
    #[error("display update failed: {detail}")]
    Upstream {
        /// Transport-level detail.
        detail: String,
    },
}

/// The live-display seam to the command layer.
///
/// `upsert_display` creates a surface when `existing` is `None` and
/// updates in place otherwise; either way it returns the handle to store.
/// Calls are best-effort from the engine's perspective.
pub trait DisplayGateway: Send + Sync {
    /// Create or update the surface for `target`, returning its handle.
    fn upsert_display(
        &self,
        target: DisplayTarget,
        existing: Option<DisplayRef>,
        payload: RenderPayload,
    ) -> impl Future<Output = Result<DisplayRef, DisplayError>> + Send;
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    fn notify(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send {
        (**self).notify(notification)
    }
}

impl<T: DisplayGateway + ?Sized> DisplayGateway for std::sync::Arc<T> {
    fn upsert_display(
        &self,
        target: DisplayTarget,
        existing: Option<DisplayRef>,
        payload: RenderPayload,
    ) -> impl Future<Output = Result<DisplayRef, DisplayError>> + Send {
        (**self).upsert_display(target, existing, payload)
    }
}

// ---------------------------------------------------------------------------
// Stock implementations
// ---------------------------------------------------------------------------

/// A notifier that records everything it is given, for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: tokio::sync::Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return everything recorded so far.
    pub async fn drain(&self) -> Vec<Notification> {
        let mut sent = self.sent.lock().await;
        std::mem::take(&mut *sent)
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}

/// A notifier that only writes structured logs.
///
/// Used by the engine binary when no command layer is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        match &notification {
            Notification::SessionDisabled { account_id, reason } => {
                tracing::info!(%account_id, %reason, "Session disabled");
            }
            Notification::BattleResolved {
                battle_id,
                winner,
                rewards,
            } => {
                tracing::info!(
                    %battle_id,
                    winner = winner.map(AccountId::into_inner),
                    coins = rewards.coins,
                    experience = rewards.experience,
                    "Battle resolved"
                );
            }
        }
        Ok(())
    }
}

/// A display gateway that accepts every upsert and hands back a synthetic
/// handle. Used in tests and headless runs.
#[derive(Debug, Default)]
pub struct NullDisplayGateway {
    issued: tokio::sync::Mutex<u64>,
}

impl NullDisplayGateway {
    /// Create a gateway with no surfaces issued yet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplayGateway for NullDisplayGateway {
    async fn upsert_display(
        &self,
        _target: DisplayTarget,
        existing: Option<DisplayRef>,
        _payload: RenderPayload,
    ) -> Result<DisplayRef, DisplayError> {
        if let Some(existing) = existing {
            return Ok(existing);
        }
        let mut issued = self.issued.lock().await;
        *issued = issued.saturating_add(1);
        Ok(DisplayRef::new(format!("null-display-{issued}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        let first = Notification::SessionDisabled {
            account_id: AccountId::new(1),
            reason: DisableReason::InsufficientFunds,
        };
        let second = Notification::SessionDisabled {
            account_id: AccountId::new(2),
            reason: DisableReason::UserRequest,
        };
        let _ = notifier.notify(first.clone()).await;
        let _ = notifier.notify(second.clone()).await;
        assert_eq!(notifier.drain().await, vec![first, second]);
        assert!(notifier.drain().await.is_empty());
    }

    #[tokio::test]
    async fn null_gateway_reuses_existing_handles() {
        let gateway = NullDisplayGateway::new();
        let payload = RenderPayload {
            title: "Autohunt".to_owned(),
            lines: vec!["level 1".to_owned()],
            as_of: Utc::now(),
        };
        let target = DisplayTarget::Session {
            account_id: AccountId::new(9),
        };

        let created = gateway
            .upsert_display(target, None, payload.clone())
            .await
            .ok();
        assert!(created.is_some());

        let updated = gateway
            .upsert_display(target, created.clone(), payload)
            .await
            .ok();
        assert_eq!(updated, created);
    }

    #[test]
    fn notification_serde_tagging() {
        let n = Notification::SessionDisabled {
            account_id: AccountId::new(5),
            reason: DisableReason::InsufficientFunds,
        };
        let json = serde_json::to_string(&n).ok().unwrap_or_default();
        assert!(json.contains(r#""event":"session_disabled""#));
        assert!(json.contains(r#""reason":"insufficient_funds""#));
    }
}
