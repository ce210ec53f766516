//! Notification dispatch. Delivers a reminder through an ordered backend
//! chain and finalizes it afterwards.
//!
//! ```text
//! dispatch(reminder)
//!   ├── SystemNotifier #1 ─ Unavailable/Err ─┐
//!   ├── SystemNotifier #2 ─ Unavailable/Err ─┤
//!   └── AckSurface (always available) ◄──────┘
//!
//! finalization triggers (first one wins):
//!   ├── explicit acknowledgment   (AckHandle::acknowledge)
//!   ├── auto-dismiss timer        (default 30s)
//!   └── safety-net timer          (default 5s, only while still in flight)
//! ```
//!
//! Finalization marks the reminder `Done`, releases its in-flight claim and
//! regenerates it when recurring. It runs at most once per dispatch, and the
//! status change itself is conditional on the record still being `Pending`.

use async_trait::async_trait;
use nudge_core::clock::Clock;
use nudge_core::config::DispatchConfig;
use nudge_core::error::{NudgeError, Result};
use nudge_core::types::{Reminder, ReminderStatus};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::notify::{Delivery, DeliveryLog, Notification};
use crate::recurrence;
use crate::store::ReminderStore;
use crate::tracker::{Claim, InFlightTracker};

/// Result of asking a system notification backend to present something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemOutcome {
    Delivered,
    /// The capability is not present in this environment.
    Unavailable,
}

/// Native/OS notification capability. Optional; may be unavailable.
#[async_trait]
pub trait SystemNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn present(&self, notification: &Notification) -> Result<SystemOutcome>;
}

/// Interactive acknowledgment capability. Always available; ends the chain.
pub trait AckSurface: Send + Sync {
    fn name(&self) -> &str;

    /// Show the notification without blocking. Explicit user input should
    /// call [`AckHandle::acknowledge`].
    fn present(&self, notification: &Notification, ack: AckHandle);
}

/// What caused a finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeTrigger {
    Acknowledged,
    AutoDismiss,
    SafetyNet,
}

impl fmt::Display for FinalizeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeTrigger::Acknowledged => write!(f, "acknowledged"),
            FinalizeTrigger::AutoDismiss => write!(f, "auto-dismiss"),
            FinalizeTrigger::SafetyNet => write!(f, "safety-net"),
        }
    }
}

struct DispatchInner {
    system: Vec<Arc<dyn SystemNotifier>>,
    surface: Arc<dyn AckSurface>,
    store: Arc<dyn ReminderStore>,
    tracker: InFlightTracker,
    clock: Arc<dyn Clock>,
    auto_dismiss: Duration,
    safety_net: Duration,
    log: DeliveryLog,
}

/// Per-dispatch finalization state shared by the three triggers.
struct Finalization {
    notification: Notification,
    claim: Option<Claim>,
    fired: AtomicBool,
    inner: Arc<DispatchInner>,
}

impl Finalization {
    /// Returns `true` only for the call that actually finalized.
    fn finalize(&self, trigger: FinalizeTrigger) -> bool {
        // The safety net only covers reminders that are still in flight.
        if trigger == FinalizeTrigger::SafetyNet
            && self.claim.is_none_or(|c| !self.inner.tracker.is_held(c))
        {
            return false;
        }
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }

        let id = self.notification.reminder_id;
        if id.is_manual() {
            tracing::debug!("Manual notification '{}' closed ({trigger})", self.notification.title);
            return true;
        }

        let store = self.inner.store.as_ref();
        match store.set_status(id, ReminderStatus::Done) {
            Ok(true) => tracing::info!("✅ Reminder {id} done ({trigger})"),
            Ok(false) => tracing::debug!("Reminder {id} already finalized"),
            Err(NudgeError::NotFound(_)) => tracing::debug!("Reminder {id} deleted before finalization"),
            Err(e) => tracing::warn!("⚠️ Failed to mark {id} done: {e}"),
        }

        // Release only after the status change so the monitor cannot pick
        // the reminder up again as still pending.
        if let Some(claim) = self.claim {
            self.inner.tracker.release(claim);
        }

        if let Err(e) = recurrence::regenerate_by_id(store, id, self.inner.clock.now()) {
            tracing::warn!("⚠️ Recurrence check for {id} failed: {e}");
        }
        true
    }
}

/// Callback handed to an [`AckSurface`]. Cheap to clone; acknowledging more
/// than once is harmless.
#[derive(Clone)]
pub struct AckHandle {
    finalization: Arc<Finalization>,
}

impl AckHandle {
    pub fn acknowledge(&self) -> bool {
        self.finalization.finalize(FinalizeTrigger::Acknowledged)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalization.fired.load(Ordering::SeqCst)
    }

    pub fn notification(&self) -> &Notification {
        &self.finalization.notification
    }
}

impl fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckHandle")
            .field("reminder_id", &self.finalization.notification.reminder_id)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

/// Delivers notifications through the backend chain.
#[derive(Clone)]
pub struct NotificationDispatcher {
    inner: Arc<DispatchInner>,
}

impl NotificationDispatcher {
    pub fn new(
        system: Vec<Arc<dyn SystemNotifier>>,
        surface: Arc<dyn AckSurface>,
        store: Arc<dyn ReminderStore>,
        tracker: InFlightTracker,
        clock: Arc<dyn Clock>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(DispatchInner {
                system,
                surface,
                store,
                tracker,
                clock,
                auto_dismiss: config.auto_dismiss(),
                safety_net: config.safety_net(),
                log: DeliveryLog::new(config.history_limit),
            }),
        }
    }

    pub fn tracker(&self) -> &InFlightTracker {
        &self.inner.tracker
    }

    /// Deliver a stored reminder. `claim` is its in-flight tracker entry.
    pub fn dispatch(&self, reminder: &Reminder, claim: Claim) -> JoinHandle<()> {
        self.spawn_delivery(Notification::for_reminder(reminder), Some(claim))
    }

    /// Deliver a notification that has no stored reminder behind it.
    pub fn dispatch_manual(&self, title: &str, body: &str) -> JoinHandle<()> {
        let notification = Notification::manual(title, body, self.inner.clock.now());
        self.spawn_delivery(notification, None)
    }

    /// Recent deliveries, oldest first.
    pub fn recent_deliveries(&self) -> Vec<Delivery> {
        self.inner.log.recent()
    }

    fn spawn_delivery(&self, notification: Notification, claim: Option<Claim>) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let finalization = Arc::new(Finalization {
                notification,
                claim,
                fired: AtomicBool::new(false),
                inner: inner.clone(),
            });
            let backend = deliver(&inner, &finalization).await;
            inner.log.record(Delivery {
                notification: finalization.notification.clone(),
                backend,
                timestamp: inner.clock.now(),
            });

            arm_timer(finalization.clone(), inner.safety_net, FinalizeTrigger::SafetyNet);
            arm_timer(finalization, inner.auto_dismiss, FinalizeTrigger::AutoDismiss);
        })
    }
}

/// Walk the chain; returns the name of the backend that took it.
async fn deliver(inner: &DispatchInner, finalization: &Arc<Finalization>) -> String {
    let notification = &finalization.notification;
    for backend in &inner.system {
        match backend.present(notification).await {
            Ok(SystemOutcome::Delivered) => {
                tracing::info!("🔔 '{}' delivered via {}", notification.title, backend.name());
                return backend.name().to_string();
            }
            Ok(SystemOutcome::Unavailable) => {
                tracing::debug!("{} unavailable, falling through", backend.name());
            }
            Err(e) => {
                tracing::warn!("⚠️ {} failed, falling through: {e}", backend.name());
            }
        }
    }

    inner.surface.present(
        notification,
        AckHandle {
            finalization: finalization.clone(),
        },
    );
    tracing::info!("🔔 '{}' shown on {}", notification.title, inner.surface.name());
    inner.surface.name().to_string()
}

fn arm_timer(finalization: Arc<Finalization>, after: Duration, trigger: FinalizeTrigger) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        finalization.finalize(trigger);
    });
}
