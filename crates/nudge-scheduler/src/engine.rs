//! Monitor: the background loop that marks overdue reminders, dispatches
//! due ones and regenerates finished recurring ones on a fixed cadence.
//!
//! ```text
//! Stopped ──start()──► Running ──stop()──► Stopped
//!                        │
//!                        └─ every tick: OverdueMarker → DueNotifier → recurrence sweep
//!                           (tick error → log, back off, carry on)
//! ```
//!
//! `stop()` clears the in-flight tracker. Prompts that are already open are
//! left alone and still finalize through their own triggers.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nudge_core::clock::Clock;
use nudge_core::config::{MonitorConfig, NudgeConfig};
use nudge_core::error::{NudgeError, Result};
use nudge_core::types::ReminderId;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{AckSurface, NotificationDispatcher, SystemNotifier};
use crate::notifier::DueNotifier;
use crate::notify::Delivery;
use crate::overdue::OverdueMarker;
use crate::recurrence;
use crate::store::ReminderStore;
use crate::tracker::InFlightTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub marked_overdue: usize,
    pub dispatched: Vec<ReminderId>,
    pub regenerated: Vec<(ReminderId, ReminderId)>,
}

/// Tick counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub ticks: u64,
    pub failed_ticks: u64,
}

struct MonitorShared {
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
    overdue: OverdueMarker,
    notifier: DueNotifier,
    dispatcher: NotificationDispatcher,
    tick_interval: Duration,
    error_backoff: Duration,
    ticks: AtomicU64,
    failed_ticks: AtomicU64,
}

impl MonitorShared {
    fn tick(&self) -> Result<TickReport> {
        let store = self.store.as_ref();
        let now = self.clock.now();
        let marked_overdue = self.overdue.run(store, now)?;
        let dispatched = self.notifier.run(store, now)?;
        let regenerated = recurrence::sweep(store, now)?;
        Ok(TickReport {
            marked_overdue,
            dispatched,
            regenerated,
        })
    }

    /// Run one tick, turning a panic into an error so the loop survives it.
    fn guarded_tick(&self) -> Result<TickReport> {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| self.tick()))
            .unwrap_or_else(|_| Err(NudgeError::Store("tick panicked".into())));
        if result.is_err() {
            self.failed_ticks.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The scheduling loop and the engine's consumer-facing controls.
pub struct Monitor {
    shared: Arc<MonitorShared>,
    running: Mutex<Option<RunningLoop>>,
}

impl Monitor {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        clock: Arc<dyn Clock>,
        dispatcher: NotificationDispatcher,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(MonitorShared {
                store,
                clock,
                overdue: OverdueMarker::new(config.overdue_grace()),
                notifier: DueNotifier::new(dispatcher.clone()),
                dispatcher,
                tick_interval: config.tick_interval(),
                error_backoff: config.error_backoff(),
                ticks: AtomicU64::new(0),
                failed_ticks: AtomicU64::new(0),
            }),
            running: Mutex::new(None),
        }
    }

    /// Wire a monitor and its dispatcher from configuration.
    pub fn from_config(
        store: Arc<dyn ReminderStore>,
        clock: Arc<dyn Clock>,
        system: Vec<Arc<dyn SystemNotifier>>,
        surface: Arc<dyn AckSurface>,
        config: &NudgeConfig,
    ) -> Self {
        let dispatcher = NotificationDispatcher::new(
            system,
            surface,
            store.clone(),
            InFlightTracker::new(),
            clock.clone(),
            &config.dispatch,
        );
        Self::new(store, clock, dispatcher, &config.monitor)
    }

    fn running(&self) -> std::sync::MutexGuard<'_, Option<RunningLoop>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> MonitorState {
        match self.running().as_ref() {
            Some(r) if !r.handle.is_finished() => MonitorState::Running,
            _ => MonitorState::Stopped,
        }
    }

    /// Spawn the polling loop. No-op (returns `false`) if already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.running();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(self.shared.clone(), cancel.clone()));
        *running = Some(RunningLoop { cancel, handle });
        true
    }

    /// Signal the loop to exit and abandon everything in flight.
    /// Returns `false` if it was not running.
    ///
    /// The tracker is cleared after cancelling. A tick that is already
    /// executing on another worker can still claim a reminder after the
    /// clear; that entry is released by its own finalization (safety net at
    /// the latest). Use [`Monitor::shutdown`] to close that window.
    pub fn stop(&self) -> bool {
        let stopped = self.running().take();
        if let Some(r) = &stopped {
            r.cancel.cancel();
        }
        self.shared.dispatcher.tracker().clear();
        stopped.is_some()
    }

    /// Cancel the loop, wait for it to finish, then clear the tracker.
    pub async fn shutdown(&self) {
        let stopped = self.running().take();
        if let Some(r) = stopped {
            r.cancel.cancel();
            let _ = r.handle.await;
        }
        self.shared.dispatcher.tracker().clear();
    }

    /// Run a single tick on the caller's task.
    pub fn tick(&self) -> Result<TickReport> {
        self.shared.guarded_tick()
    }

    /// Show a notification that is not tied to any stored reminder.
    pub fn trigger_manual_notification(&self, title: &str, body: &str) -> JoinHandle<()> {
        self.shared.dispatcher.dispatch_manual(title, body)
    }

    pub fn tracker(&self) -> &InFlightTracker {
        self.shared.dispatcher.tracker()
    }

    pub fn recent_deliveries(&self) -> Vec<Delivery> {
        self.shared.dispatcher.recent_deliveries()
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            ticks: self.shared.ticks.load(Ordering::Relaxed),
            failed_ticks: self.shared.failed_ticks.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(r) = self.running().take() {
            r.cancel.cancel();
        }
    }
}

async fn run_loop(shared: Arc<MonitorShared>, cancel: CancellationToken) {
    tracing::info!("⏰ Monitor started (check every {:?})", shared.tick_interval);

    loop {
        let wait = match shared.guarded_tick() {
            Ok(report) => {
                if report != TickReport::default() {
                    tracing::debug!(
                        "Tick: {} overdue, {} dispatched, {} regenerated",
                        report.marked_overdue,
                        report.dispatched.len(),
                        report.regenerated.len()
                    );
                }
                shared.tick_interval
            }
            Err(e) => {
                tracing::warn!("⚠️ Monitor tick failed: {e} (retrying in {:?})", shared.error_backoff);
                shared.error_backoff
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    tracing::info!("⏹️ Monitor stopped");
}
