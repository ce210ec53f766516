//! Concrete delivery backends: a desktop notification command and a console
//! acknowledgment prompt.

use async_trait::async_trait;
use nudge_core::config::DispatchConfig;
use nudge_core::error::{NudgeError, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::dispatch::{AckHandle, AckSurface, SystemNotifier, SystemOutcome};
use crate::notify::Notification;

/// Runs an external notifier such as `notify-send TITLE BODY`.
/// A missing binary counts as unavailable rather than failed.
pub struct CommandNotifier {
    command: String,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.notify_command.clone(), config.notify_timeout())
    }
}

#[async_trait]
impl SystemNotifier for CommandNotifier {
    fn name(&self) -> &str {
        &self.command
    }

    async fn present(&self, notification: &Notification) -> Result<SystemOutcome> {
        let run = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.command)
                .arg(&notification.title)
                .arg(&notification.body)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match run {
            Err(_) => Err(NudgeError::Notify(format!(
                "{} timed out after {}s",
                self.command,
                self.timeout.as_secs()
            ))),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(SystemOutcome::Unavailable),
            Ok(Err(e)) => Err(NudgeError::Notify(format!("{}: {e}", self.command))),
            Ok(Ok(o)) if o.status.success() => Ok(SystemOutcome::Delivered),
            Ok(Ok(o)) => Err(NudgeError::Notify(format!(
                "{} exited with {}: {}",
                self.command,
                o.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&o.stderr).trim()
            ))),
        }
    }
}

/// Prints prompts to the terminal and queues their handles. Whoever reads
/// user input calls [`ConsoleAckSurface::acknowledge_oldest`].
#[derive(Default)]
pub struct ConsoleAckSurface {
    open: Mutex<VecDeque<AckHandle>>,
}

impl ConsoleAckSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acknowledge the oldest prompt that is still open. Prompts already
    /// closed by a timer are discarded on the way.
    pub fn acknowledge_oldest(&self) -> Option<Notification> {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(handle) = open.pop_front() {
            if handle.acknowledge() {
                return Some(handle.notification().clone());
            }
        }
        None
    }

    /// Number of prompts that have not been closed yet.
    pub fn open_prompts(&self) -> usize {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        open.retain(|h| !h.is_finalized());
        open.len()
    }
}

impl AckSurface for ConsoleAckSurface {
    fn name(&self) -> &str {
        "console"
    }

    fn present(&self, notification: &Notification, ack: AckHandle) {
        println!();
        println!("🔔 {}", notification.title);
        println!("   {}", notification.body);
        println!("   due {}", notification.due_time.format("%Y-%m-%d %H:%M"));
        println!("   [press Enter to acknowledge]");
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        // Prompts closed by their timers are dropped here.
        open.retain(|h| !h.is_finalized());
        open.push_back(ack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::NotificationDispatcher;
    use crate::store::{MemoryStore, ReminderStore};
    use crate::tracker::InFlightTracker;
    use chrono::Utc;
    use nudge_core::clock::SystemClock;
    use nudge_core::types::{NewReminder, ReminderStatus};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        let notifier = CommandNotifier::new("nudge-no-such-notifier-binary", Duration::from_secs(2));
        let n = Notification::manual("t", "b", Utc::now());
        assert_eq!(notifier.present(&n).await.unwrap(), SystemOutcome::Unavailable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_exit_status() {
        let n = Notification::manual("t", "b", Utc::now());
        let ok = CommandNotifier::new("true", Duration::from_secs(5));
        assert_eq!(ok.present(&n).await.unwrap(), SystemOutcome::Delivered);
        let failing = CommandNotifier::new("false", Duration::from_secs(5));
        assert!(matches!(failing.present(&n).await, Err(NudgeError::Notify(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_acknowledges_oldest_open() {
        let store = Arc::new(MemoryStore::new());
        let tracker = InFlightTracker::new();
        let surface = Arc::new(ConsoleAckSurface::new());
        let dispatcher = NotificationDispatcher::new(
            vec![],
            surface.clone(),
            store.clone(),
            tracker.clone(),
            Arc::new(SystemClock),
            &DispatchConfig::default(),
        );

        let now = Utc::now();
        let a = store.create(&NewReminder::new("first", now)).unwrap();
        let b = store.create(&NewReminder::new("second", now)).unwrap();
        for id in [a, b] {
            let r = store.get(id).unwrap().unwrap();
            let claim = tracker.try_claim(id).unwrap();
            dispatcher.dispatch(&r, claim).await.unwrap();
        }
        assert_eq!(surface.open_prompts(), 2);

        let acked = surface.acknowledge_oldest().unwrap();
        assert_eq!(acked.title, "first");
        assert_eq!(store.get(a).unwrap().unwrap().status, ReminderStatus::Done);
        assert_eq!(store.get(b).unwrap().unwrap().status, ReminderStatus::Pending);
        assert_eq!(surface.open_prompts(), 1);

        // The safety net closes the second prompt; nothing left to acknowledge.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(surface.open_prompts(), 0);
        assert!(surface.acknowledge_oldest().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_closed_prompts_do_not_accumulate() {
        let store = Arc::new(MemoryStore::new());
        let tracker = InFlightTracker::new();
        let surface = Arc::new(ConsoleAckSurface::new());
        let dispatcher = NotificationDispatcher::new(
            vec![],
            surface.clone(),
            store.clone(),
            tracker.clone(),
            Arc::new(SystemClock),
            &DispatchConfig::default(),
        );

        let now = Utc::now();
        for i in 0..50 {
            let id = store.create(&NewReminder::new(format!("r{i}"), now)).unwrap();
            let r = store.get(id).unwrap().unwrap();
            let claim = tracker.try_claim(id).unwrap();
            dispatcher.dispatch(&r, claim).await.unwrap();
        }
        assert_eq!(surface.open.lock().unwrap().len(), 50);

        // Nobody answers; the timers close everything.
        tokio::time::sleep(Duration::from_secs(31)).await;
        let id = store.create(&NewReminder::new("fresh", now)).unwrap();
        let r = store.get(id).unwrap().unwrap();
        dispatcher.dispatch(&r, tracker.try_claim(id).unwrap()).await.unwrap();
        assert_eq!(surface.open.lock().unwrap().len(), 1);
    }
}
