//! Due-reminder selection and dedup-guarded dispatch.

use chrono::{DateTime, Utc};
use nudge_core::error::Result;
use nudge_core::types::ReminderId;

use crate::dispatch::NotificationDispatcher;
use crate::store::{self, ReminderStore};

/// Picks `Pending` reminders whose due time has arrived and hands each one
/// to the dispatcher unless it is already in flight.
pub struct DueNotifier {
    dispatcher: NotificationDispatcher,
}

impl DueNotifier {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self { dispatcher }
    }

    /// One selection + dispatch pass. Returns the ids dispatched in this
    /// pass, earliest due first (ties by id).
    pub fn run(&self, store: &dyn ReminderStore, now: DateTime<Utc>) -> Result<Vec<ReminderId>> {
        let mut due = store.list_due_pending(now)?;
        store::sort_by_due(&mut due);

        let tracker = self.dispatcher.tracker();
        let mut dispatched = Vec::new();
        for reminder in &due {
            let Some(claim) = tracker.try_claim(reminder.id) else {
                tracing::debug!("Reminder {} already in flight, skipping", reminder.id);
                continue;
            };
            self.dispatcher.dispatch(reminder, claim);
            dispatched.push(reminder.id);
        }
        Ok(dispatched)
    }
}
