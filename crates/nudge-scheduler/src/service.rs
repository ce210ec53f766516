//! Foreground commands used by the presentation layer: add, list, complete,
//! delete. Runs concurrently with the monitor against the same store.

use chrono::{DateTime, Duration, Utc};
use nudge_core::clock::Clock;
use nudge_core::error::{NudgeError, Result};
use nudge_core::types::{NewReminder, Recurrence, Reminder, ReminderId, ReminderStatus};
use serde::Serialize;
use std::sync::Arc;

use crate::recurrence;
use crate::store::ReminderStore;

/// Result of a manual completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompleteOutcome {
    /// Whether the status actually moved to `Done` (false if it was
    /// already finished).
    pub changed: bool,
    /// Next instance, for recurring reminders.
    pub successor: Option<ReminderId>,
}

pub struct ReminderService {
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
}

impl ReminderService {
    pub fn new(store: Arc<dyn ReminderStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn ReminderStore> {
        &self.store
    }

    /// Create a reminder. The due time must lie in the future.
    pub fn add(
        &self,
        title: &str,
        description: Option<&str>,
        due_time: DateTime<Utc>,
        recurrence: Option<Recurrence>,
    ) -> Result<ReminderId> {
        if due_time <= self.clock.now() {
            return Err(NudgeError::Validation(
                "reminder time must be in the future".into(),
            ));
        }
        let mut new = NewReminder::new(title.trim(), due_time).with_recurrence(recurrence);
        if let Some(d) = description {
            new = new.with_description(d.trim());
        }
        new.validate()?;
        let id = self.store.create(&new)?;
        tracing::info!(
            "📅 Reminder added: '{}' ({id}) due {}",
            new.title,
            due_time.format("%Y-%m-%d %H:%M")
        );
        Ok(id)
    }

    /// Quick one-shot reminder `minutes` from now.
    pub fn quick(&self, minutes: u32) -> Result<ReminderId> {
        if minutes == 0 {
            return Err(NudgeError::Validation("minutes must be positive".into()));
        }
        let due = self.clock.now() + Duration::minutes(i64::from(minutes));
        self.add(
            &format!("Quick reminder ({minutes} min)"),
            Some(&format!("Reminder set {minutes} minutes ahead")),
            due,
            None,
        )
    }

    pub fn list(&self) -> Result<Vec<Reminder>> {
        self.store.list_all()
    }

    /// Process finished recurring reminders, then list.
    pub fn refresh(&self) -> Result<Vec<Reminder>> {
        recurrence::sweep(self.store.as_ref(), self.clock.now())?;
        self.list()
    }

    pub fn get(&self, id: ReminderId) -> Result<Reminder> {
        self.store.get(id)?.ok_or(NudgeError::NotFound(id.0))
    }

    pub fn count(&self) -> Result<usize> {
        self.store.count()
    }

    pub fn delete(&self, id: ReminderId) -> Result<()> {
        if !self.store.delete(id)? {
            return Err(NudgeError::NotFound(id.0));
        }
        tracing::info!("🗑️ Reminder {id} deleted");
        Ok(())
    }

    /// Mark a reminder done and regenerate it right away if it recurs.
    pub fn complete(&self, id: ReminderId) -> Result<CompleteOutcome> {
        let changed = self.store.set_status(id, ReminderStatus::Done)?;
        if changed {
            tracing::info!("✅ Reminder {id} marked done");
        }
        let successor = recurrence::regenerate_by_id(self.store.as_ref(), id, self.clock.now())?;
        Ok(CompleteOutcome { changed, successor })
    }
}
