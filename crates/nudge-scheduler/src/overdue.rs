//! Overdue marking.

use chrono::{DateTime, Duration, Utc};
use nudge_core::error::Result;

use crate::store::ReminderStore;

/// Moves `Pending` reminders more than `grace` past due into `Overdue`.
/// The grace window keeps reminders eligible for on-time delivery for a
/// while before they flip.
#[derive(Debug, Clone, Copy)]
pub struct OverdueMarker {
    grace: Duration,
}

impl OverdueMarker {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Returns how many reminders changed. Running it again with the same
    /// `now` changes nothing.
    pub fn run(&self, store: &dyn ReminderStore, now: DateTime<Utc>) -> Result<usize> {
        let marked = store.mark_overdue_before(now - self.grace)?;
        if marked > 0 {
            tracing::info!("⏰ Marked {marked} reminder(s) overdue");
        }
        Ok(marked)
    }
}

impl Default for OverdueMarker {
    fn default() -> Self {
        Self::new(Duration::minutes(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqliteStore;
    use crate::store::MemoryStore;
    use nudge_core::types::{NewReminder, ReminderStatus};

    #[test]
    fn test_marks_only_past_grace() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let stale = store.create(&NewReminder::new("stale", now - Duration::minutes(2))).unwrap();
        let in_grace = store
            .create(&NewReminder::new("in grace", now - Duration::seconds(30)))
            .unwrap();

        let marker = OverdueMarker::default();
        assert_eq!(marker.run(&store, now).unwrap(), 1);
        assert_eq!(store.get(stale).unwrap().unwrap().status, ReminderStatus::Overdue);
        assert_eq!(store.get(in_grace).unwrap().unwrap().status, ReminderStatus::Pending);
    }

    #[test]
    fn test_idempotent_for_same_now() {
        for store in [
            Box::new(MemoryStore::new()) as Box<dyn ReminderStore>,
            Box::new(SqliteStore::open_in_memory().unwrap()),
        ] {
            let now = Utc::now();
            store.create(&NewReminder::new("a", now - Duration::minutes(5))).unwrap();
            store.create(&NewReminder::new("b", now + Duration::minutes(5))).unwrap();
            let marker = OverdueMarker::default();

            marker.run(store.as_ref(), now).unwrap();
            let once: Vec<_> = store.list_all().unwrap().iter().map(|r| r.status).collect();
            assert_eq!(marker.run(store.as_ref(), now).unwrap(), 0);
            let twice: Vec<_> = store.list_all().unwrap().iter().map(|r| r.status).collect();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_done_reminders_untouched() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let id = store.create(&NewReminder::new("x", now - Duration::hours(1))).unwrap();
        store.set_status(id, ReminderStatus::Done).unwrap();
        OverdueMarker::default().run(&store, now).unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().status, ReminderStatus::Done);
    }
}
