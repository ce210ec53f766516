//! Reminder store interface plus an in-memory implementation.
//!
//! Each store call is atomic on its own; the engine never wraps several calls
//! in a transaction. Multi-step operations that need atomicity (`replace`)
//! are store operations so backends can provide it.

use chrono::{DateTime, Utc};
use nudge_core::error::{NudgeError, Result};
use nudge_core::types::{NewReminder, Reminder, ReminderId, ReminderStatus};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Durable record of reminders, as consumed by the engine.
pub trait ReminderStore: Send + Sync {
    /// Insert a new `Pending` reminder and return its id.
    fn create(&self, new: &NewReminder) -> Result<ReminderId>;

    fn get(&self, id: ReminderId) -> Result<Option<Reminder>>;

    /// All reminders ordered by due time ascending (ties by id).
    fn list_all(&self) -> Result<Vec<Reminder>>;

    /// `Pending` reminders with `due_time <= now`, earliest first.
    fn list_due_pending(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>>;

    /// Apply a status transition. Returns `Ok(false)` when the state machine
    /// forbids it (the record is no longer `Pending`), `NotFound` when the
    /// record is gone.
    fn set_status(&self, id: ReminderId, status: ReminderStatus) -> Result<bool>;

    /// Returns whether a record was removed.
    fn delete(&self, id: ReminderId) -> Result<bool>;

    fn count(&self) -> Result<usize>;

    /// Mark every `Pending` reminder due strictly before `cutoff` as `Overdue`.
    fn mark_overdue_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut marked = 0;
        for r in self.list_all()? {
            if r.status == ReminderStatus::Pending
                && r.due_time < cutoff
                && self.set_status(r.id, ReminderStatus::Overdue)?
            {
                marked += 1;
            }
        }
        Ok(marked)
    }

    /// Insert `new` and remove `old`.
    ///
    /// The default is two separate calls: a failure between them leaves both
    /// records present. Backends that can do better override this.
    fn replace(&self, old: ReminderId, new: &NewReminder) -> Result<ReminderId> {
        if self.get(old)?.is_none() {
            return Err(NudgeError::NotFound(old.0));
        }
        let id = self.create(new)?;
        self.delete(old)?;
        Ok(id)
    }
}

/// Sort key shared by all listing operations.
pub(crate) fn sort_by_due(reminders: &mut [Reminder]) {
    reminders.sort_by(|a, b| a.due_time.cmp(&b.due_time).then(a.id.cmp(&b.id)));
}

#[derive(Debug, Default)]
struct MemoryInner {
    last_id: i64,
    rows: BTreeMap<ReminderId, Reminder>,
}

/// Mutex-guarded in-memory store. Ids come from a monotonic counter and are
/// never reused.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| NudgeError::Store("memory store lock poisoned".into()))
    }

    fn insert(inner: &mut MemoryInner, new: &NewReminder) -> Result<ReminderId> {
        new.validate()?;
        inner.last_id += 1;
        let id = ReminderId(inner.last_id);
        inner.rows.insert(
            id,
            Reminder {
                id,
                title: new.title.clone(),
                description: new.description.clone(),
                due_time: new.due_time,
                status: ReminderStatus::Pending,
                created_time: Utc::now(),
                recurrence: new.recurrence,
            },
        );
        Ok(id)
    }
}

impl ReminderStore for MemoryStore {
    fn create(&self, new: &NewReminder) -> Result<ReminderId> {
        let mut inner = self.lock()?;
        Self::insert(&mut inner, new)
    }

    fn get(&self, id: ReminderId) -> Result<Option<Reminder>> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    fn list_all(&self) -> Result<Vec<Reminder>> {
        let mut all: Vec<Reminder> = self.lock()?.rows.values().cloned().collect();
        sort_by_due(&mut all);
        Ok(all)
    }

    fn list_due_pending(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let mut due: Vec<Reminder> = self
            .lock()?
            .rows
            .values()
            .filter(|r| r.is_due(now))
            .cloned()
            .collect();
        sort_by_due(&mut due);
        Ok(due)
    }

    fn set_status(&self, id: ReminderId, status: ReminderStatus) -> Result<bool> {
        let mut inner = self.lock()?;
        let row = inner.rows.get_mut(&id).ok_or(NudgeError::NotFound(id.0))?;
        if !row.status.can_transition_to(status) {
            return Ok(false);
        }
        row.status = status;
        Ok(true)
    }

    fn delete(&self, id: ReminderId) -> Result<bool> {
        Ok(self.lock()?.rows.remove(&id).is_some())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.lock()?.rows.len())
    }

    fn replace(&self, old: ReminderId, new: &NewReminder) -> Result<ReminderId> {
        let mut inner = self.lock()?;
        if !inner.rows.contains_key(&old) {
            return Err(NudgeError::NotFound(old.0));
        }
        let id = Self::insert(&mut inner, new)?;
        inner.rows.remove(&old);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_at(title: &str, due: DateTime<Utc>) -> NewReminder {
        NewReminder::new(title, due)
    }

    #[test]
    fn test_create_and_get() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let id = store.create(&new_at("Call mum", now)).unwrap();
        let r = store.get(id).unwrap().unwrap();
        assert_eq!(r.title, "Call mum");
        assert_eq!(r.status, ReminderStatus::Pending);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_create_rejects_empty_title() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.create(&new_at("", Utc::now())),
            Err(NudgeError::Validation(_))
        ));
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let a = store.create(&new_at("a", now)).unwrap();
        assert!(store.delete(a).unwrap());
        let b = store.create(&new_at("b", now)).unwrap();
        assert!(b > a);
        assert!(!store.delete(a).unwrap());
    }

    #[test]
    fn test_list_ordering_and_due_filter() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let late = store.create(&new_at("late", now + Duration::minutes(5))).unwrap();
        let early = store.create(&new_at("early", now - Duration::minutes(5))).unwrap();
        let tie = store.create(&new_at("tie", now - Duration::minutes(5))).unwrap();

        let ids: Vec<_> = store.list_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![early, tie, late]);

        let due: Vec<_> = store.list_due_pending(now).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(due, vec![early, tie]);
    }

    #[test]
    fn test_set_status_state_machine() {
        let store = MemoryStore::new();
        let id = store.create(&new_at("x", Utc::now())).unwrap();
        assert!(store.set_status(id, ReminderStatus::Done).unwrap());
        assert!(!store.set_status(id, ReminderStatus::Done).unwrap());
        assert!(!store.set_status(id, ReminderStatus::Pending).unwrap());
        assert!(!store.set_status(id, ReminderStatus::Overdue).unwrap());
        assert!(matches!(
            store.set_status(ReminderId(999), ReminderStatus::Done),
            Err(NudgeError::NotFound(999))
        ));
    }

    #[test]
    fn test_mark_overdue_before() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let old = store.create(&new_at("old", now - Duration::minutes(2))).unwrap();
        let fresh = store.create(&new_at("fresh", now)).unwrap();
        assert_eq!(store.mark_overdue_before(now - Duration::minutes(1)).unwrap(), 1);
        assert_eq!(store.get(old).unwrap().unwrap().status, ReminderStatus::Overdue);
        assert_eq!(store.get(fresh).unwrap().unwrap().status, ReminderStatus::Pending);
    }

    #[test]
    fn test_replace_is_atomic_swap() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let old = store.create(&new_at("old", now)).unwrap();
        let new = store.replace(old, &new_at("new", now + Duration::hours(1))).unwrap();
        assert!(store.get(old).unwrap().is_none());
        assert_eq!(store.get(new).unwrap().unwrap().title, "new");
        assert_eq!(store.count().unwrap(), 1);

        assert!(matches!(
            store.replace(old, &new_at("again", now)),
            Err(NudgeError::NotFound(_))
        ));
        assert_eq!(store.count().unwrap(), 1);
    }
}
