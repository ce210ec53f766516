//! SQLite-backed reminder store.
//! Survives restarts; AUTOINCREMENT keeps ids from ever being reused.

use chrono::{DateTime, Utc};
use nudge_core::error::{NudgeError, Result};
use nudge_core::types::{NewReminder, Recurrence, RecurrenceUnit, Reminder, ReminderId, ReminderStatus};
use rusqlite::OptionalExtension;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::store::ReminderStore;

const SELECT_COLUMNS: &str = "SELECT id, title, description, due_time, status, created_time, \
     recurrence_interval, recurrence_unit FROM reminders";

/// SQLite persistence for reminders.
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open or create the reminder database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path).map_err(|e| db_err("DB open", e))?;
        Self::with_connection(conn)
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|e| db_err("DB open", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS reminders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                due_time INTEGER NOT NULL,            -- unix millis
                status TEXT NOT NULL DEFAULT 'pending',
                created_time INTEGER NOT NULL,        -- unix millis
                recurrence_interval INTEGER NOT NULL DEFAULT 0,
                recurrence_unit TEXT NOT NULL DEFAULT 'minutes'
            );
            CREATE INDEX IF NOT EXISTS idx_reminders_status_due
                ON reminders (status, due_time);
         ",
            )
            .map_err(|e| db_err("Migration", e))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>> {
        self.conn
            .lock()
            .map_err(|_| NudgeError::Store("connection lock poisoned".into()))
    }

    fn query(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Reminder>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(|e| db_err("Prepare", e))?;
        let rows = stmt
            .query_map(params, row_to_reminder)
            .map_err(|e| db_err("Query", e))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_err("Read row", e))
    }
}

fn insert(conn: &rusqlite::Connection, new: &NewReminder) -> Result<ReminderId> {
    new.validate()?;
    let (interval, unit) = match &new.recurrence {
        Some(r) => (r.interval, r.unit),
        None => (0, RecurrenceUnit::Minutes),
    };
    conn.execute(
        "INSERT INTO reminders (title, description, due_time, status, created_time,
                                recurrence_interval, recurrence_unit)
         VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6)",
        rusqlite::params![
            new.title,
            new.description,
            new.due_time.timestamp_millis(),
            Utc::now().timestamp_millis(),
            interval,
            unit.as_str(),
        ],
    )
    .map_err(|e| db_err("Insert reminder", e))?;
    Ok(ReminderId(conn.last_insert_rowid()))
}

fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    let due_ms: i64 = row.get(3)?;
    let status: String = row.get(4)?;
    let created_ms: i64 = row.get(5)?;
    let interval: u32 = row.get(6)?;
    let unit: String = row.get(7)?;

    Ok(Reminder {
        id: ReminderId(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        due_time: from_millis(due_ms),
        status: ReminderStatus::from_db(&status),
        created_time: from_millis(created_ms),
        recurrence: Recurrence::new(interval, RecurrenceUnit::parse_lenient(&unit)),
    })
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn db_err(context: &str, e: rusqlite::Error) -> NudgeError {
    NudgeError::Store(format!("{context}: {e}"))
}

impl ReminderStore for SqliteStore {
    fn create(&self, new: &NewReminder) -> Result<ReminderId> {
        let conn = self.conn()?;
        let id = insert(&conn, new)?;
        tracing::debug!("💾 Inserted reminder {id}");
        Ok(id)
    }

    fn get(&self, id: ReminderId) -> Result<Option<Reminder>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            [id.0],
            row_to_reminder,
        )
        .optional()
        .map_err(|e| db_err("Get reminder", e))
    }

    fn list_all(&self) -> Result<Vec<Reminder>> {
        self.query(&format!("{SELECT_COLUMNS} ORDER BY due_time, id"), &[])
    }

    fn list_due_pending(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        self.query(
            &format!(
                "{SELECT_COLUMNS} WHERE status = 'pending' AND due_time <= ?1 ORDER BY due_time, id"
            ),
            &[&now.timestamp_millis()],
        )
    }

    fn set_status(&self, id: ReminderId, status: ReminderStatus) -> Result<bool> {
        let conn = self.conn()?;
        let changed = if ReminderStatus::Pending.can_transition_to(status) {
            conn.execute(
                "UPDATE reminders SET status = ?1 WHERE id = ?2 AND status = 'pending'",
                rusqlite::params![status.as_str(), id.0],
            )
            .map_err(|e| db_err("Update status", e))?
        } else {
            0
        };
        if changed > 0 {
            return Ok(true);
        }
        let exists: bool = conn
            .query_row("SELECT EXISTS(SELECT 1 FROM reminders WHERE id = ?1)", [id.0], |row| {
                row.get(0)
            })
            .map_err(|e| db_err("Check reminder", e))?;
        if exists {
            Ok(false)
        } else {
            Err(NudgeError::NotFound(id.0))
        }
    }

    fn delete(&self, id: ReminderId) -> Result<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM reminders WHERE id = ?1", [id.0])
            .map_err(|e| db_err("Delete reminder", e))?;
        Ok(removed > 0)
    }

    fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM reminders", [], |row| row.get(0))
            .map_err(|e| db_err("Count reminders", e))?;
        Ok(n as usize)
    }

    fn mark_overdue_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.conn()?
            .execute(
                "UPDATE reminders SET status = 'overdue' WHERE status = 'pending' AND due_time < ?1",
                [cutoff.timestamp_millis()],
            )
            .map_err(|e| db_err("Mark overdue", e))
    }

    /// Insert and delete inside one transaction.
    fn replace(&self, old: ReminderId, new: &NewReminder) -> Result<ReminderId> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(|e| db_err("Begin", e))?;
        let id = insert(&tx, new)?;
        let removed = tx
            .execute("DELETE FROM reminders WHERE id = ?1", [old.0])
            .map_err(|e| db_err("Delete reminder", e))?;
        if removed == 0 {
            // Dropping `tx` rolls the insert back.
            return Err(NudgeError::NotFound(old.0));
        }
        tx.commit().map_err(|e| db_err("Commit", e))?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_open_and_migrate() {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteStore::open(&dir.path().join("nested").join("test.db")).unwrap();
        assert_eq!(db.count().unwrap(), 0);
        assert!(db.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_reminder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let id = {
            let db = SqliteStore::open(&path).unwrap();
            let new = NewReminder::new("Water plants", at(60))
                .with_description("balcony")
                .with_recurrence(Recurrence::new(2, RecurrenceUnit::Days));
            db.create(&new).unwrap()
        };

        let db = SqliteStore::open(&path).unwrap();
        let r = db.get(id).unwrap().unwrap();
        assert_eq!(r.title, "Water plants");
        assert_eq!(r.description.as_deref(), Some("balcony"));
        assert_eq!(r.due_time, at(60));
        assert_eq!(r.status, ReminderStatus::Pending);
        assert_eq!(
            r.recurrence,
            Some(Recurrence { interval: 2, unit: RecurrenceUnit::Days })
        );
        assert!(db.get(ReminderId(42)).unwrap().is_none());
    }

    #[test]
    fn test_due_pending_query() {
        let db = SqliteStore::open_in_memory().unwrap();
        let b = db.create(&NewReminder::new("b", at(10))).unwrap();
        let a = db.create(&NewReminder::new("a", at(5))).unwrap();
        let _future = db.create(&NewReminder::new("future", at(100))).unwrap();
        let done = db.create(&NewReminder::new("done", at(1))).unwrap();
        db.set_status(done, ReminderStatus::Done).unwrap();

        let due: Vec<_> = db.list_due_pending(at(10)).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(due, vec![a, b]);
    }

    #[test]
    fn test_status_transitions_persist() {
        let db = SqliteStore::open_in_memory().unwrap();
        let id = db.create(&NewReminder::new("x", at(0))).unwrap();
        assert!(db.set_status(id, ReminderStatus::Overdue).unwrap());
        assert!(!db.set_status(id, ReminderStatus::Done).unwrap());
        assert_eq!(db.get(id).unwrap().unwrap().status, ReminderStatus::Overdue);
        assert!(matches!(
            db.set_status(ReminderId(77), ReminderStatus::Done),
            Err(NudgeError::NotFound(77))
        ));
    }

    #[test]
    fn test_mark_overdue_before_is_idempotent() {
        let db = SqliteStore::open_in_memory().unwrap();
        let old = db.create(&NewReminder::new("old", at(0))).unwrap();
        let _new = db.create(&NewReminder::new("new", at(120))).unwrap();
        let cutoff = at(120) - Duration::minutes(1);
        assert_eq!(db.mark_overdue_before(cutoff).unwrap(), 1);
        assert_eq!(db.mark_overdue_before(cutoff).unwrap(), 0);
        assert_eq!(db.get(old).unwrap().unwrap().status, ReminderStatus::Overdue);
    }

    #[test]
    fn test_ids_never_reused() {
        let db = SqliteStore::open_in_memory().unwrap();
        let a = db.create(&NewReminder::new("a", at(0))).unwrap();
        assert!(db.delete(a).unwrap());
        let b = db.create(&NewReminder::new("b", at(0))).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_replace_rolls_back_when_source_missing() {
        let db = SqliteStore::open_in_memory().unwrap();
        let old = db.create(&NewReminder::new("old", at(0))).unwrap();
        let new = db.replace(old, &NewReminder::new("new", at(3600))).unwrap();
        assert_eq!(db.count().unwrap(), 1);
        assert!(db.get(old).unwrap().is_none());
        assert_eq!(db.get(new).unwrap().unwrap().title, "new");

        // Source already gone: nothing may be inserted.
        assert!(matches!(
            db.replace(old, &NewReminder::new("dup", at(7200))),
            Err(NudgeError::NotFound(_))
        ));
        assert_eq!(db.count().unwrap(), 1);
    }

    #[test]
    fn test_unknown_unit_reads_as_minutes() {
        let db = SqliteStore::open_in_memory().unwrap();
        let id = db
            .create(&NewReminder::new("x", at(0)).with_recurrence(Recurrence::new(3, RecurrenceUnit::Hours)))
            .unwrap();
        db.conn()
            .unwrap()
            .execute("UPDATE reminders SET recurrence_unit = 'weeks' WHERE id = ?1", [id.0])
            .unwrap();
        let r = db.get(id).unwrap().unwrap();
        assert_eq!(r.recurrence.unwrap().unit, RecurrenceUnit::Minutes);
    }
}
