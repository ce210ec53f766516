//! Recurrence: next-due computation and regeneration of finished recurring
//! reminders.
//!
//! Successors are anchored at the moment of regeneration, not at the source's
//! due time, so a late acknowledgment drifts the schedule forward instead of
//! producing a burst of catch-up instances.

use chrono::{DateTime, Duration, Utc};
use nudge_core::error::{NudgeError, Result};
use nudge_core::types::{NewReminder, RecurrenceUnit, Reminder, ReminderId};

use crate::store::ReminderStore;

/// `anchor + interval * unit`. Fails with `Validation` when the result is
/// past the representable calendar.
pub fn next_due(anchor: DateTime<Utc>, interval: u32, unit: RecurrenceUnit) -> Result<DateTime<Utc>> {
    let n = i64::from(interval);
    let step = match unit {
        RecurrenceUnit::Minutes => Duration::try_minutes(n),
        RecurrenceUnit::Hours => Duration::try_hours(n),
        RecurrenceUnit::Days => Duration::try_days(n),
    };
    step.and_then(|step| anchor.checked_add_signed(step))
        .ok_or_else(|| NudgeError::Validation(format!("every {interval} {unit} is out of range")))
}

/// Same as [`next_due`] but takes the unit as free text; unrecognised units
/// count as minutes.
pub fn next_due_lenient(anchor: DateTime<Utc>, interval: u32, unit: &str) -> Result<DateTime<Utc>> {
    next_due(anchor, interval, RecurrenceUnit::parse_lenient(unit))
}

/// The record that replaces `source`, or `None` if it is not ready to
/// regenerate (one-shot, or still pending).
pub fn successor(source: &Reminder, now: DateTime<Utc>) -> Result<Option<NewReminder>> {
    let Some(rec) = source.recurrence.filter(|_| source.awaits_regeneration()) else {
        return Ok(None);
    };
    Ok(Some(NewReminder {
        title: source.title.clone(),
        description: source.description.clone(),
        due_time: next_due(now, rec.interval, rec.unit)?,
        recurrence: Some(rec),
    }))
}

/// Replace a finished recurring reminder with its next `Pending` instance.
/// Returns the new id, or `None` when there was nothing to regenerate.
pub fn regenerate(
    store: &dyn ReminderStore,
    source: &Reminder,
    now: DateTime<Utc>,
) -> Result<Option<ReminderId>> {
    let Some(next) = successor(source, now)? else {
        return Ok(None);
    };
    let id = store.replace(source.id, &next)?;
    tracing::info!(
        "🔁 Regenerated '{}' {} → {} due {}",
        source.title,
        source.id,
        id,
        next.due_time.format("%Y-%m-%d %H:%M:%S")
    );
    Ok(Some(id))
}

/// Look `id` up again and regenerate it if it is finished and recurring.
/// A record that vanished in the meantime is not an error.
pub fn regenerate_by_id(
    store: &dyn ReminderStore,
    id: ReminderId,
    now: DateTime<Utc>,
) -> Result<Option<ReminderId>> {
    match store.get(id)? {
        Some(source) => regenerate(store, &source, now),
        None => Ok(None),
    }
}

/// Regenerate every finished recurring reminder in the store.
/// Returns `(source, successor)` pairs.
///
/// A source that disappears between the listing and its replacement was
/// handled elsewhere (deleted, or regenerated by a finalization) and is
/// skipped. So is a source whose next occurrence cannot be computed. Only
/// store failures abort the sweep.
pub fn sweep(store: &dyn ReminderStore, now: DateTime<Utc>) -> Result<Vec<(ReminderId, ReminderId)>> {
    let mut regenerated = Vec::new();
    for source in store.list_all()? {
        match regenerate(store, &source, now) {
            Ok(Some(id)) => regenerated.push((source.id, id)),
            Ok(None) => {}
            Err(NudgeError::NotFound(_)) => {
                tracing::debug!("Reminder {} gone before regeneration, skipping", source.id);
            }
            Err(NudgeError::Validation(e)) => {
                tracing::warn!("⚠️ Cannot regenerate {}: {e}", source.id);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(regenerated)
}
