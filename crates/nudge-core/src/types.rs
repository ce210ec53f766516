//! Reminder data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NudgeError, Result};

/// Store-assigned reminder identifier. Ids are never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(pub i64);

impl ReminderId {
    /// Sentinel used for manual/test notifications. Never looked up in a store.
    pub const MANUAL: ReminderId = ReminderId(0);

    pub fn is_manual(self) -> bool {
        self == Self::MANUAL
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle status. `Done` and `Overdue` are terminal for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReminderStatus {
    Pending,
    Done,
    Overdue,
}

impl ReminderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Done => "done",
            ReminderStatus::Overdue => "overdue",
        }
    }

    /// Parse a stored status. Unknown values read as `Pending`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "done" => ReminderStatus::Done,
            "overdue" => ReminderStatus::Overdue,
            _ => ReminderStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ReminderStatus::Pending)
    }

    /// Whether the state machine allows `self -> next`.
    pub fn can_transition_to(self, next: ReminderStatus) -> bool {
        matches!(
            (self, next),
            (ReminderStatus::Pending, ReminderStatus::Done)
                | (ReminderStatus::Pending, ReminderStatus::Overdue)
        )
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of a recurrence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecurrenceUnit {
    Minutes,
    Hours,
    Days,
}

impl RecurrenceUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            RecurrenceUnit::Minutes => "minutes",
            RecurrenceUnit::Hours => "hours",
            RecurrenceUnit::Days => "days",
        }
    }

    pub fn minutes(self) -> u64 {
        match self {
            RecurrenceUnit::Minutes => 1,
            RecurrenceUnit::Hours => 60,
            RecurrenceUnit::Days => 24 * 60,
        }
    }

    /// Permissive parse: anything unrecognised is treated as minutes.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "hour" | "hours" => RecurrenceUnit::Hours,
            "d" | "day" | "days" => RecurrenceUnit::Days,
            _ => RecurrenceUnit::Minutes,
        }
    }
}

impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence spec: repeat every `interval` `unit`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub interval: u32,
    pub unit: RecurrenceUnit,
}

impl Recurrence {
    /// Longest accepted period: 100 years.
    pub const MAX_SPAN_MINUTES: u64 = 36_525 * 24 * 60;

    /// A zero interval means one-shot, so it yields `None`.
    pub fn new(interval: u32, unit: RecurrenceUnit) -> Option<Self> {
        (interval > 0).then_some(Self { interval, unit })
    }

    pub fn span_minutes(&self) -> u64 {
        u64::from(self.interval) * self.unit.minutes()
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} {}", self.interval, self.unit)
    }
}

/// A stored reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub title: String,
    pub description: Option<String>,
    /// The instant the reminder should fire. Never mutated; recurrence
    /// creates a new record instead.
    pub due_time: DateTime<Utc>,
    pub status: ReminderStatus,
    pub created_time: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
}

impl Reminder {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Pending && self.due_time <= now
    }

    /// Recurring and in a terminal status: ready to be regenerated.
    pub fn awaits_regeneration(&self) -> bool {
        self.is_recurring() && self.status.is_terminal()
    }
}

/// Input for creating a reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReminder {
    pub title: String,
    pub description: Option<String>,
    pub due_time: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
}

impl NewReminder {
    pub fn new(title: impl Into<String>, due_time: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_time,
            recurrence: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.trim().is_empty()).then_some(description);
        self
    }

    pub fn with_recurrence(mut self, recurrence: Option<Recurrence>) -> Self {
        self.recurrence = recurrence;
        self
    }

    /// Check the invariants a store relies on.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(NudgeError::Validation("title must not be empty".into()));
        }
        if let Some(r) = &self.recurrence
            && r.interval == 0
        {
            return Err(NudgeError::Validation(
                "recurrence interval must be positive".into(),
            ));
        }
        if let Some(r) = &self.recurrence
            && r.span_minutes() > Recurrence::MAX_SPAN_MINUTES
        {
            return Err(NudgeError::Validation(format!("{r} is too long")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use ReminderStatus::*;
        assert!(Pending.can_transition_to(Done));
        assert!(Pending.can_transition_to(Overdue));
        assert!(!Done.can_transition_to(Pending));
        assert!(!Overdue.can_transition_to(Done));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_status_from_db_defaults_to_pending() {
        assert_eq!(ReminderStatus::from_db("done"), ReminderStatus::Done);
        assert_eq!(ReminderStatus::from_db("overdue"), ReminderStatus::Overdue);
        assert_eq!(ReminderStatus::from_db("???"), ReminderStatus::Pending);
    }

    #[test]
    fn test_unit_parse_lenient() {
        assert_eq!(RecurrenceUnit::parse_lenient("Hours"), RecurrenceUnit::Hours);
        assert_eq!(RecurrenceUnit::parse_lenient("days"), RecurrenceUnit::Days);
        assert_eq!(RecurrenceUnit::parse_lenient("fortnights"), RecurrenceUnit::Minutes);
        assert_eq!(RecurrenceUnit::parse_lenient(""), RecurrenceUnit::Minutes);
    }

    #[test]
    fn test_zero_interval_is_one_shot() {
        assert!(Recurrence::new(0, RecurrenceUnit::Hours).is_none());
        assert!(Recurrence::new(2, RecurrenceUnit::Hours).is_some());
    }

    #[test]
    fn test_validate() {
        let now = Utc::now();
        assert!(NewReminder::new("  ", now).validate().is_err());
        assert!(NewReminder::new("Stand up", now).validate().is_ok());

        let bad = NewReminder::new("x", now).with_recurrence(Some(Recurrence {
            interval: 0,
            unit: RecurrenceUnit::Days,
        }));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_caps_recurrence_span() {
        let now = Utc::now();
        let century = NewReminder::new("x", now).with_recurrence(Recurrence::new(36_525, RecurrenceUnit::Days));
        assert!(century.validate().is_ok());
        let huge = NewReminder::new("x", now).with_recurrence(Recurrence::new(u32::MAX, RecurrenceUnit::Days));
        assert!(matches!(huge.validate(), Err(NudgeError::Validation(_))));
        let huge_minutes = NewReminder::new("x", now).with_recurrence(Recurrence::new(u32::MAX, RecurrenceUnit::Minutes));
        assert!(huge_minutes.validate().is_err());
    }

    #[test]
    fn test_blank_description_dropped() {
        let r = NewReminder::new("x", Utc::now()).with_description("   ");
        assert!(r.description.is_none());
    }
}
