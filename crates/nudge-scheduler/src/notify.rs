//! Notification records and the in-memory delivery history.

use chrono::{DateTime, Utc};
use nudge_core::types::{Reminder, ReminderId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Body shown when a reminder has no description.
pub const DEFAULT_BODY: &str = "Reminder time!";

/// What gets presented to the user for one reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub reminder_id: ReminderId,
    pub title: String,
    pub body: String,
    pub due_time: DateTime<Utc>,
}

impl Notification {
    pub fn for_reminder(r: &Reminder) -> Self {
        Self {
            reminder_id: r.id,
            title: r.title.clone(),
            body: r
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_BODY.to_string()),
            due_time: r.due_time,
        }
    }

    /// A notification that is not backed by a stored reminder.
    pub fn manual(title: &str, body: &str, now: DateTime<Utc>) -> Self {
        Self {
            reminder_id: ReminderId::MANUAL,
            title: title.to_string(),
            body: body.to_string(),
            due_time: now,
        }
    }
}

/// One completed hand-off to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub notification: Notification,
    /// Name of the backend that accepted it.
    pub backend: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded ring buffer of recent deliveries.
#[derive(Debug)]
pub struct DeliveryLog {
    limit: usize,
    entries: Mutex<VecDeque<Delivery>>,
}

impl DeliveryLog {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, delivery: Delivery) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_back(delivery);
        while entries.len() > self.limit {
            entries.pop_front();
        }
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<Delivery> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for DeliveryLog {
    fn default() -> Self {
        Self::new(100)
    }
}
