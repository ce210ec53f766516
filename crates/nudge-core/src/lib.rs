//! # Nudge Core
//!
//! Shared building blocks for the Nudge reminder engine: the reminder data
//! model, configuration, the error type and the injectable time source.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::NudgeConfig;
pub use error::{NudgeError, Result};
pub use types::{NewReminder, Recurrence, RecurrenceUnit, Reminder, ReminderId, ReminderStatus};
