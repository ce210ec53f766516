//! # Nudge Scheduler
//!
//! Background reminder monitor: finds due reminders, delivers them through a
//! system notifier chain with a console fallback, marks stale ones overdue,
//! and regenerates recurring ones once they finish.
//!
//! ## Architecture
//! ```text
//! Monitor (tokio interval, one tick at a time)
//!   ├── OverdueMarker: Pending + due < now - grace → Overdue
//!   ├── DueNotifier: Pending + due <= now → claim → dispatch
//!   │      └── NotificationDispatcher
//!   │            ├── SystemNotifier chain (notify-send, ...)
//!   │            ├── AckSurface fallback (console prompt)
//!   │            └── finalize once: ack | safety net | auto-dismiss
//!   │                  → Done, release claim, regenerate if recurring
//!   └── recurrence::sweep: Done/Overdue + recurring → successor
//!
//! ReminderService (foreground CLI commands, same store)
//! ReminderStore: MemoryStore | SqliteStore
//! ```

pub mod backends;
pub mod dispatch;
pub mod engine;
pub mod notifier;
pub mod notify;
pub mod overdue;
pub mod persistence;
pub mod recurrence;
pub mod service;
pub mod store;
pub mod tracker;

pub use backends::{CommandNotifier, ConsoleAckSurface};
pub use dispatch::{AckHandle, AckSurface, NotificationDispatcher, SystemNotifier, SystemOutcome};
pub use engine::{Monitor, MonitorState, MonitorStats, TickReport};
pub use notifier::DueNotifier;
pub use notify::{Delivery, DeliveryLog, Notification};
pub use overdue::OverdueMarker;
pub use persistence::SqliteStore;
pub use service::{CompleteOutcome, ReminderService};
pub use store::{MemoryStore, ReminderStore};
pub use tracker::{Claim, InFlightTracker};
