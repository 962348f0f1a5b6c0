//! Background jobs owned by the composition root.

pub mod reminder;

pub use reminder::{ReminderWorker, SweepReport, spawn_reminder_worker};
