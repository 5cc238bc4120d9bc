//! Reminder scheduling

mod reminder_scheduler;

pub use reminder_scheduler::{
    EnqueueFilter, FireOutcome, ForceEnqueueReport, ReminderScheduler, SchedulerError,
};
