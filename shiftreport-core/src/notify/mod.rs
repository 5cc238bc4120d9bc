//! Outbound reminder notifications: per-user timer slots, prompt texts and the debouncer

mod debouncer;
pub mod prompt;
mod timer_slot;

pub use debouncer::NotificationDebouncer;
pub use timer_slot::TimerSlots;
