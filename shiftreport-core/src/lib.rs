//! # Shiftreport Core Library
//!
//! Shift report coordination: point authentication, scheduled reminders, per-user
//! report sessions and consolidated submission to a supervisory chat.

pub mod janitor;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod server;
pub mod services;
pub mod session;
