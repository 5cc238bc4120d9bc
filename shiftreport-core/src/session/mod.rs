//! Session storage and shift termination

mod store;
mod termination;

pub use store::{SessionHandle, SessionStore, SessionSummary};
pub use termination::{end_shift, EndReason};
