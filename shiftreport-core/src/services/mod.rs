//! Services: logging, the known-user roster and the restart notice

pub mod logging;
pub mod restart_notice;
pub mod roster;

pub use restart_notice::{broadcast_restart_notice, RestartNoticeReport};
pub use roster::{FileRoster, MemoryRoster, Roster, RosterError};
