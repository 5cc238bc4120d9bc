//! Data models for shiftreport

pub mod configuration;
pub mod events;
pub mod point;
pub mod reminder;
pub mod report;
pub mod session;

pub use configuration::*;
pub use events::*;
pub use point::*;
pub use reminder::*;
pub use report::*;
pub use session::*;
