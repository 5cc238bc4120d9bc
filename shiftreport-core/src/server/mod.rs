//! Server runtime: wiring, per-chat event dispatch, control API and transport providers

pub mod api;
pub mod dispatch;
pub mod providers;
pub mod runtime;

pub use dispatch::EventDispatcher;
pub use runtime::{ShiftRuntime, ShiftServer};
