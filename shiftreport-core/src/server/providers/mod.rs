//! Chat transport providers: outbound delivery and inbound updates
//!
//! `ChatTransport` is the narrow send interface the core depends on; `UpdateSource`
//! yields inbound events. Telegram implements both, `RecordingTransport` records
//! outbound traffic in memory for tests and dry runs.

mod recording;
mod telegram;
mod transport;
mod update_source;

pub use recording::{RecordingTransport, SentItem};
pub use telegram::{TelegramTransport, TelegramUpdateSource};
pub use transport::{ChatTransport, TransportError, DEFAULT_MAX_MEDIA_GROUP};
pub use update_source::UpdateSource;
