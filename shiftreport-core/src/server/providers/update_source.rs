//! Update source: inbound events from communication providers

use crate::models::InboundEvent;
use crate::server::providers::TransportError;
use async_trait::async_trait;

/// Source of inbound chat events (e.g. Telegram getUpdates).
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Wait for the next batch of events. An empty batch means the poll timed out.
    async fn next_events(&self) -> Result<Vec<InboundEvent>, TransportError>;
}
