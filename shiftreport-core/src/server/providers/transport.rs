//! Outbound chat transport

use crate::models::{ChatId, Keyboard, MediaRef, MessageRef};
use async_trait::async_trait;
use thiserror::Error;

/// Largest media group the Bot API accepts in one call
pub const DEFAULT_MAX_MEDIA_GROUP: usize = 10;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Delivery to chat {0} refused")]
    Refused(ChatId),
}

// Bot API URLs embed the token; it must never reach a log line
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.without_url())
    }
}

/// Send interface to a chat provider (e.g. Telegram).
///
/// Every call may fail independently; callers log failures and never treat them as fatal.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Provider name for logging (e.g. "telegram").
    fn name(&self) -> &str;

    /// Maximum items per `send_media_group` call
    fn max_media_group(&self) -> usize {
        DEFAULT_MAX_MEDIA_GROUP
    }

    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, TransportError>;

    async fn send_media(
        &self,
        chat: ChatId,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<MessageRef, TransportError>;

    /// Send 2..=`max_media_group` items as one album
    async fn send_media_group(&self, chat: ChatId, items: &[MediaRef])
        -> Result<(), TransportError>;

    async fn delete_message(&self, chat: ChatId, message: MessageRef)
        -> Result<(), TransportError>;

    /// Dismiss the loading state of a pressed button
    async fn acknowledge_interaction(
        &self,
        interaction_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
}
