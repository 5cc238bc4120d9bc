//! In-memory transport that records outbound traffic (tests and dry runs)

use crate::models::{ChatId, Keyboard, MediaRef, MessageRef};
use crate::server::providers::{ChatTransport, TransportError, DEFAULT_MAX_MEDIA_GROUP};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One recorded outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentItem {
    Text {
        chat: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
        message: MessageRef,
    },
    Media {
        chat: ChatId,
        media: MediaRef,
        caption: Option<String>,
    },
    MediaGroup {
        chat: ChatId,
        items: Vec<MediaRef>,
    },
    Deleted {
        chat: ChatId,
        message: MessageRef,
    },
    Acknowledged {
        interaction_id: String,
    },
}

impl SentItem {
    pub fn chat(&self) -> Option<ChatId> {
        match self {
            SentItem::Text { chat, .. }
            | SentItem::Media { chat, .. }
            | SentItem::MediaGroup { chat, .. }
            | SentItem::Deleted { chat, .. } => Some(*chat),
            SentItem::Acknowledged { .. } => None,
        }
    }
}

/// Records every call; failures can be injected per chat.
pub struct RecordingTransport {
    sent: Mutex<Vec<SentItem>>,
    failing_text: Mutex<HashSet<ChatId>>,
    failing_media: Mutex<HashSet<ChatId>>,
    next_message_id: AtomicI64,
    max_media_group: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::with_max_media_group(DEFAULT_MAX_MEDIA_GROUP)
    }

    pub fn with_max_media_group(max_media_group: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing_text: Mutex::new(HashSet::new()),
            failing_media: Mutex::new(HashSet::new()),
            next_message_id: AtomicI64::new(1),
            max_media_group,
        }
    }

    /// Make text sends to `chat` fail until `recover` is called
    pub fn fail_text_to(&self, chat: ChatId) {
        lock(&self.failing_text).insert(chat);
    }

    /// Make media sends to `chat` fail until `recover` is called
    pub fn fail_media_to(&self, chat: ChatId) {
        lock(&self.failing_media).insert(chat);
    }

    pub fn recover(&self, chat: ChatId) {
        lock(&self.failing_text).remove(&chat);
        lock(&self.failing_media).remove(&chat);
    }

    pub fn sent(&self) -> Vec<SentItem> {
        lock(&self.sent).clone()
    }

    /// Everything sent to one chat, in order
    pub fn sent_to(&self, chat: ChatId) -> Vec<SentItem> {
        lock(&self.sent)
            .iter()
            .filter(|item| item.chat() == Some(chat))
            .cloned()
            .collect()
    }

    /// Texts sent to one chat, in order
    pub fn texts_to(&self, chat: ChatId) -> Vec<String> {
        lock(&self.sent)
            .iter()
            .filter_map(|item| match item {
                SentItem::Text { chat: c, text, .. } if *c == chat => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_text_to(&self, chat: ChatId) -> Option<String> {
        self.texts_to(chat).pop()
    }

    /// Recipients of every text, in send order
    pub fn text_recipients(&self) -> Vec<ChatId> {
        lock(&self.sent)
            .iter()
            .filter_map(|item| match item {
                SentItem::Text { chat, .. } => Some(*chat),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.sent).clear();
    }

    fn next_ref(&self) -> MessageRef {
        MessageRef(self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }

    fn record(&self, item: SentItem) {
        lock(&self.sent).push(item);
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    fn max_media_group(&self) -> usize {
        self.max_media_group
    }

    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, TransportError> {
        if lock(&self.failing_text).contains(&chat) {
            return Err(TransportError::Refused(chat));
        }
        let message = self.next_ref();
        self.record(SentItem::Text {
            chat,
            text: text.to_string(),
            keyboard,
            message,
        });
        Ok(message)
    }

    async fn send_media(
        &self,
        chat: ChatId,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<MessageRef, TransportError> {
        if lock(&self.failing_media).contains(&chat) {
            return Err(TransportError::Refused(chat));
        }
        self.record(SentItem::Media {
            chat,
            media: media.clone(),
            caption: caption.map(str::to_string),
        });
        Ok(self.next_ref())
    }

    async fn send_media_group(
        &self,
        chat: ChatId,
        items: &[MediaRef],
    ) -> Result<(), TransportError> {
        if lock(&self.failing_media).contains(&chat) {
            return Err(TransportError::Refused(chat));
        }
        self.record(SentItem::MediaGroup {
            chat,
            items: items.to_vec(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageRef) -> Result<(), TransportError> {
        self.record(SentItem::Deleted { chat, message });
        Ok(())
    }

    async fn acknowledge_interaction(
        &self,
        interaction_id: &str,
        _text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.record(SentItem::Acknowledged {
            interaction_id: interaction_id.to_string(),
        });
        Ok(())
    }
}
