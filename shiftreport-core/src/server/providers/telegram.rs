//! Telegram provider: send via Bot API and receive events via getUpdates.

use crate::models::{
    ChatId, Command, InboundContent, InboundEvent, InteractionPayload, Keyboard, MediaRef,
    MessageRef, Sender,
};
use crate::server::providers::{ChatTransport, TransportError, UpdateSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LONG_POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Shared Bot API client. Never log the token.
#[derive(Clone)]
struct BotApi {
    api_base: String,
    token: String,
    client: Arc<Client>,
}

impl BotApi {
    fn new(api_base: &str, token: String) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            client: Arc::new(Client::new()),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<T, TransportError> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        let mut request = self.client.post(&url).json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let res = request.send().await?;
        let status = res.status();
        let body: ApiResponse<T> = res
            .json()
            .await
            .map_err(|e| {
                TransportError::Decode(format!("{} ({}): {}", method, status, e.without_url()))
            })?;
        if !body.ok {
            return Err(TransportError::Api {
                code: body.error_code.unwrap_or(status.as_u16() as i64),
                description: body.description.unwrap_or_default(),
            });
        }
        body.result
            .ok_or_else(|| TransportError::Decode(format!("{}: missing result", method)))
    }
}

/// Telegram `reply_markup` for a keyboard
pub(crate) fn reply_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Reply { rows, one_time } => json!({
            "keyboard": rows
                .iter()
                .map(|row| row.iter().map(|label| json!({ "text": label })).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "resize_keyboard": true,
            "one_time_keyboard": one_time,
        }),
        Keyboard::Inline(rows) => json!({
            "inline_keyboard": rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.text, "callback_data": b.payload.to_callback_data() }))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        }),
        Keyboard::Remove => json!({ "remove_keyboard": true }),
    }
}

fn media_item(media: &MediaRef) -> Value {
    match media {
        MediaRef::Photo(id) => json!({ "type": "photo", "media": id }),
        MediaRef::Video(id) => json!({ "type": "video", "media": id }),
    }
}

/// Telegram transport (sendMessage, sendPhoto/sendVideo, sendMediaGroup, deleteMessage,
/// answerCallbackQuery). Token from env, supervisory chat from config.
pub struct TelegramTransport {
    api: BotApi,
    max_media_group: usize,
}

impl TelegramTransport {
    pub fn new(api_base: &str, token: String, max_media_group: usize) -> Self {
        Self {
            api: BotApi::new(api_base, token),
            max_media_group,
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
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
        let mut body = json!({ "chat_id": chat.0, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(&keyboard);
        }
        let sent: SentMessage = self.api.call("sendMessage", body, None).await?;
        Ok(MessageRef(sent.message_id))
    }

    async fn send_media(
        &self,
        chat: ChatId,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<MessageRef, TransportError> {
        let (method, field) = match media {
            MediaRef::Photo(_) => ("sendPhoto", "photo"),
            MediaRef::Video(_) => ("sendVideo", "video"),
        };
        let mut body = json!({ "chat_id": chat.0 });
        body[field] = json!(media.file_id());
        if let Some(caption) = caption {
            body["caption"] = json!(caption);
        }
        let sent: SentMessage = self.api.call(method, body, None).await?;
        Ok(MessageRef(sent.message_id))
    }

    async fn send_media_group(
        &self,
        chat: ChatId,
        items: &[MediaRef],
    ) -> Result<(), TransportError> {
        let body = json!({
            "chat_id": chat.0,
            "media": items.iter().map(media_item).collect::<Vec<_>>(),
        });
        let _: Vec<SentMessage> = self.api.call("sendMediaGroup", body, None).await?;
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageRef) -> Result<(), TransportError> {
        let body = json!({ "chat_id": chat.0, "message_id": message.0 });
        let _: bool = self.api.call("deleteMessage", body, None).await?;
        Ok(())
    }

    async fn acknowledge_interaction(
        &self,
        interaction_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "callback_query_id": interaction_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.api.call("answerCallbackQuery", body, None).await?;
        Ok(())
    }
}

// --- getUpdates (long poll) and UpdateSource ---

#[derive(Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<TelegramMessage>,
    #[serde(default)]
    callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Deserialize)]
struct TelegramMessage {
    message_id: i64,
    chat: TelegramChat,
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    /// Sizes in ascending order
    #[serde(default)]
    photo: Vec<TelegramFile>,
    #[serde(default)]
    video: Option<TelegramFile>,
    #[serde(default)]
    media_group_id: Option<String>,
}

#[derive(Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl TelegramUser {
    fn display_name(&self) -> String {
        let full = match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        };
        if !full.trim().is_empty() {
            return full.trim().to_string();
        }
        self.username
            .as_ref()
            .map(|u| format!("@{}", u))
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Deserialize)]
struct TelegramFile {
    file_id: String,
}

#[derive(Deserialize)]
struct TelegramCallbackQuery {
    id: String,
    from: TelegramUser,
    #[serde(default)]
    message: Option<TelegramMessage>,
    #[serde(default)]
    data: Option<String>,
}

/// Convert one update into an inbound event; unsupported updates yield `None`.
fn convert_update(update: TelegramUpdate) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let chat = query
            .message
            .as_ref()
            .map(|m| ChatId(m.chat.id))
            .unwrap_or(ChatId(query.from.id));
        let payload = query
            .data
            .as_deref()
            .and_then(InteractionPayload::from_callback_data)?;
        return Some(InboundEvent::Interaction {
            chat,
            interaction_id: query.id,
            payload,
        });
    }

    let message = update.message?;
    let chat = ChatId(message.chat.id);
    if let Some(command) = message.text.as_deref().and_then(Command::parse) {
        return Some(InboundEvent::Command { chat, command });
    }

    let sender = message
        .from
        .as_ref()
        .map(|u| Sender::new(u.id, u.display_name()))
        .unwrap_or_else(|| Sender::new(chat.0, chat.to_string()));
    Some(InboundEvent::Content {
        chat,
        content: InboundContent {
            message_id: message.message_id,
            sender,
            text: message.text.or(message.caption),
            // Largest size is last
            photo: message.photo.last().map(|p| p.file_id.clone()),
            video: message.video.map(|v| v.file_id),
            media_group_id: message.media_group_id,
        },
    })
}

/// Telegram update source (getUpdates long poll).
pub struct TelegramUpdateSource {
    api: BotApi,
    /// Next offset for getUpdates (last_update_id + 1).
    next_offset: AtomicI64,
}

impl TelegramUpdateSource {
    pub fn new(api_base: &str, token: String) -> Self {
        Self {
            api: BotApi::new(api_base, token),
            next_offset: AtomicI64::new(0),
        }
    }
}

#[async_trait]
impl UpdateSource for TelegramUpdateSource {
    async fn next_events(&self) -> Result<Vec<InboundEvent>, TransportError> {
        let offset = self.next_offset.load(Ordering::Relaxed);
        let body = json!({
            "offset": offset,
            "timeout": LONG_POLL_TIMEOUT_SECS,
            "allowed_updates": ["message", "callback_query"],
        });
        let updates: Vec<TelegramUpdate> = self
            .api
            .call(
                "getUpdates",
                body,
                Some(Duration::from_secs(LONG_POLL_TIMEOUT_SECS + 10)),
            )
            .await?;

        let mut last_id = None;
        let mut events = Vec::with_capacity(updates.len());
        for update in updates {
            last_id = Some(update.update_id);
            if let Some(event) = convert_update(update) {
                events.push(event);
            }
        }
        if let Some(id) = last_id {
            self.next_offset.store(id + 1, Ordering::Relaxed);
        }
        Ok(events)
    }
}
