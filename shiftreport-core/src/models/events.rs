//! Inbound events and outbound presentation types shared with the transport layer

use crate::models::Sender;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat identifier. Users and the supervisory channel are both addressed by chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a message previously sent by the bot (for deletion/replacement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub i64);

/// Slash commands understood by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/start`: begin (or restart) authentication
    Start,
    /// `/end`: end the current shift
    End,
}

impl Command {
    /// Parse a command from message text. Accepts `/start@botname` style suffixes.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.split('@').next()?;
        match name {
            "/start" => Some(Command::Start),
            "/end" => Some(Command::End),
            _ => None,
        }
    }
}

/// Payload carried by an inline button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionPayload {
    SelectPoint(String),
    SelectReminder(String),
    FinishReport,
}

const POINT_PREFIX: &str = "point:";
const REPORT_PREFIX: &str = "report:";
const FINISH_DATA: &str = "finish_report";

impl InteractionPayload {
    /// Encode as transport callback data
    pub fn to_callback_data(&self) -> String {
        match self {
            InteractionPayload::SelectPoint(name) => format!("{}{}", POINT_PREFIX, name),
            InteractionPayload::SelectReminder(key) => format!("{}{}", REPORT_PREFIX, key),
            InteractionPayload::FinishReport => FINISH_DATA.to_string(),
        }
    }

    /// Decode transport callback data. Unknown data yields `None`.
    pub fn from_callback_data(data: &str) -> Option<Self> {
        if data == FINISH_DATA {
            return Some(InteractionPayload::FinishReport);
        }
        if let Some(name) = data.strip_prefix(POINT_PREFIX) {
            return (!name.is_empty()).then(|| InteractionPayload::SelectPoint(name.to_string()));
        }
        if let Some(key) = data.strip_prefix(REPORT_PREFIX) {
            return (!key.is_empty()).then(|| InteractionPayload::SelectReminder(key.to_string()));
        }
        None
    }
}

/// Content of one inbound chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundContent {
    /// Transport message id, used for idempotent buffering
    pub message_id: i64,
    pub sender: Sender,
    /// Message text or media caption
    pub text: Option<String>,
    /// Largest photo variant only
    pub photo: Option<String>,
    pub video: Option<String>,
    /// Album id when the message is part of a media group
    pub media_group_id: Option<String>,
}

impl InboundContent {
    /// Plain text message
    pub fn text(message_id: i64, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            message_id,
            sender,
            text: Some(text.into()),
            photo: None,
            video: None,
            media_group_id: None,
        }
    }

    /// Photo message with optional caption
    pub fn photo(message_id: i64, sender: Sender, file_id: impl Into<String>) -> Self {
        Self {
            message_id,
            sender,
            text: None,
            photo: Some(file_id.into()),
            video: None,
            media_group_id: None,
        }
    }

    /// Trimmed, non-empty text if any
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn has_media(&self) -> bool {
        self.photo.is_some() || self.video.is_some()
    }
}

/// Event delivered by the transport to the report lifecycle
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Command {
        chat: ChatId,
        command: Command,
    },
    Content {
        chat: ChatId,
        content: InboundContent,
    },
    Interaction {
        chat: ChatId,
        interaction_id: String,
        payload: InteractionPayload,
    },
}

impl InboundEvent {
    pub fn chat(&self) -> ChatId {
        match self {
            InboundEvent::Command { chat, .. }
            | InboundEvent::Content { chat, .. }
            | InboundEvent::Interaction { chat, .. } => *chat,
        }
    }
}

/// One inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub payload: InteractionPayload,
}

/// Keyboard attached to an outbound text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Reply keyboard: each entry is a row of button labels
    Reply {
        rows: Vec<Vec<String>>,
        one_time: bool,
    },
    /// Inline keyboard: each entry is a row of buttons
    Inline(Vec<Vec<InlineButton>>),
    /// Hide any reply keyboard currently shown
    Remove,
}

impl Keyboard {
    /// Persistent single-button keyboard
    pub fn single(label: &str) -> Self {
        Keyboard::Reply {
            rows: vec![vec![label.to_string()]],
            one_time: false,
        }
    }

    /// `/start` keyboard shown when no shift is active
    pub fn start() -> Self {
        Self::single("/start")
    }

    /// `/end` keyboard shown during a shift
    pub fn end() -> Self {
        Self::single("/end")
    }

    /// Inline "finish report" button
    pub fn finish_report() -> Self {
        Keyboard::Inline(vec![vec![InlineButton {
            text: "✅ Finish report".to_string(),
            payload: InteractionPayload::FinishReport,
        }]])
    }

    /// One-time reply keyboard with one option per row
    pub fn choices<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Keyboard::Reply {
            rows: labels.into_iter().map(|l| vec![l.into()]).collect(),
            one_time: true,
        }
    }
}

/// Media reference kept in a report
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaRef {
    Photo(String),
    Video(String),
}

impl MediaRef {
    pub fn file_id(&self) -> &str {
        match self {
            MediaRef::Photo(id) | MediaRef::Video(id) => id,
        }
    }
}
