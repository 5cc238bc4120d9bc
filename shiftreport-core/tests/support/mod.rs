//! Shared harness: a full runtime wired to a recording transport and an in-memory roster

#![allow(dead_code)]

use shiftreport_core::models::{
    ChatId, Command, Configuration, InboundContent, InboundEvent, InteractionPayload, Sender,
    UserSession,
};
use shiftreport_core::server::providers::{ChatTransport, RecordingTransport};
use shiftreport_core::server::ShiftRuntime;
use shiftreport_core::services::{MemoryRoster, Roster};
use std::sync::Arc;
use std::time::Duration;

pub const SUPERVISORY: ChatId = ChatId(-1000);

/// Reminders fire on Feb 29 only, so nothing is scheduled to go off during a test
pub const CONFIG: &str = r#"
[telegram]
supervisory_chat_id = -1000

[timing]
debounce_millis = 1000
shift_expiry_hours = 16
pending_cap = 20

[timezones]
KZ = "Asia/Almaty"

[[points]]
name = "A"
password = "secret"
timezone = "KZ"
point_type = "store"

[[points]]
name = "B"
password = "hunter2"
timezone = "Europe/Moscow"
point_type = "warehouse"

[[reminders]]
key = "r1"
name = "R1"
cron = "0 3 29 2 *"

[[reminders]]
key = "r2"
name = "R2"
cron = "0 3 29 2 *"

[[reminders]]
key = "stock"
name = "Stock"
cron = "0 3 29 2 *"
point_type = "warehouse"
"#;

pub struct Harness {
    pub runtime: Arc<ShiftRuntime>,
    pub transport: Arc<RecordingTransport>,
    pub roster: Arc<MemoryRoster>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CONFIG)
    }

    pub fn with_config(toml: &str) -> Self {
        let config = Configuration::from_toml_str(toml).expect("test config parses");
        let transport = Arc::new(RecordingTransport::new());
        let roster = Arc::new(MemoryRoster::new());
        let runtime = ShiftRuntime::build(
            &config,
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
            Arc::clone(&roster) as Arc<dyn Roster>,
        )
        .expect("runtime builds");
        Self {
            runtime: Arc::new(runtime),
            transport,
            roster,
        }
    }

    pub async fn handle(&self, event: InboundEvent) {
        self.runtime.lifecycle.handle_event(event).await;
    }

    pub async fn start(&self, chat: ChatId) {
        self.handle(InboundEvent::Command {
            chat,
            command: Command::Start,
        })
        .await;
    }

    pub async fn end(&self, chat: ChatId) {
        self.handle(InboundEvent::Command {
            chat,
            command: Command::End,
        })
        .await;
    }

    /// Text from the chat owner, named "Ann"
    pub async fn text(&self, chat: ChatId, message_id: i64, text: &str) {
        self.text_from(chat, Sender::new(chat.0, "Ann"), message_id, text)
            .await;
    }

    pub async fn text_from(&self, chat: ChatId, sender: Sender, message_id: i64, text: &str) {
        self.handle(InboundEvent::Content {
            chat,
            content: InboundContent::text(message_id, sender, text),
        })
        .await;
    }

    pub async fn photo(&self, chat: ChatId, message_id: i64, file_id: &str, album: Option<&str>) {
        let mut content = InboundContent::photo(message_id, Sender::new(chat.0, "Ann"), file_id);
        content.media_group_id = album.map(str::to_string);
        self.handle(InboundEvent::Content { chat, content }).await;
    }

    pub async fn press(&self, chat: ChatId, payload: InteractionPayload) {
        self.handle(InboundEvent::Interaction {
            chat,
            interaction_id: format!("cb-{}", chat.0),
            payload,
        })
        .await;
    }

    /// /start, choose the point from the reply keyboard, send the password
    pub async fn login(&self, chat: ChatId, point: &str, password: &str) {
        self.start(chat).await;
        self.text(chat, 1, point).await;
        self.text(chat, 2, password).await;
    }

    pub async fn session(&self, chat: ChatId) -> UserSession {
        let handle = self
            .runtime
            .sessions
            .get(chat)
            .expect("session exists");
        let session = handle.lock().await;
        session.clone()
    }

    pub fn last_text(&self, chat: ChatId) -> String {
        self.transport.last_text_to(chat).unwrap_or_default()
    }
}

/// Poll until `condition` holds, letting spawned tasks run in between
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// A config with `count` reminders that all apply to point "A"
pub fn config_with_reminders(count: usize, pending_cap: usize) -> String {
    let mut toml = format!(
        r#"
[telegram]
supervisory_chat_id = -1000

[timing]
pending_cap = {}

[[points]]
name = "A"
password = "secret"
timezone = "UTC"
point_type = "store"
"#,
        pending_cap
    );
    for i in 0..count {
        toml.push_str(&format!(
            "\n[[reminders]]\nkey = \"k{}\"\nname = \"K{}\"\ncron = \"0 3 29 2 *\"\n",
            i, i
        ));
    }
    toml
}
