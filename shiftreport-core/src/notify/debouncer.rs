//! Notification debouncer.
//!
//! Collapses bursts of enqueued reminders into a single prompt per user. While a report
//! is open nothing is sent; the queue is offered again once that report is finished.

use crate::models::{
    ChatId, InlineButton, InteractionPayload, Keyboard, MessageRef, ReminderCatalog, UserSession,
};
use crate::notify::{prompt, TimerSlots};
use crate::server::providers::ChatTransport;
use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;

pub struct NotificationDebouncer {
    sessions: Arc<SessionStore>,
    catalog: Arc<ReminderCatalog>,
    transport: Arc<dyn ChatTransport>,
    slots: Arc<TimerSlots>,
    delay: Duration,
}

impl NotificationDebouncer {
    pub fn new(
        sessions: Arc<SessionStore>,
        catalog: Arc<ReminderCatalog>,
        transport: Arc<dyn ChatTransport>,
        delay: Duration,
    ) -> Self {
        Self {
            sessions,
            catalog,
            transport,
            slots: Arc::new(TimerSlots::new()),
            delay,
        }
    }

    /// Called whenever the pending queue may have grown.
    ///
    /// Takes the locked session so the decision and the timer swap happen atomically
    /// with respect to other handlers of the same user.
    pub fn notify(self: &Arc<Self>, session: &UserSession) {
        let chat = session.chat_id;
        if let Some(active) = session.active_reminder() {
            tracing::debug!(
                chat_id = chat.0,
                active = active,
                pending = session.pending().len(),
                "Report open, prompt deferred"
            );
            return;
        }
        let this = Arc::clone(self);
        self.slots.arm(chat, self.delay, async move {
            this.flush(chat).await;
        });
    }

    /// Cancel any in-flight flush for this chat
    pub fn cancel(&self, chat: ChatId) -> bool {
        self.slots.cancel(chat)
    }

    pub fn is_armed(&self, chat: ChatId) -> bool {
        self.slots.is_armed(chat)
    }

    /// Timer callback: re-read the session and present whatever is outstanding now
    pub async fn flush(&self, chat: ChatId) {
        let Some(handle) = self.sessions.get(chat) else {
            return;
        };
        let mut session = handle.lock().await;
        if !session.verified {
            tracing::debug!(chat_id = chat.0, "Flush skipped, session no longer verified");
            return;
        }
        self.present_pending(&mut session).await;
    }

    /// Present the pending queue: a direct prompt for one reminder, a list for several.
    ///
    /// Replaces the previously shown list prompt. No-op while a report is open.
    pub async fn present_pending(&self, session: &mut UserSession) {
        let chat = session.chat_id;
        self.slots.cancel(chat);
        if session.active_reminder().is_some() {
            return;
        }
        if let Some(previous) = session.last_prompt.take() {
            self.discard_prompt(chat, previous).await;
        }

        let pending = session.pending().to_vec();
        match pending.as_slice() {
            [] => session.offer(None),
            [key] => {
                let text = prompt::single_reminder(self.catalog.display_name(key));
                if self.send_notice(chat, &text, None).await.is_some() {
                    session.offer(Some(key.as_str()));
                }
                tracing::info!(chat_id = chat.0, reminder = %key, "Offered single reminder");
            }
            keys => {
                let buttons = keys
                    .iter()
                    .map(|key| {
                        vec![InlineButton {
                            text: self.catalog.display_name(key).to_string(),
                            payload: InteractionPayload::SelectReminder(key.clone()),
                        }]
                    })
                    .collect();
                session.offer(None);
                session.last_prompt = self
                    .send_notice(
                        chat,
                        &prompt::pending_list(keys.len()),
                        Some(Keyboard::Inline(buttons)),
                    )
                    .await;
                tracing::info!(chat_id = chat.0, pending = keys.len(), "Offered reminder list");
            }
        }
    }

    /// Send a text, logging (not propagating) delivery failures
    pub async fn send_notice(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Option<MessageRef> {
        match self.transport.send_text(chat, text, keyboard).await {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(
                    chat_id = chat.0,
                    transport = self.transport.name(),
                    error = %e,
                    "Failed to deliver message"
                );
                None
            }
        }
    }

    /// Delete a superseded prompt; failures are only logged
    pub async fn discard_prompt(&self, chat: ChatId, message: MessageRef) {
        if let Err(e) = self.transport.delete_message(chat, message).await {
            tracing::debug!(chat_id = chat.0, message_id = message.0, error = %e, "Prompt not deleted");
        }
    }
}
