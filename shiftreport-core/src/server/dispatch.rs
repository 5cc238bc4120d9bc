//! Per-chat event dispatch.
//!
//! Each chat gets a mailbox drained by its own worker task, so one user's events are
//! handled strictly in arrival order while different users proceed independently.
//! A worker that sits idle retires and drops its mailbox; the next event respawns it.

use crate::lifecycle::ReportLifecycle;
use crate::models::{ChatId, InboundEvent};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long a chat worker waits for its next event before retiring
pub const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

type Mailboxes = DashMap<ChatId, mpsc::UnboundedSender<InboundEvent>>;

pub struct EventDispatcher {
    lifecycle: Arc<ReportLifecycle>,
    mailboxes: Arc<Mailboxes>,
    idle_timeout: Duration,
}

impl EventDispatcher {
    pub fn new(lifecycle: Arc<ReportLifecycle>) -> Self {
        Self::with_idle_timeout(lifecycle, WORKER_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(lifecycle: Arc<ReportLifecycle>, idle_timeout: Duration) -> Self {
        Self {
            lifecycle,
            mailboxes: Arc::new(DashMap::new()),
            idle_timeout,
        }
    }

    /// Queue an event behind earlier events of the same chat
    pub fn dispatch(&self, event: InboundEvent) {
        let chat = event.chat();
        // The entry guard is held across `send`, which a retiring worker relies on
        let mut mailbox = self
            .mailboxes
            .entry(chat)
            .or_insert_with(|| self.spawn_worker(chat));
        if let Err(mpsc::error::SendError(event)) = mailbox.send(event) {
            // Worker is gone; replace it and retry once
            tracing::warn!(chat_id = chat.0, "Chat worker stopped, restarting");
            *mailbox = self.spawn_worker(chat);
            if mailbox.send(event).is_err() {
                tracing::error!(chat_id = chat.0, "Dropped event for chat");
            }
        }
    }

    /// Number of live chat workers
    pub fn worker_count(&self) -> usize {
        self.mailboxes.len()
    }

    fn spawn_worker(&self, chat: ChatId) -> mpsc::UnboundedSender<InboundEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel::<InboundEvent>();
        let lifecycle = Arc::clone(&self.lifecycle);
        let mailboxes = Arc::clone(&self.mailboxes);
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            loop {
                match tokio::time::timeout(idle_timeout, rx.recv()).await {
                    Ok(Some(event)) => lifecycle.handle_event(event).await,
                    Ok(None) => break,
                    Err(_) => {
                        // Senders push under the shard lock, so an empty queue here stays empty
                        if mailboxes.remove_if(&chat, |_, _| rx.is_empty()).is_some() {
                            tracing::debug!(chat_id = chat.0, "Chat worker retired while idle");
                            break;
                        }
                    }
                }
            }
            tracing::debug!(chat_id = chat.0, "Chat worker finished");
        });
        tx
    }
}
