//! In-memory session store keyed by chat.
//!
//! Each session sits behind its own async mutex. Handlers hold the lock for their whole
//! run, so two handlers never interleave on the same session. Clone the handle out of
//! the map before awaiting the lock; map guards are never held across an await.

use crate::models::{AuthStep, ChatId, UserSession};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared, lockable session record
pub type SessionHandle = Arc<Mutex<UserSession>>;

/// Point-in-time view of one session, for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub chat_id: ChatId,
    pub auth_step: AuthStep,
    pub point: Option<String>,
    pub verified: bool,
    pub pending: usize,
    pub active_reminder: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionSummary {
    fn of(session: &UserSession) -> Self {
        Self {
            chat_id: session.chat_id,
            auth_step: session.auth_step,
            point: session.point.clone(),
            verified: session.verified,
            pending: session.pending().len(),
            active_reminder: session.active_reminder().map(str::to_string),
            started_at: session.started_at,
        }
    }
}

/// The only shared mutable structure: chat id -> session
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<ChatId, SessionHandle>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chat: ChatId) -> Option<SessionHandle> {
        self.sessions.get(&chat).map(|entry| Arc::clone(entry.value()))
    }

    /// Existing session or a fresh one in `AwaitingPoint`
    pub fn get_or_create(&self, chat: ChatId) -> SessionHandle {
        let entry = self
            .sessions
            .entry(chat)
            .or_insert_with(|| Arc::new(Mutex::new(UserSession::new(chat))));
        Arc::clone(entry.value())
    }

    pub fn remove(&self, chat: ChatId) -> Option<SessionHandle> {
        self.sessions.remove(&chat).map(|(_, handle)| handle)
    }

    /// Snapshot of all handles, sorted by chat id
    pub fn handles(&self) -> Vec<(ChatId, SessionHandle)> {
        let mut handles: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        handles.sort_by_key(|(chat, _)| *chat);
        handles
    }

    /// Chats with a verified shift
    pub async fn verified_users(&self) -> Vec<ChatId> {
        let mut users = Vec::new();
        for (chat, handle) in self.handles() {
            if handle.lock().await.verified {
                users.push(chat);
            }
        }
        users
    }

    pub async fn summaries(&self) -> Vec<SessionSummary> {
        let mut summaries = Vec::new();
        for (_, handle) in self.handles() {
            summaries.push(SessionSummary::of(&*handle.lock().await));
        }
        summaries
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
