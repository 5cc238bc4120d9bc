//! Per-user session state

use crate::models::{ChatId, InboundContent, MessageRef, ReportBuffer};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Authentication / report step of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStep {
    AwaitingPoint,
    AwaitingPassword,
    Idle,
    ReportOpen,
}

/// State of one user's shift.
///
/// The pending queue, the active reminder and the report buffer are private so the
/// queue/active/buffer invariants can only change through the methods below.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub chat_id: ChatId,
    pub auth_step: AuthStep,
    /// Selected point name
    pub point: Option<String>,
    pub verified: bool,
    /// Most recent reminder prompt, deleted when replaced
    pub last_prompt: Option<MessageRef>,
    /// Set when the shift was verified
    pub started_at: Option<DateTime<Utc>>,
    /// Album id of the last acknowledged content message
    pub last_ack_group: Option<String>,
    pending: Vec<String>,
    active: Option<String>,
    offered: Option<String>,
    buffer: ReportBuffer,
}

impl UserSession {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            auth_step: AuthStep::AwaitingPoint,
            point: None,
            verified: false,
            last_prompt: None,
            started_at: None,
            last_ack_group: None,
            pending: Vec::new(),
            active: None,
            offered: None,
            buffer: ReportBuffer::new(),
        }
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn active_reminder(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Reminder presented as a direct prompt, still pending
    pub fn offered_reminder(&self) -> Option<&str> {
        self.offered.as_deref()
    }

    pub fn buffer(&self) -> &ReportBuffer {
        &self.buffer
    }

    /// Append a reminder to the pending queue.
    ///
    /// Returns false (and changes nothing) if the key is already queued or active.
    pub fn enqueue(&mut self, key: &str) -> bool {
        if self.active.as_deref() == Some(key) || self.pending.iter().any(|k| k == key) {
            return false;
        }
        self.pending.push(key.to_string());
        true
    }

    /// Mark a pending reminder as offered through a direct prompt
    pub fn offer(&mut self, key: Option<&str>) {
        self.offered = key
            .filter(|k| self.pending.iter().any(|p| p == *k))
            .map(str::to_string);
    }

    /// Move a pending reminder into the active slot with an empty buffer.
    ///
    /// Returns false if the key is not pending or another report is open.
    pub fn open(&mut self, key: &str) -> bool {
        if self.active.is_some() {
            return false;
        }
        let Some(index) = self.pending.iter().position(|k| k == key) else {
            return false;
        };
        let key = self.pending.remove(index);
        self.active = Some(key);
        self.offered = None;
        self.buffer.clear();
        self.last_ack_group = None;
        self.auth_step = AuthStep::ReportOpen;
        true
    }

    /// Add content to the open report. Returns false when nothing was applied.
    pub fn append(&mut self, content: &InboundContent) -> bool {
        if self.active.is_none() {
            return false;
        }
        self.buffer.apply(content)
    }

    pub fn buffer_mut(&mut self) -> Option<&mut ReportBuffer> {
        self.active.as_ref().map(|_| &mut self.buffer)
    }

    /// Close the open report after a successful submission
    pub fn close_report(&mut self) -> Option<String> {
        let closed = self.active.take();
        self.buffer.clear();
        self.last_ack_group = None;
        if self.verified {
            self.auth_step = AuthStep::Idle;
        }
        closed
    }

    /// Begin authentication at the given point
    pub fn select_point(&mut self, point: &str) {
        self.point = Some(point.to_string());
        self.auth_step = AuthStep::AwaitingPassword;
    }

    /// Accept the password: start a fresh shift
    pub fn verify(&mut self, now: DateTime<Utc>) {
        self.verified = true;
        self.started_at = Some(now);
        self.pending.clear();
        self.active = None;
        self.offered = None;
        self.buffer.clear();
        self.last_ack_group = None;
        self.auth_step = AuthStep::Idle;
    }

    /// Reset to the initial state. Returns the prompt that should be removed, if any.
    pub fn terminate(&mut self) -> Option<MessageRef> {
        self.verified = false;
        self.point = None;
        self.started_at = None;
        self.pending.clear();
        self.active = None;
        self.offered = None;
        self.buffer.clear();
        self.last_ack_group = None;
        self.auth_step = AuthStep::AwaitingPoint;
        self.last_prompt.take()
    }

    /// True when the shift started more than `max_age` ago
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.started_at
            .map(|started| now - started > max_age)
            .unwrap_or(false)
    }
}
