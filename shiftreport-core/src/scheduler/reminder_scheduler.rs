//! Reminder scheduler: recurring triggers per user, evaluated in the point's timezone

use crate::models::{
    ChatId, Point, PointRegistry, Recurrence, ReminderCatalog, ReminderDefinition, UserSession,
};
use crate::notify::NotificationDebouncer;
use crate::session::{end_shift, EndReason, SessionStore};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Unknown reminder: {0}")]
    UnknownReminder(String),

    #[error("Unknown point: {0}")]
    UnknownPoint(String),
}

/// Result of one trigger firing for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Reminder appended to the pending queue
    Enqueued,
    /// Reminder was already pending or active
    AlreadyQueued,
    /// Session missing, unverified or bound to another point
    Dropped,
    /// Shift was past its maximum duration and has been ended
    Expired,
}

/// Sessions targeted by a forced enqueue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "point")]
pub enum EnqueueFilter {
    AllVerified,
    Point(String),
}

/// Outcome of a forced enqueue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForceEnqueueReport {
    pub reminder: String,
    pub matched: usize,
    pub enqueued: usize,
    pub already_queued: usize,
    pub expired: usize,
}

/// A user's installed triggers: one timer loop over every applicable reminder, so
/// reminders due in the same minute fire in catalog order.
struct UserTriggers {
    point: String,
    reminders: Vec<String>,
    task: JoinHandle<()>,
}

pub struct ReminderScheduler {
    points: Arc<PointRegistry>,
    catalog: Arc<ReminderCatalog>,
    sessions: Arc<SessionStore>,
    debouncer: Arc<NotificationDebouncer>,
    shift_expiry: chrono::Duration,
    triggers: DashMap<ChatId, UserTriggers>,
}

impl ReminderScheduler {
    pub fn new(
        points: Arc<PointRegistry>,
        catalog: Arc<ReminderCatalog>,
        sessions: Arc<SessionStore>,
        debouncer: Arc<NotificationDebouncer>,
        shift_expiry: chrono::Duration,
    ) -> Self {
        Self {
            points,
            catalog,
            sessions,
            debouncer,
            shift_expiry,
            triggers: DashMap::new(),
        }
    }

    /// Install triggers for every reminder applying to the point.
    ///
    /// Idempotent for the same point: existing triggers are kept. Scheduling for a
    /// different point replaces the user's triggers. Returns the number of triggers
    /// installed by this call.
    pub fn schedule(self: &Arc<Self>, chat: ChatId, point_name: &str) -> usize {
        let Some(point) = self.points.get(point_name) else {
            tracing::warn!(chat_id = chat.0, point = point_name, "Cannot schedule: unknown point");
            return 0;
        };
        let reminders: Vec<&ReminderDefinition> =
            self.catalog.applicable_to(&point.point_type).collect();
        if reminders.is_empty() {
            self.unschedule(chat);
            tracing::warn!(
                chat_id = chat.0,
                point = %point.name,
                point_type = %point.point_type,
                "No reminders apply to this point"
            );
            return 0;
        }

        match self.triggers.entry(chat) {
            Entry::Occupied(entry) if entry.get().point == point.name => {
                tracing::debug!(
                    chat_id = chat.0,
                    point = %point.name,
                    "Triggers already installed"
                );
                return 0;
            }
            Entry::Occupied(mut entry) => {
                let replaced = entry.insert(UserTriggers {
                    point: point.name.clone(),
                    reminders: reminders.iter().map(|r| r.key.clone()).collect(),
                    task: self.spawn_trigger_loop(chat, point, &reminders),
                });
                tracing::info!(
                    chat_id = chat.0,
                    from = %replaced.point,
                    to = %point.name,
                    "Replacing triggers for new point"
                );
                replaced.task.abort();
            }
            Entry::Vacant(entry) => {
                entry.insert(UserTriggers {
                    point: point.name.clone(),
                    reminders: reminders.iter().map(|r| r.key.clone()).collect(),
                    task: self.spawn_trigger_loop(chat, point, &reminders),
                });
            }
        }

        tracing::info!(
            chat_id = chat.0,
            point = %point.name,
            installed = reminders.len(),
            "Reminder triggers scheduled"
        );
        reminders.len()
    }

    /// Cancel every trigger of a user
    pub fn unschedule(&self, chat: ChatId) -> usize {
        match self.triggers.remove(&chat) {
            Some((_, triggers)) => {
                triggers.task.abort();
                let count = triggers.reminders.len();
                tracing::debug!(chat_id = chat.0, cancelled = count, "Reminder triggers cancelled");
                count
            }
            None => 0,
        }
    }

    pub fn trigger_count(&self, chat: ChatId) -> usize {
        self.triggers
            .get(&chat)
            .map(|entry| entry.reminders.len())
            .unwrap_or(0)
    }

    /// Keys with installed triggers for a user, in catalog order
    pub fn scheduled_reminders(&self, chat: ChatId) -> Vec<String> {
        self.triggers
            .get(&chat)
            .map(|entry| entry.reminders.clone())
            .unwrap_or_default()
    }

    fn spawn_trigger_loop(
        self: &Arc<Self>,
        chat: ChatId,
        point: &Point,
        reminders: &[&ReminderDefinition],
    ) -> JoinHandle<()> {
        let scheduler: Weak<Self> = Arc::downgrade(self);
        let reminders: Vec<(String, Recurrence)> = reminders
            .iter()
            .map(|r| (r.key.clone(), r.recurrence.clone()))
            .collect();
        let point_name = point.name.clone();
        let tz = point.timezone;

        tokio::spawn(async move {
            let mut after = Utc::now();
            loop {
                let upcoming: Vec<_> = reminders
                    .iter()
                    .filter_map(|(key, recurrence)| {
                        recurrence.next_after(after, tz).map(|at| (at, key))
                    })
                    .collect();
                let Some(next) = upcoming.iter().map(|(at, _)| *at).min() else {
                    tracing::warn!(chat_id = chat.0, "No further reminder occurrences");
                    break;
                };
                // Long sleeps may be clamped by the timer wheel; never fire early
                loop {
                    let wait = (next - Utc::now()).to_std().unwrap_or_default();
                    if wait.is_zero() {
                        break;
                    }
                    tokio::time::sleep(wait).await;
                }
                after = next;

                let Some(scheduler) = scheduler.upgrade() else {
                    break;
                };
                for (_, key) in upcoming.iter().filter(|(at, _)| *at == next) {
                    if scheduler.fire(chat, key, &point_name).await == FireOutcome::Expired {
                        scheduler.unschedule(chat);
                        return;
                    }
                }
            }
        })
    }

    /// One trigger firing: enqueue into the user's session and notify the debouncer
    pub async fn fire(&self, chat: ChatId, key: &str, point: &str) -> FireOutcome {
        let Some(handle) = self.sessions.get(chat) else {
            return FireOutcome::Dropped;
        };
        let mut session = handle.lock().await;
        if !session.verified || session.point.as_deref() != Some(point) {
            tracing::debug!(chat_id = chat.0, reminder = key, "Firing dropped");
            return FireOutcome::Dropped;
        }
        self.enqueue_locked(&mut session, key).await
    }

    /// Enqueue a reminder into verified sessions, bypassing the schedule
    pub async fn force_enqueue(
        &self,
        key: &str,
        filter: &EnqueueFilter,
    ) -> Result<ForceEnqueueReport, SchedulerError> {
        if self.catalog.get(key).is_none() {
            return Err(SchedulerError::UnknownReminder(key.to_string()));
        }
        if let EnqueueFilter::Point(name) = filter {
            if self.points.get(name).is_none() {
                return Err(SchedulerError::UnknownPoint(name.clone()));
            }
        }

        let mut report = ForceEnqueueReport {
            reminder: key.to_string(),
            ..Default::default()
        };
        for (chat, handle) in self.sessions.handles() {
            let outcome = {
                let mut session = handle.lock().await;
                let matches = match filter {
                    EnqueueFilter::AllVerified => true,
                    EnqueueFilter::Point(name) => session.point.as_deref() == Some(name.as_str()),
                };
                if !session.verified || !matches {
                    continue;
                }
                report.matched += 1;
                self.enqueue_locked(&mut session, key).await
            };
            match outcome {
                FireOutcome::Enqueued => report.enqueued += 1,
                FireOutcome::AlreadyQueued => report.already_queued += 1,
                FireOutcome::Expired => {
                    self.unschedule(chat);
                    report.expired += 1;
                }
                FireOutcome::Dropped => {}
            }
        }

        tracing::info!(
            reminder = key,
            matched = report.matched,
            enqueued = report.enqueued,
            "Forced enqueue complete"
        );
        Ok(report)
    }

    async fn enqueue_locked(&self, session: &mut UserSession, key: &str) -> FireOutcome {
        if session.is_stale(Utc::now(), self.shift_expiry) {
            end_shift(session, &self.debouncer, EndReason::ShiftExpired).await;
            return FireOutcome::Expired;
        }
        let outcome = if session.enqueue(key) {
            tracing::info!(
                chat_id = session.chat_id.0,
                reminder = key,
                pending = session.pending().len(),
                "Reminder enqueued"
            );
            FireOutcome::Enqueued
        } else {
            FireOutcome::AlreadyQueued
        };
        self.debouncer.notify(session);
        outcome
    }
}
