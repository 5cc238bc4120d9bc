//! Session janitor: periodic expiry of stale shifts and runaway backlogs

use crate::notify::NotificationDebouncer;
use crate::scheduler::ReminderScheduler;
use crate::services::logging::log_error;
use crate::services::Roster;
use crate::session::{end_shift, EndReason, SessionStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub over_cap: usize,
    /// Pending reminders across surviving sessions
    pub total_pending: usize,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SweepReport {
    pub fn terminated(&self) -> usize {
        self.expired + self.over_cap
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    Backlog,
    Stale,
}

pub struct SessionJanitor {
    sessions: Arc<SessionStore>,
    scheduler: Arc<ReminderScheduler>,
    debouncer: Arc<NotificationDebouncer>,
    roster: Arc<dyn Roster>,
    shift_expiry: chrono::Duration,
    pending_cap: usize,
    last_report: RwLock<Option<SweepReport>>,
}

impl SessionJanitor {
    pub fn new(
        sessions: Arc<SessionStore>,
        scheduler: Arc<ReminderScheduler>,
        debouncer: Arc<NotificationDebouncer>,
        roster: Arc<dyn Roster>,
        shift_expiry: chrono::Duration,
        pending_cap: usize,
    ) -> Self {
        Self {
            sessions,
            scheduler,
            debouncer,
            roster,
            shift_expiry,
            pending_cap,
            last_report: RwLock::new(None),
        }
    }

    /// End sessions whose pending queue reached the cap and forget those users
    pub async fn sweep_backlog(&self) -> SweepReport {
        self.sweep(&[Check::Backlog]).await
    }

    /// End shifts older than the maximum shift duration
    pub async fn sweep_stale(&self) -> SweepReport {
        self.sweep(&[Check::Stale]).await
    }

    /// Both sweeps in one pass
    pub async fn run_once(&self) -> SweepReport {
        self.sweep(&[Check::Backlog, Check::Stale]).await
    }

    /// Most recent sweep, if any ran
    pub async fn last_report(&self) -> Option<SweepReport> {
        self.last_report.read().await.clone()
    }

    /// Sweep on startup and then every `interval`
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }

    async fn sweep(&self, checks: &[Check]) -> SweepReport {
        let now = Utc::now();
        let mut report = SweepReport::default();

        for (chat, handle) in self.sessions.handles() {
            let mut session = handle.lock().await;
            report.scanned += 1;
            let pending = session.pending().len();

            if checks.contains(&Check::Backlog) && pending >= self.pending_cap {
                tracing::warn!(
                    chat_id = chat.0,
                    pending = pending,
                    cap = self.pending_cap,
                    "Pending cap reached, ending shift"
                );
                self.scheduler.unschedule(chat);
                end_shift(&mut session, &self.debouncer, EndReason::BacklogCap).await;
                if let Err(e) = self.roster.forget(chat).await {
                    log_error(&e.to_string(), Some("roster forget"));
                }
                report.over_cap += 1;
                continue;
            }

            if checks.contains(&Check::Stale) && session.is_stale(now, self.shift_expiry) {
                self.scheduler.unschedule(chat);
                end_shift(&mut session, &self.debouncer, EndReason::ShiftExpired).await;
                report.expired += 1;
                continue;
            }

            report.total_pending += pending;
        }

        report.finished_at = Some(Utc::now());
        if report.terminated() == 0 {
            tracing::info!(
                scanned = report.scanned,
                total_pending = report.total_pending,
                "Janitor sweep: nothing to do"
            );
        } else {
            tracing::info!(
                scanned = report.scanned,
                expired = report.expired,
                over_cap = report.over_cap,
                total_pending = report.total_pending,
                "Janitor sweep ended shifts"
            );
        }
        *self.last_report.write().await = Some(report.clone());
        report
    }
}
