//! Report lifecycle state machine.
//!
//! Every handler locks the user's session for its whole run. Session mutation happens
//! synchronously under that lock; the only suspension points are transport calls.

use crate::lifecycle::{SubmissionError, SubmissionPipeline};
use crate::models::{
    AuthStep, ChatId, Command, InboundContent, InboundEvent, InteractionPayload, Keyboard,
    PointRegistry, ReminderCatalog, UserSession,
};
use crate::notify::{prompt, NotificationDebouncer};
use crate::scheduler::ReminderScheduler;
use crate::services::logging::{log_error, log_security_event, log_session_event};
use crate::services::Roster;
use crate::server::providers::ChatTransport;
use crate::session::{end_shift, EndReason, SessionHandle, SessionStore};
use chrono::Utc;
use std::sync::Arc;

pub struct ReportLifecycle {
    points: Arc<PointRegistry>,
    catalog: Arc<ReminderCatalog>,
    sessions: Arc<SessionStore>,
    scheduler: Arc<ReminderScheduler>,
    debouncer: Arc<NotificationDebouncer>,
    submission: SubmissionPipeline,
    transport: Arc<dyn ChatTransport>,
    roster: Arc<dyn Roster>,
}

impl ReportLifecycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        points: Arc<PointRegistry>,
        catalog: Arc<ReminderCatalog>,
        sessions: Arc<SessionStore>,
        scheduler: Arc<ReminderScheduler>,
        debouncer: Arc<NotificationDebouncer>,
        submission: SubmissionPipeline,
        transport: Arc<dyn ChatTransport>,
        roster: Arc<dyn Roster>,
    ) -> Self {
        Self {
            points,
            catalog,
            sessions,
            scheduler,
            debouncer,
            submission,
            transport,
            roster,
        }
    }

    /// Route one inbound event
    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::Command {
                chat,
                command: Command::Start,
            } => self.on_auth_command(chat).await,
            InboundEvent::Command {
                chat,
                command: Command::End,
            } => self.on_reset_command(chat).await,
            InboundEvent::Content { chat, content } => self.on_inbound_content(chat, content).await,
            InboundEvent::Interaction {
                chat,
                interaction_id,
                payload,
            } => {
                if let Err(e) = self
                    .transport
                    .acknowledge_interaction(&interaction_id, None)
                    .await
                {
                    tracing::debug!(chat_id = chat.0, error = %e, "Interaction not acknowledged");
                }
                self.on_interaction(chat, payload).await
            }
        }
    }

    /// `/start`: (re)enter point selection. An existing shift is ended silently first.
    pub async fn on_auth_command(&self, chat: ChatId) {
        let handle = self.sessions.get_or_create(chat);
        let mut session = handle.lock().await;
        if session.verified || session.auth_step != AuthStep::AwaitingPoint {
            self.scheduler.unschedule(chat);
            end_shift(&mut session, &self.debouncer, EndReason::Restart).await;
        }
        log_session_event("auth_started", chat, "awaiting point");
        self.prompt_points(chat, prompt::CHOOSE_POINT).await;
    }

    /// `/end`: terminate the shift, or tell the user no shift is active
    pub async fn on_reset_command(&self, chat: ChatId) {
        let Some(handle) = self.sessions.get(chat) else {
            self.debouncer
                .send_notice(chat, prompt::NO_ACTIVE_SHIFT, Some(Keyboard::start()))
                .await;
            return;
        };
        let mut session = handle.lock().await;
        if !session.verified {
            self.debouncer
                .send_notice(chat, prompt::NO_ACTIVE_SHIFT, Some(Keyboard::start()))
                .await;
            return;
        }
        self.scheduler.unschedule(chat);
        end_shift(&mut session, &self.debouncer, EndReason::UserRequest).await;
    }

    /// Free text, captions, photos and videos
    pub async fn on_inbound_content(&self, chat: ChatId, content: InboundContent) {
        let Some(handle) = self.sessions.get(chat) else {
            self.debouncer
                .send_notice(chat, prompt::PRESS_START, Some(Keyboard::start()))
                .await;
            return;
        };
        let mut session = handle.lock().await;
        match session.auth_step {
            AuthStep::AwaitingPoint => match content.trimmed_text() {
                // Point names arrive as text from the reply keyboard
                Some(name) => self.select_point(&mut session, name).await,
                None => self.prompt_points(chat, prompt::CHOOSE_POINT).await,
            },
            AuthStep::AwaitingPassword => {
                // Compared byte for byte, surrounding whitespace included
                match content.text.as_deref().filter(|t| !t.is_empty()) {
                    Some(candidate) => self.check_password(&mut session, candidate).await,
                    None => {
                        self.debouncer
                            .send_notice(chat, prompt::ENTER_PASSWORD_AGAIN, None)
                            .await;
                    }
                }
            }
            AuthStep::Idle => self.on_idle_content(&mut session, &content).await,
            AuthStep::ReportOpen => self.collect(&mut session, &content).await,
        }
    }

    /// Button presses
    pub async fn on_interaction(&self, chat: ChatId, payload: InteractionPayload) {
        match payload {
            InteractionPayload::SelectPoint(name) => {
                let handle = self.sessions.get_or_create(chat);
                let mut session = handle.lock().await;
                if session.verified {
                    self.debouncer
                        .send_notice(chat, prompt::ALREADY_ON_SHIFT, None)
                        .await;
                    return;
                }
                self.select_point(&mut session, &name).await;
            }
            InteractionPayload::SelectReminder(key) => {
                let Some(handle) = self.existing_session(chat).await else {
                    return;
                };
                let mut session = handle.lock().await;
                if !session.verified {
                    self.notify_no_shift(chat).await;
                    return;
                }
                self.select_reminder(&mut session, &key).await;
            }
            InteractionPayload::FinishReport => {
                let Some(handle) = self.existing_session(chat).await else {
                    return;
                };
                let mut session = handle.lock().await;
                if !session.verified {
                    self.notify_no_shift(chat).await;
                    return;
                }
                self.finish_report(&mut session).await;
            }
        }
    }

    /// Existing session, telling the user to /start when there is none
    async fn existing_session(&self, chat: ChatId) -> Option<SessionHandle> {
        let handle = self.sessions.get(chat);
        if handle.is_none() {
            self.notify_no_shift(chat).await;
        }
        handle
    }

    async fn notify_no_shift(&self, chat: ChatId) {
        self.debouncer
            .send_notice(chat, prompt::NO_ACTIVE_SHIFT, Some(Keyboard::start()))
            .await;
    }

    async fn prompt_points(&self, chat: ChatId, text: &str) {
        self.debouncer
            .send_notice(chat, text, Some(Keyboard::choices(self.points.names())))
            .await;
    }

    async fn select_point(&self, session: &mut UserSession, name: &str) {
        let chat = session.chat_id;
        if self.points.get(name).is_none() {
            log_security_event("unknown_point", chat, &format!("point={}", name));
            self.prompt_points(chat, prompt::UNKNOWN_POINT).await;
            return;
        }
        session.select_point(name);
        log_session_event("point_selected", chat, &format!("point={}", name));
        self.debouncer
            .send_notice(chat, &prompt::enter_password(name), Some(Keyboard::Remove))
            .await;
    }

    async fn check_password(&self, session: &mut UserSession, candidate: &str) {
        let chat = session.chat_id;
        let Some(point) = session.point.as_deref().and_then(|name| self.points.get(name)) else {
            // Selected point vanished from the registry; start over
            session.terminate();
            self.prompt_points(chat, prompt::CHOOSE_POINT).await;
            return;
        };

        if !point.verify_password(candidate) {
            log_security_event("wrong_password", chat, &format!("point={}", point.name));
            self.debouncer
                .send_notice(chat, prompt::WRONG_PASSWORD, None)
                .await;
            return;
        }

        session.verify(Utc::now());
        log_session_event("shift_started", chat, &format!("point={}", point.name));
        if let Err(e) = self.roster.remember(chat).await {
            log_error(&e.to_string(), Some("roster remember"));
        }
        self.debouncer
            .send_notice(chat, &prompt::shift_started(&point.name), Some(Keyboard::end()))
            .await;
        self.scheduler.schedule(chat, &point.name);
    }

    async fn on_idle_content(&self, session: &mut UserSession, content: &InboundContent) {
        let chat = session.chat_id;
        if let Some(offered) = session.offered_reminder().map(str::to_string) {
            if self.open_report(session, &offered).await {
                self.collect(session, content).await;
            }
            return;
        }
        if session.pending().is_empty() {
            self.debouncer
                .send_notice(chat, prompt::NOTHING_PENDING, None)
                .await;
        } else {
            self.debouncer
                .send_notice(chat, prompt::CHOOSE_FROM_LIST, None)
                .await;
            self.debouncer.present_pending(session).await;
        }
    }

    async fn select_reminder(&self, session: &mut UserSession, key: &str) {
        let chat = session.chat_id;
        match session.active_reminder() {
            Some(active) if active == key => {
                let name = self.catalog.display_name(key).to_string();
                self.debouncer
                    .send_notice(chat, &prompt::report_opened(&name), Some(Keyboard::finish_report()))
                    .await;
                return;
            }
            Some(_) => {
                self.debouncer
                    .send_notice(chat, prompt::FINISH_CURRENT_FIRST, None)
                    .await;
                return;
            }
            None => {}
        }
        if !session.pending().iter().any(|k| k == key) {
            tracing::debug!(chat_id = chat.0, reminder = key, "Stale reminder selection");
            self.debouncer
                .send_notice(chat, prompt::STALE_REMINDER, None)
                .await;
            return;
        }
        if self.open_report(session, key).await {
            let name = self.catalog.display_name(key).to_string();
            self.debouncer
                .send_notice(chat, &prompt::report_opened(&name), None)
                .await;
        }
    }

    /// Move a pending reminder into the active slot and drop the list prompt
    async fn open_report(&self, session: &mut UserSession, key: &str) -> bool {
        let chat = session.chat_id;
        if !session.open(key) {
            return false;
        }
        self.debouncer.cancel(chat);
        if let Some(previous) = session.last_prompt.take() {
            self.debouncer.discard_prompt(chat, previous).await;
        }
        log_session_event("report_opened", chat, &format!("reminder={}", key));
        true
    }

    /// Buffer content for the open report and acknowledge it once (once per album)
    async fn collect(&self, session: &mut UserSession, content: &InboundContent) {
        let chat = session.chat_id;
        if !session.append(content) {
            tracing::debug!(
                chat_id = chat.0,
                message_id = content.message_id,
                "Content ignored (duplicate or empty)"
            );
            return;
        }
        if let Some(group) = &content.media_group_id {
            if session.last_ack_group.as_ref() == Some(group) {
                return;
            }
        }
        session.last_ack_group = content.media_group_id.clone();

        let name = session
            .active_reminder()
            .map(|key| self.catalog.display_name(key).to_string())
            .unwrap_or_default();
        self.debouncer
            .send_notice(chat, &prompt::content_added(&name), Some(Keyboard::finish_report()))
            .await;
    }

    async fn finish_report(&self, session: &mut UserSession) {
        let chat = session.chat_id;
        let Some(key) = session.active_reminder().map(str::to_string) else {
            self.debouncer
                .send_notice(chat, prompt::NO_OPEN_REPORT, None)
                .await;
            return;
        };
        let name = self.catalog.display_name(&key).to_string();
        let title = format!(
            "{} @ {}",
            name,
            session.point.as_deref().unwrap_or_default()
        );

        let Some(buffer) = session.buffer_mut() else {
            return;
        };
        match self.submission.submit(&title, buffer).await {
            Ok(receipt) => {
                session.close_report();
                log_session_event(
                    "report_submitted",
                    chat,
                    &format!(
                        "reminder={} contributors={} media_sent={} media_failed={}",
                        key, receipt.contributors, receipt.media_sent, receipt.media_failed
                    ),
                );
                if !receipt.is_complete() {
                    self.debouncer
                        .send_notice(chat, prompt::MEDIA_INCOMPLETE, None)
                        .await;
                }
                self.debouncer
                    .send_notice(chat, &prompt::report_submitted(&name), Some(Keyboard::end()))
                    .await;
                // Offer whatever queued up while the report was open
                self.debouncer.present_pending(session).await;
            }
            Err(SubmissionError::Empty) => {
                self.debouncer
                    .send_notice(chat, prompt::EMPTY_REPORT, None)
                    .await;
            }
            Err(e) => {
                log_error(&e.to_string(), Some("report submission"));
                self.debouncer
                    .send_notice(chat, prompt::SUBMISSION_FAILED, Some(Keyboard::finish_report()))
                    .await;
            }
        }
    }
}
