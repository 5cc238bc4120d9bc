//! Shared shift termination used by `/end`, restarts, the scheduler and the janitor

use crate::models::{Keyboard, UserSession};
use crate::notify::{prompt, NotificationDebouncer};
use crate::services::logging::log_session_event;

/// Why a shift is being ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// `/end` from the user
    UserRequest,
    /// `/start` while a session exists
    Restart,
    /// Shift exceeded its maximum duration
    ShiftExpired,
    /// Pending queue hit the configured cap
    BacklogCap,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::UserRequest => "user_request",
            EndReason::Restart => "restart",
            EndReason::ShiftExpired => "shift_expired",
            EndReason::BacklogCap => "backlog_cap",
        }
    }

    fn notice(&self) -> Option<&'static str> {
        match self {
            EndReason::UserRequest => Some(prompt::SHIFT_ENDED),
            EndReason::Restart => None,
            EndReason::ShiftExpired => Some(prompt::SHIFT_EXPIRED),
            EndReason::BacklogCap => Some(prompt::BACKLOG_CAP),
        }
    }
}

/// Reset a session to `AwaitingPoint`.
///
/// Cancels the user's debounce timer, clears queue and buffer, removes the last
/// reminder prompt and tells the user (except on restart). Triggers are not touched
/// here; callers unschedule them.
pub async fn end_shift(
    session: &mut UserSession,
    debouncer: &NotificationDebouncer,
    reason: EndReason,
) {
    let chat = session.chat_id;
    debouncer.cancel(chat);

    let dropped = session.pending().len();
    let had_report = session.active_reminder().is_some();
    let point = session.point.clone();
    if let Some(prompt_ref) = session.terminate() {
        debouncer.discard_prompt(chat, prompt_ref).await;
    }

    log_session_event(
        "shift_ended",
        chat,
        &format!(
            "reason={} point={} dropped_pending={} open_report={}",
            reason.as_str(),
            point.as_deref().unwrap_or("-"),
            dropped,
            had_report
        ),
    );

    if let Some(text) = reason.notice() {
        debouncer
            .send_notice(chat, text, Some(Keyboard::start()))
            .await;
    }
}
