//! End-to-end report lifecycle through the runtime's public surface

mod support;

use shiftreport_core::models::{AuthStep, ChatId, InteractionPayload, Keyboard, MediaRef, Sender};
use shiftreport_core::notify::prompt;
use shiftreport_core::scheduler::FireOutcome;
use shiftreport_core::server::providers::SentItem;
use shiftreport_core::services::Roster;
use std::time::Duration;
use support::{Harness, SUPERVISORY};

const USER: ChatId = ChatId(42);

fn select(key: &str) -> InteractionPayload {
    InteractionPayload::SelectReminder(key.to_string())
}

#[tokio::test(start_paused = true)]
async fn test_two_reminders_one_list_then_submit_and_offer_next() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;
    assert_eq!(h.last_text(USER), prompt::shift_started("A"));

    let scheduler = &h.runtime.scheduler;
    assert_eq!(scheduler.fire(USER, "r1", "A").await, FireOutcome::Enqueued);
    assert_eq!(scheduler.fire(USER, "r2", "A").await, FireOutcome::Enqueued);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let lists: Vec<_> = h
        .transport
        .sent_to(USER)
        .into_iter()
        .filter_map(|item| match item {
            SentItem::Text {
                text,
                keyboard: Some(Keyboard::Inline(rows)),
                message,
                ..
            } if text == prompt::pending_list(2) => Some((rows, message)),
            _ => None,
        })
        .collect();
    assert_eq!(lists.len(), 1, "burst must produce exactly one prompt");
    let (rows, list_message) = &lists[0];
    let labels: Vec<_> = rows.iter().map(|row| row[0].text.as_str()).collect();
    assert_eq!(labels, vec!["R1", "R2"]);

    h.press(USER, select("r1")).await;
    assert_eq!(h.last_text(USER), prompt::report_opened("R1"));
    assert!(h.transport.sent_to(USER).contains(&SentItem::Deleted {
        chat: USER,
        message: *list_message,
    }));
    let session = h.session(USER).await;
    assert_eq!(session.active_reminder(), Some("r1"));
    assert_eq!(session.pending(), ["r2".to_string()]);

    h.text(USER, 10, "ok").await;
    h.photo(USER, 11, "photo-1", None).await;
    assert_eq!(h.last_text(USER), prompt::content_added("R1"));

    h.press(USER, InteractionPayload::FinishReport).await;

    let delivered = h.transport.sent_to(SUPERVISORY);
    assert_eq!(delivered.len(), 2);
    assert!(matches!(
        &delivered[0],
        SentItem::Text { text, .. } if text == "R1 @ A\nAnn: ok"
    ));
    assert!(matches!(
        &delivered[1],
        SentItem::Media { media: MediaRef::Photo(id), .. } if id == "photo-1"
    ));

    let texts = h.transport.texts_to(USER);
    let tail = &texts[texts.len() - 2..];
    assert_eq!(tail[0], prompt::report_submitted("R1"));
    assert_eq!(tail[1], prompt::single_reminder("R2"));

    let session = h.session(USER).await;
    assert_eq!(session.active_reminder(), None);
    assert_eq!(session.offered_reminder(), Some("r2"));
    assert_eq!(session.auth_step, AuthStep::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_single_reminder_opens_with_next_content() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;
    h.runtime.scheduler.fire(USER, "r1", "A").await;
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.last_text(USER), prompt::single_reminder("R1"));

    h.text(USER, 20, "all clean").await;
    assert_eq!(h.last_text(USER), prompt::content_added("R1"));
    assert_eq!(h.session(USER).await.active_reminder(), Some("r1"));

    h.press(USER, InteractionPayload::FinishReport).await;
    assert_eq!(
        h.transport.last_text_to(SUPERVISORY).as_deref(),
        Some("R1 @ A\nAnn: all clean")
    );
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_firing_is_idempotent() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;

    let scheduler = &h.runtime.scheduler;
    assert_eq!(scheduler.fire(USER, "r1", "A").await, FireOutcome::Enqueued);
    assert_eq!(scheduler.fire(USER, "r1", "A").await, FireOutcome::AlreadyQueued);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(h.session(USER).await.pending(), ["r1".to_string()]);
    let prompts = h
        .transport
        .texts_to(USER)
        .into_iter()
        .filter(|t| *t == prompt::single_reminder("R1"))
        .count();
    assert_eq!(prompts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_prompt_while_report_open() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;
    h.runtime.scheduler.fire(USER, "r1", "A").await;
    tokio::time::sleep(Duration::from_millis(1100)).await;
    h.text(USER, 20, "first").await;

    let before = h.transport.sent_to(USER).len();
    assert_eq!(h.runtime.scheduler.fire(USER, "r2", "A").await, FireOutcome::Enqueued);
    assert!(!h.runtime.debouncer.is_armed(USER));
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.transport.sent_to(USER).len(), before);

    h.press(USER, InteractionPayload::FinishReport).await;
    assert_eq!(h.last_text(USER), prompt::single_reminder("R2"));
}

#[tokio::test]
async fn test_wrong_password_keeps_session_unverified() {
    let h = Harness::new();
    h.login(USER, "A", "wrong").await;

    assert_eq!(h.last_text(USER), prompt::WRONG_PASSWORD);
    let session = h.session(USER).await;
    assert!(!session.verified);
    assert_eq!(session.auth_step, AuthStep::AwaitingPassword);
    assert_eq!(h.runtime.scheduler.trigger_count(USER), 0);
    assert!(h.roster.known_users().await.unwrap().is_empty());

    // Passwords are case-sensitive
    h.text(USER, 3, "SECRET").await;
    assert!(!h.session(USER).await.verified);

    h.text(USER, 4, "secret").await;
    assert!(h.session(USER).await.verified);
    assert_eq!(h.runtime.scheduler.trigger_count(USER), 2);
    assert_eq!(h.roster.known_users().await.unwrap(), vec![USER]);
}

#[tokio::test]
async fn test_password_must_match_exactly() {
    let h = Harness::new();
    h.login(USER, "A", "secret ").await;
    assert_eq!(h.last_text(USER), prompt::WRONG_PASSWORD);
    assert!(!h.session(USER).await.verified);

    h.text(USER, 3, "  secret  ").await;
    assert!(!h.session(USER).await.verified);
    assert_eq!(h.runtime.scheduler.trigger_count(USER), 0);

    h.text(USER, 4, "secret").await;
    assert!(h.session(USER).await.verified);
}

#[tokio::test]
async fn test_unknown_point_reprompts() {
    let h = Harness::new();
    h.start(USER).await;
    h.text(USER, 1, "Nowhere").await;

    assert_eq!(h.last_text(USER), prompt::UNKNOWN_POINT);
    assert_eq!(h.session(USER).await.auth_step, AuthStep::AwaitingPoint);

    h.press(USER, InteractionPayload::SelectPoint("B".to_string())).await;
    assert_eq!(h.last_text(USER), prompt::enter_password("B"));
    h.text(USER, 2, "hunter2").await;
    assert_eq!(h.session(USER).await.point.as_deref(), Some("B"));
    // r1, r2 apply everywhere; stock only to warehouses
    assert_eq!(h.runtime.scheduler.trigger_count(USER), 3);
}

#[tokio::test]
async fn test_content_without_session_asks_for_start() {
    let h = Harness::new();
    h.text(USER, 1, "hello").await;

    assert_eq!(h.last_text(USER), prompt::PRESS_START);
    assert!(h.runtime.sessions.is_empty());
}

#[tokio::test]
async fn test_end_without_shift() {
    let h = Harness::new();
    h.end(USER).await;
    assert_eq!(h.last_text(USER), prompt::NO_ACTIVE_SHIFT);

    h.start(USER).await;
    h.end(USER).await;
    assert_eq!(h.last_text(USER), prompt::NO_ACTIVE_SHIFT);
}

#[tokio::test(start_paused = true)]
async fn test_end_cancels_pending_prompt_and_triggers() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;
    h.runtime.scheduler.fire(USER, "r1", "A").await;
    assert!(h.runtime.debouncer.is_armed(USER));

    h.end(USER).await;
    assert!(!h.runtime.debouncer.is_armed(USER));
    assert_eq!(h.runtime.scheduler.trigger_count(USER), 0);
    assert_eq!(h.last_text(USER), prompt::SHIFT_ENDED);

    let sent = h.transport.sent_to(USER).len();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.transport.sent_to(USER).len(), sent);

    assert_eq!(h.runtime.scheduler.fire(USER, "r1", "A").await, FireOutcome::Dropped);
    let session = h.session(USER).await;
    assert!(!session.verified);
    assert!(session.pending().is_empty());
}

#[tokio::test]
async fn test_start_during_shift_restarts_silently() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;
    h.runtime.scheduler.fire(USER, "r1", "A").await;

    h.start(USER).await;
    assert_eq!(h.last_text(USER), prompt::CHOOSE_POINT);
    assert!(!h.transport.texts_to(USER).contains(&prompt::SHIFT_ENDED.to_string()));
    let session = h.session(USER).await;
    assert!(!session.verified);
    assert!(session.pending().is_empty());
    assert_eq!(h.runtime.scheduler.trigger_count(USER), 0);
}

#[tokio::test]
async fn test_select_point_while_on_shift_is_refused() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;

    h.press(USER, InteractionPayload::SelectPoint("B".to_string())).await;
    assert_eq!(h.last_text(USER), prompt::ALREADY_ON_SHIFT);
    assert_eq!(h.session(USER).await.point.as_deref(), Some("A"));
}

#[tokio::test]
async fn test_selection_rules() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;

    h.text(USER, 5, "anything?").await;
    assert_eq!(h.last_text(USER), prompt::NOTHING_PENDING);

    h.press(USER, select("r2")).await;
    assert_eq!(h.last_text(USER), prompt::STALE_REMINDER);

    h.runtime.scheduler.fire(USER, "r1", "A").await;
    h.runtime.scheduler.fire(USER, "r2", "A").await;
    h.press(USER, select("r1")).await;
    h.press(USER, select("r2")).await;
    assert_eq!(h.last_text(USER), prompt::FINISH_CURRENT_FIRST);

    // Re-selecting the open report just repeats its instructions
    h.press(USER, select("r1")).await;
    assert_eq!(h.last_text(USER), prompt::report_opened("R1"));
    assert_eq!(h.session(USER).await.pending(), ["r2".to_string()]);
}

#[tokio::test]
async fn test_finish_rules() {
    let h = Harness::new();
    h.press(USER, InteractionPayload::FinishReport).await;
    assert_eq!(h.last_text(USER), prompt::NO_ACTIVE_SHIFT);

    h.login(USER, "A", "secret").await;
    h.press(USER, InteractionPayload::FinishReport).await;
    assert_eq!(h.last_text(USER), prompt::NO_OPEN_REPORT);

    h.runtime.scheduler.fire(USER, "r1", "A").await;
    h.press(USER, select("r1")).await;
    h.press(USER, InteractionPayload::FinishReport).await;
    assert_eq!(h.last_text(USER), prompt::EMPTY_REPORT);
    assert_eq!(h.session(USER).await.active_reminder(), Some("r1"));
    assert!(h.transport.sent_to(SUPERVISORY).is_empty());
}

#[tokio::test]
async fn test_failed_submission_keeps_content_for_retry() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;
    h.runtime.scheduler.fire(USER, "r1", "A").await;
    h.press(USER, select("r1")).await;
    h.text(USER, 10, "ok").await;

    h.transport.fail_text_to(SUPERVISORY);
    h.press(USER, InteractionPayload::FinishReport).await;
    assert_eq!(h.last_text(USER), prompt::SUBMISSION_FAILED);
    let session = h.session(USER).await;
    assert_eq!(session.active_reminder(), Some("r1"));
    assert!(!session.buffer().is_empty());

    h.transport.recover(SUPERVISORY);
    h.press(USER, InteractionPayload::FinishReport).await;
    assert_eq!(h.transport.texts_to(SUPERVISORY), vec!["R1 @ A\nAnn: ok".to_string()]);
    assert_eq!(h.session(USER).await.active_reminder(), None);
}

#[tokio::test]
async fn test_media_failure_still_completes_report() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;
    h.runtime.scheduler.fire(USER, "r1", "A").await;
    h.press(USER, select("r1")).await;
    h.photo(USER, 10, "p1", None).await;

    h.transport.fail_media_to(SUPERVISORY);
    h.press(USER, InteractionPayload::FinishReport).await;

    let texts = h.transport.texts_to(USER);
    assert!(texts.contains(&prompt::MEDIA_INCOMPLETE.to_string()));
    assert_eq!(h.last_text(USER), prompt::report_submitted("R1"));
    assert_eq!(h.session(USER).await.active_reminder(), None);
    assert_eq!(h.transport.texts_to(SUPERVISORY), vec!["R1 @ A".to_string()]);
}

#[tokio::test]
async fn test_group_chat_report_lists_every_contributor() {
    let group = ChatId(-500);
    let h = Harness::new();
    h.login(group, "A", "secret").await;
    h.runtime.scheduler.fire(group, "r1", "A").await;
    h.press(group, select("r1")).await;

    h.text_from(group, Sender::new(1, "Ann"), 10, "fridge ok").await;
    h.text_from(group, Sender::new(2, "Bob"), 11, "floor ok").await;
    h.text_from(group, Sender::new(1, "Ann"), 12, "lights off").await;
    // Redelivered message is ignored
    h.text_from(group, Sender::new(2, "Bob"), 11, "floor ok").await;
    h.press(group, InteractionPayload::FinishReport).await;

    assert_eq!(
        h.transport.texts_to(SUPERVISORY),
        vec!["R1 @ A\nAnn: fridge ok\nlights off\nBob: floor ok".to_string()]
    );
}

#[tokio::test]
async fn test_album_is_acknowledged_once() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;
    h.runtime.scheduler.fire(USER, "r1", "A").await;
    h.press(USER, select("r1")).await;

    let acks_before = h
        .transport
        .texts_to(USER)
        .iter()
        .filter(|t| **t == prompt::content_added("R1"))
        .count();
    for (id, file) in [(10, "p1"), (11, "p2"), (12, "p3")] {
        h.photo(USER, id, file, Some("album-1")).await;
    }
    let acks = h
        .transport
        .texts_to(USER)
        .iter()
        .filter(|t| **t == prompt::content_added("R1"))
        .count();
    assert_eq!(acks - acks_before, 1);

    h.press(USER, InteractionPayload::FinishReport).await;
    let delivered = h.transport.sent_to(SUPERVISORY);
    assert!(matches!(
        &delivered[1],
        SentItem::MediaGroup { items, .. } if items.len() == 3
    ));
}

#[tokio::test]
async fn test_interactions_are_acknowledged() {
    let h = Harness::new();
    h.login(USER, "A", "secret").await;
    h.press(USER, InteractionPayload::FinishReport).await;

    assert!(h.transport.sent().contains(&SentItem::Acknowledged {
        interaction_id: format!("cb-{}", USER.0),
    }));
}
