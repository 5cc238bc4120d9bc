//! Janitor sweeps: backlog cap and shift expiry

mod support;

use chrono::Utc;
use shiftreport_core::models::{AuthStep, ChatId};
use shiftreport_core::notify::prompt;
use shiftreport_core::scheduler::EnqueueFilter;
use shiftreport_core::services::Roster;
use support::{config_with_reminders, Harness};

const ANN: ChatId = ChatId(1);
const BOB: ChatId = ChatId(2);

async fn fill_queue(h: &Harness, count: usize) {
    for i in 0..count {
        h.runtime
            .scheduler
            .force_enqueue(&format!("k{}", i), &EnqueueFilter::AllVerified)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_backlog_cap_ends_shift_and_forgets_user() {
    let h = Harness::with_config(&config_with_reminders(20, 20));
    h.login(ANN, "A", "secret").await;
    h.login(BOB, "A", "secret").await;
    fill_queue(&h, 19).await;
    h.runtime.scheduler.fire(ANN, "k19", "A").await;

    let report = h.runtime.janitor.sweep_backlog().await;
    assert_eq!(report.scanned, 2);
    assert_eq!(report.over_cap, 1);
    assert_eq!(report.total_pending, 19);

    assert_eq!(h.last_text(ANN), prompt::BACKLOG_CAP);
    let session = h.session(ANN).await;
    assert!(!session.verified);
    assert!(session.pending().is_empty());
    assert_eq!(h.runtime.scheduler.trigger_count(ANN), 0);
    assert_eq!(h.roster.known_users().await.unwrap(), vec![BOB]);

    // Bob stays on shift with 19 pending
    assert!(h.session(BOB).await.verified);
    assert_eq!(h.runtime.scheduler.trigger_count(BOB), 20);
}

#[tokio::test]
async fn test_user_can_start_fresh_after_cap() {
    let h = Harness::with_config(&config_with_reminders(3, 3));
    h.login(ANN, "A", "secret").await;
    fill_queue(&h, 3).await;
    h.runtime.janitor.run_once().await;

    h.start(ANN).await;
    assert_eq!(h.last_text(ANN), prompt::CHOOSE_POINT);
    h.text(ANN, 3, "A").await;
    h.text(ANN, 4, "secret").await;
    let session = h.session(ANN).await;
    assert!(session.verified);
    assert!(session.pending().is_empty());
    assert_eq!(session.auth_step, AuthStep::Idle);
}

#[tokio::test]
async fn test_stale_shift_is_expired() {
    let h = Harness::new();
    h.login(ANN, "A", "secret").await;
    h.login(BOB, "A", "secret").await;
    {
        let handle = h.runtime.sessions.get(ANN).unwrap();
        let overdue = chrono::Duration::hours(16) + chrono::Duration::minutes(1);
        handle.lock().await.started_at = Some(Utc::now() - overdue);
    }

    let report = h.runtime.janitor.sweep_stale().await;
    assert_eq!(report.expired, 1);
    assert_eq!(report.terminated(), 1);
    assert_eq!(h.last_text(ANN), prompt::SHIFT_EXPIRED);
    assert!(!h.session(ANN).await.verified);
    assert_eq!(h.runtime.scheduler.trigger_count(ANN), 0);
    assert!(h.session(BOB).await.verified);
    // Expiry does not forget the user
    assert!(h.roster.known_users().await.unwrap().contains(&ANN));
}

#[tokio::test]
async fn test_sweep_with_nothing_to_do() {
    let h = Harness::new();
    assert!(h.runtime.janitor.last_report().await.is_none());
    h.login(ANN, "A", "secret").await;

    let report = h.runtime.janitor.run_once().await;
    assert_eq!(report.scanned, 1);
    assert_eq!(report.terminated(), 0);
    assert!(report.finished_at.is_some());
    assert_eq!(h.runtime.janitor.last_report().await, Some(report));
    assert!(h.session(ANN).await.verified);
}

#[tokio::test]
async fn test_unverified_sessions_are_not_capped_or_expired() {
    let h = Harness::new();
    h.start(ANN).await;

    let report = h.runtime.janitor.run_once().await;
    assert_eq!(report.scanned, 1);
    assert_eq!(report.terminated(), 0);
    assert_eq!(h.last_text(ANN), prompt::CHOOSE_POINT);
}
