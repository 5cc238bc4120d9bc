//! Restart notice sent to every known user on startup

use crate::models::{ChatId, Keyboard};
use crate::notify::prompt;
use crate::server::providers::ChatTransport;
use crate::services::roster::{Roster, RosterError};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

const CONCURRENT_SENDS: usize = 8;

/// Outcome of a restart broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestartNoticeReport {
    pub total: usize,
    pub notified: usize,
    pub failed: usize,
}

/// Tell every roster user that the bot restarted and a new `/start` is needed.
///
/// Per-recipient failures (e.g. the user blocked the bot) are counted, never propagated.
pub async fn broadcast_restart_notice(
    transport: &dyn ChatTransport,
    roster: &dyn Roster,
) -> Result<RestartNoticeReport, RosterError> {
    let users = roster.known_users().await?;
    let total = users.len();

    let results: Vec<(ChatId, bool)> = stream::iter(users)
        .map(|chat| async move {
            let sent = transport
                .send_text(chat, prompt::RESTART_NOTICE, Some(Keyboard::start()))
                .await;
            if let Err(ref e) = sent {
                tracing::debug!(chat_id = chat.0, error = %e, "Restart notice not delivered");
            }
            (chat, sent.is_ok())
        })
        .buffer_unordered(CONCURRENT_SENDS)
        .collect()
        .await;

    let notified = results.iter().filter(|(_, ok)| *ok).count();
    let report = RestartNoticeReport {
        total,
        notified,
        failed: total - notified,
    };
    tracing::info!(
        notified = report.notified,
        total = report.total,
        "Restart notice sent to {}/{} users",
        report.notified,
        report.total
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::providers::RecordingTransport;
    use crate::services::roster::MemoryRoster;

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let transport = RecordingTransport::new();
        transport.fail_text_to(ChatId(2));
        let roster = MemoryRoster::with_users([ChatId(1), ChatId(2), ChatId(3)]);

        let report = broadcast_restart_notice(&transport, &roster).await.unwrap();
        assert_eq!(
            report,
            RestartNoticeReport {
                total: 3,
                notified: 2,
                failed: 1
            }
        );
        let mut recipients = transport.text_recipients();
        recipients.sort();
        assert_eq!(recipients, vec![ChatId(1), ChatId(3)]);
    }

    #[tokio::test]
    async fn test_empty_roster() {
        let transport = RecordingTransport::new();
        let report = broadcast_restart_notice(&transport, &MemoryRoster::new())
            .await
            .unwrap();
        assert_eq!(report.total, 0);
        assert!(transport.sent().is_empty());
    }
}
