//! Main server integration for shiftreport

use crate::janitor::SessionJanitor;
use crate::lifecycle::{ReportLifecycle, SubmissionPipeline};
use crate::models::{ChatId, Configuration, PointRegistry, ReminderCatalog};
use crate::notify::NotificationDebouncer;
use crate::scheduler::ReminderScheduler;
use crate::server::dispatch::EventDispatcher;
use crate::server::providers::{ChatTransport, UpdateSource};
use crate::services::{broadcast_restart_notice, Roster};
use crate::session::SessionStore;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Every long-lived component, wired together
pub struct ShiftRuntime {
    pub points: Arc<PointRegistry>,
    pub catalog: Arc<ReminderCatalog>,
    pub sessions: Arc<SessionStore>,
    pub debouncer: Arc<NotificationDebouncer>,
    pub scheduler: Arc<ReminderScheduler>,
    pub lifecycle: Arc<ReportLifecycle>,
    pub janitor: Arc<SessionJanitor>,
    pub dispatcher: Arc<EventDispatcher>,
    pub transport: Arc<dyn ChatTransport>,
    pub roster: Arc<dyn Roster>,
    pub supervisory_chat: ChatId,
}

impl ShiftRuntime {
    /// Build the runtime from configuration
    pub fn build(
        config: &Configuration,
        transport: Arc<dyn ChatTransport>,
        roster: Arc<dyn Roster>,
    ) -> Result<Self> {
        let supervisory_chat = config
            .telegram
            .supervisory_chat_id
            .map(ChatId)
            .ok_or_else(|| anyhow!("telegram.supervisory_chat_id is not configured"))?;

        let points =
            Arc::new(PointRegistry::from_config(config).context("Invalid point configuration")?);
        let catalog = Arc::new(
            ReminderCatalog::from_config(config).context("Invalid reminder configuration")?,
        );
        for reminder in catalog.unmatched(&points) {
            tracing::warn!(
                reminder = %reminder.key,
                point_type = reminder.point_type.as_deref().unwrap_or(""),
                "Reminder matches no configured point type; it will never fire"
            );
        }

        let sessions = Arc::new(SessionStore::new());
        let debouncer = Arc::new(NotificationDebouncer::new(
            Arc::clone(&sessions),
            Arc::clone(&catalog),
            Arc::clone(&transport),
            config.timing.debounce(),
        ));
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&points),
            Arc::clone(&catalog),
            Arc::clone(&sessions),
            Arc::clone(&debouncer),
            config.timing.shift_expiry(),
        ));
        let lifecycle = Arc::new(ReportLifecycle::new(
            Arc::clone(&points),
            Arc::clone(&catalog),
            Arc::clone(&sessions),
            Arc::clone(&scheduler),
            Arc::clone(&debouncer),
            SubmissionPipeline::new(Arc::clone(&transport), supervisory_chat),
            Arc::clone(&transport),
            Arc::clone(&roster),
        ));
        let janitor = Arc::new(SessionJanitor::new(
            Arc::clone(&sessions),
            Arc::clone(&scheduler),
            Arc::clone(&debouncer),
            Arc::clone(&roster),
            config.timing.shift_expiry(),
            config.timing.pending_cap,
        ));
        let dispatcher = Arc::new(EventDispatcher::new(Arc::clone(&lifecycle)));

        tracing::info!(
            points = points.len(),
            reminders = catalog.len(),
            transport = transport.name(),
            "Runtime assembled"
        );

        Ok(Self {
            points,
            catalog,
            sessions,
            debouncer,
            scheduler,
            lifecycle,
            janitor,
            dispatcher,
            transport,
            roster,
            supervisory_chat,
        })
    }
}

/// Main shiftreport server: update polling, janitor and control API
pub struct ShiftServer {
    runtime: Arc<ShiftRuntime>,
    updates: Arc<dyn UpdateSource>,
    host: String,
    port: u16,
    janitor_interval: Duration,
}

impl ShiftServer {
    pub fn new(
        runtime: Arc<ShiftRuntime>,
        updates: Arc<dyn UpdateSource>,
        config: &Configuration,
    ) -> Self {
        Self {
            runtime,
            updates,
            host: config.server.host.clone(),
            port: config.server.port,
            janitor_interval: config.timing.janitor_interval(),
        }
    }

    /// Start the server and run until Ctrl+C
    pub async fn start(self) -> Result<()> {
        use std::net::SocketAddr;
        let address: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .context("Invalid server address")?;

        match broadcast_restart_notice(self.runtime.transport.as_ref(), self.runtime.roster.as_ref())
            .await
        {
            Ok(report) if report.failed > 0 => {
                tracing::warn!(failed = report.failed, "Some users missed the restart notice");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Could not read roster for restart notice"),
        }

        let janitor_task = Arc::clone(&self.runtime.janitor).spawn(self.janitor_interval);

        let api_routes = crate::server::api::create_api_routes(Arc::clone(&self.runtime));
        let (bound, api_server) = warp::serve(api_routes)
            .try_bind_ephemeral(address)
            .context(format!("Failed to bind control API to {}", address))?;
        let api_task = tokio::spawn(api_server);
        tracing::info!(address = %bound, "Control API listening");

        let server_result = tokio::select! {
            _ = self.poll_updates() => Ok(()),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                Ok(())
            }
        };

        // Cleanup
        api_task.abort();
        janitor_task.abort();

        server_result
    }

    async fn poll_updates(&self) {
        loop {
            match self.updates.next_events().await {
                Ok(events) => {
                    for event in events {
                        self.runtime.dispatcher.dispatch(event);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Polling for updates failed");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                }
            }
        }
    }
}
