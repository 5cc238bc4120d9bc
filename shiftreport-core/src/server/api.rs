//! HTTP control API: health, status and manual reminder triggers

use crate::janitor::SweepReport;
use crate::scheduler::{EnqueueFilter, SchedulerError};
use crate::server::ShiftRuntime;
use crate::session::SessionSummary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
}

/// Status response: every session plus the last janitor sweep
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub sessions: Vec<SessionSummary>,
    pub verified: usize,
    pub total_pending: usize,
    pub last_sweep: Option<SweepReport>,
}

/// Body of POST /api/v1/trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub reminder: String,
    /// Restrict to sessions at this point; all verified sessions when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<String>,
}

impl TriggerRequest {
    pub fn filter(&self) -> EnqueueFilter {
        match &self.point {
            Some(point) => EnqueueFilter::Point(point.clone()),
            None => EnqueueFilter::AllVerified,
        }
    }
}

/// Create HTTP API routes
pub fn create_api_routes(
    runtime: Arc<ShiftRuntime>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let runtime_filter = warp::any().map(move || Arc::clone(&runtime));

    // GET /api/v1/health - Health check endpoint
    let get_health = warp::path!("api" / "v1" / "health")
        .and(warp::get())
        .and(runtime_filter.clone())
        .and_then(handle_get_health);

    // GET /api/v1/status - Session overview
    let get_status = warp::path!("api" / "v1" / "status")
        .and(warp::get())
        .and(runtime_filter.clone())
        .and_then(handle_get_status);

    // POST /api/v1/trigger - Force a reminder into verified sessions
    let post_trigger = warp::path!("api" / "v1" / "trigger")
        .and(warp::post())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(runtime_filter.clone())
        .and_then(handle_post_trigger);

    get_health.or(get_status).or(post_trigger)
}

/// Handle GET /api/v1/health
async fn handle_get_health(runtime: Arc<ShiftRuntime>) -> Result<impl warp::Reply, warp::Rejection> {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: runtime.sessions.len(),
    };
    Ok(warp::reply::json(&response))
}

/// Handle GET /api/v1/status
async fn handle_get_status(runtime: Arc<ShiftRuntime>) -> Result<impl warp::Reply, warp::Rejection> {
    let sessions = runtime.sessions.summaries().await;
    let response = StatusResponse {
        verified: sessions.iter().filter(|s| s.verified).count(),
        total_pending: sessions.iter().map(|s| s.pending).sum(),
        sessions,
        last_sweep: runtime.janitor.last_report().await,
    };
    Ok(warp::reply::json(&response))
}

/// Handle POST /api/v1/trigger
async fn handle_post_trigger(
    request: TriggerRequest,
    runtime: Arc<ShiftRuntime>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match runtime
        .scheduler
        .force_enqueue(&request.reminder, &request.filter())
        .await
    {
        Ok(report) => Ok(warp::reply::with_status(
            warp::reply::json(&report),
            StatusCode::OK,
        )),
        Err(e) => {
            let status = match e {
                SchedulerError::UnknownReminder(_) | SchedulerError::UnknownPoint(_) => {
                    StatusCode::NOT_FOUND
                }
            };
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({ "error": e.to_string() })),
                status,
            ))
        }
    }
}
