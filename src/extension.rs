//! Reduced endpoint family for the browser extension.
//!
//! The extension only knows one timer: whichever entry has no end time.

use crate::errors::{ApiJson, Result};
use crate::handlers::{parse_id, required};
use crate::models::{
    span_millis, ActiveTimer, ExtensionStatus, PingResponse, StartTimerRequest, StopTimerRequest,
    TimeEntry, TimerResponse,
};
use crate::state::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::info;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/status", get(status))
        .route("/start-timer", post(start_timer))
        .route("/stop-timer", post(stop_timer))
}

pub async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "online".to_string(),
        timestamp: state.now(),
    })
}

pub async fn status(State(state): State<AppState>) -> Json<ExtensionStatus> {
    let now = state.now();
    let (active, projects) = state
        .store
        .read(|data| {
            let active = data.entries.iter().find(|e| e.is_running()).map(|entry| {
                let project_name = data
                    .projects
                    .iter()
                    .find(|p| p.id == entry.project_id)
                    .map(|p| p.name.clone());
                ActiveTimer {
                    elapsed: span_millis(entry.state.start_time(), now),
                    entry: entry.clone(),
                    project_name,
                }
            });
            (active, data.projects.clone())
        })
        .await;

    Json(ExtensionStatus {
        is_running: active.is_some(),
        is_online: true,
        active_timer: active,
        projects,
    })
}

pub async fn start_timer(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<StartTimerRequest>,
) -> Result<Json<TimerResponse>> {
    let project_id = parse_id(&required(payload.project_id, "projectId")?, "Project")?;
    let (entry, closed) = state
        .store
        .start_timer(project_id, payload.description, state.now())
        .await?;

    info!(
        entry = %entry.id,
        project = %project_id,
        closed = ?closed.as_ref().map(|e| e.id),
        "timer started"
    );
    Ok(Json(TimerResponse {
        success: true,
        entry,
        closed,
    }))
}

/// The body is optional; a missing or unreadable one means "no description".
pub async fn stop_timer(
    State(state): State<AppState>,
    payload: Option<ApiJson<StopTimerRequest>>,
) -> Result<Json<TimerResponse>> {
    let description = payload.and_then(|ApiJson(body)| body.description);
    let entry: TimeEntry = state.store.stop_timer(description, state.now()).await?;

    info!(
        entry = %entry.id,
        duration_ms = entry.state.duration(),
        "timer stopped"
    );
    Ok(Json(TimerResponse {
        success: true,
        entry,
        closed: None,
    }))
}
