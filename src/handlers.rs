use crate::errors::{ApiJson, AppError, Result};
use crate::models::{
    CreateEntryRequest, CreateProjectRequest, DataSnapshot, DeleteResponse, EntryPatch,
    ExportSnapshot, NewTimeEntry, Project, ResetResponse, StatsResponse, TimeEntry,
    UpdateEntryRequest,
};
use crate::state::AppState;
use crate::stats::build_stats_at;
use crate::storage::sorted_entries;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Local;
use tracing::info;
use uuid::Uuid;

pub async fn list_projects(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.store.list_projects().await)
}

pub async fn create_project(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>)> {
    let name = required(payload.name, "name")?;
    let project = state
        .store
        .create_project(&name, payload.color.as_deref(), state.now())
        .await?;

    info!(project = %project.id, name = %project.name, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let id = parse_id(&id, "Project")?;
    let project = state.store.delete_project(id).await?;

    info!(project = %project.id, "project deleted");
    Ok(Json(DeleteResponse { success: true, id }))
}

pub async fn list_entries(State(state): State<AppState>) -> Json<Vec<TimeEntry>> {
    Json(state.store.list_entries().await)
}

pub async fn create_entry(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateEntryRequest>,
) -> Result<(StatusCode, Json<TimeEntry>)> {
    let project_id = required(payload.project_id, "projectId")?;
    let start_time = payload
        .start_time
        .ok_or_else(|| AppError::invalid("startTime is required"))?;

    let entry = state
        .store
        .create_entry(NewTimeEntry {
            project_id: parse_id(&project_id, "Project")?,
            start_time,
            end_time: payload.end_time,
            duration: payload.duration,
            description: payload.description.filter(|d| !d.trim().is_empty()),
        })
        .await?;

    info!(
        entry = %entry.id,
        project = %entry.project_id,
        duration_ms = entry.state.duration(),
        "time entry created"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateEntryRequest>,
) -> Result<Json<TimeEntry>> {
    let id = parse_id(&id, "Time entry")?;
    let project_id = payload
        .project_id
        .map(|project| parse_id(&project, "Project"))
        .transpose()?;

    let patch = EntryPatch {
        project_id,
        start_time: payload.start_time,
        end_time: payload.end_time,
        duration: payload.duration,
        description: payload.description,
    };
    Ok(Json(state.store.update_entry(id, patch).await?))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let id = parse_id(&id, "Time entry")?;
    state.store.delete_entry(id).await?;
    Ok(Json(DeleteResponse { success: true, id }))
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(current_stats(&state).await)
}

pub async fn get_data(State(state): State<AppState>) -> Json<DataSnapshot> {
    let now = state.now().with_timezone(&Local);
    let snapshot = state
        .store
        .read(|data| DataSnapshot {
            projects: data.projects.clone(),
            entries: sorted_entries(data),
            stats: build_stats_at(&now, data, state.week_start),
        })
        .await;
    Json(snapshot)
}

pub async fn export_data(State(state): State<AppState>) -> impl IntoResponse {
    let now = state.now();
    let data = state.store.snapshot().await;
    let disposition = format!(
        "attachment; filename=\"punchclock-export-{}.json\"",
        now.with_timezone(&Local).format("%Y-%m-%d")
    );

    (
        [(header::CONTENT_DISPOSITION, disposition)],
        Json(ExportSnapshot {
            exported_at: now,
            version: env!("CARGO_PKG_VERSION").to_string(),
            projects: data.projects,
            entries: data.entries,
        }),
    )
}

pub async fn reset_data(State(state): State<AppState>) -> Result<Json<ResetResponse>> {
    let projects = state.store.reset(state.now()).await?;

    info!("data reset to defaults");
    Ok(Json(ResetResponse {
        success: true,
        projects,
    }))
}

pub async fn not_found() -> AppError {
    AppError::not_found("Route")
}

async fn current_stats(state: &AppState) -> StatsResponse {
    let now = state.now().with_timezone(&Local);
    state
        .store
        .read(|data| build_stats_at(&now, data, state.week_start))
        .await
}

/// Trimmed, non-empty value of a required body field.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::invalid(format!("{field} is required")))
}

/// Unparseable ids cannot name anything stored, so they read as missing.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::not_found(what))
}
