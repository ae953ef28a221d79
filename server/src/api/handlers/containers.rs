//! Container handlers

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::ApiError;
use crate::exec::run_command;
use crate::models::{
    ContainerDetails, ContainerLogs, ContainerStats, ContainerSummary, CreateContainerRequest,
    CreateContainerResponse, ExecCommandRequest, ExecCommandResponse,
};
use crate::AppState;

/// Upper bound for one-shot commands
const MAX_COMMAND_TIMEOUT_SECS: u64 = 600;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_tail")]
    pub tail: usize,
}

fn default_tail() -> usize {
    100
}

/// Container lifecycle actions
#[derive(Debug, Clone, Copy)]
enum Action {
    Start,
    Stop,
    Restart,
    Pause,
    Unpause,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Pause => "pause",
            Action::Unpause => "unpause",
        }
    }
}

pub async fn list_containers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ContainerSummary>>, ApiError> {
    Ok(Json(state.docker.list_containers(query.all).await?))
}

pub async fn inspect_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ContainerDetails>, ApiError> {
    Ok(Json(state.docker.inspect_container(&id).await?))
}

/// Engine inspect document, unabridged
pub async fn inspect_container_raw(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.docker.inspect_container_raw(&id).await?))
}

pub async fn container_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ContainerStats>, ApiError> {
    Ok(Json(state.docker.container_stats(&id).await?))
}

pub async fn create_container(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateContainerRequest>,
) -> Result<(StatusCode, Json<CreateContainerResponse>), ApiError> {
    let errors = request.validate();
    if !errors.is_empty() {
        return Err(ApiError::BadRequest(errors.join("; ")));
    }

    let response = state.docker.create_container(&request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn apply(state: &AppState, id: &str, action: Action) -> Result<StatusCode, ApiError> {
    let docker = &state.docker;
    match action {
        Action::Start => docker.start_container(id).await?,
        Action::Stop => docker.stop_container(id).await?,
        Action::Restart => docker.restart_container(id).await?,
        Action::Pause => docker.pause_container(id).await?,
        Action::Unpause => docker.unpause_container(id).await?,
    }

    info!(container_id = %id, action = action.as_str(), "Container action applied");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn start_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    apply(&state, &id, Action::Start).await
}

pub async fn stop_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    apply(&state, &id, Action::Stop).await
}

pub async fn restart_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    apply(&state, &id, Action::Restart).await
}

pub async fn pause_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    apply(&state, &id, Action::Pause).await
}

pub async fn unpause_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    apply(&state, &id, Action::Unpause).await
}

pub async fn remove_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RemoveQuery>,
) -> Result<StatusCode, ApiError> {
    state.docker.remove_container(&id, query.force).await?;
    info!(container_id = %id, force = query.force, "Container removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn container_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<ContainerLogs>, ApiError> {
    let lines = state.docker.container_logs(&id, query.tail).await?;
    Ok(Json(ContainerLogs {
        container_id: id,
        lines,
    }))
}

/// Run a one-shot command and return its output
pub async fn exec_command(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ExecCommandRequest>,
) -> Result<Json<ExecCommandResponse>, ApiError> {
    if request.command.trim().is_empty() {
        return Err(ApiError::BadRequest("Command cannot be empty".into()));
    }

    let timeout_secs = request
        .timeout_seconds
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS)
        .clamp(1, MAX_COMMAND_TIMEOUT_SECS);

    let options = state.config.exec.session_options();
    let result = run_command(
        state.runtime.as_ref(),
        &id,
        &request.command,
        &options,
        Duration::from_secs(timeout_secs),
    )
    .await?;

    info!(
        container_id = %id,
        exec_id = %result.exec_id,
        duration_ms = result.duration.as_millis() as u64,
        "Command finished"
    );

    Ok(Json(ExecCommandResponse {
        execution_id: Uuid::new_v4(),
        container_id: id,
        command: request.command,
        output: result.output,
        duration_ms: result.duration.as_millis() as u64,
    }))
}
