//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::debug;

use crate::metrics;
use crate::models::{HealthResponse, HealthStatus};
use crate::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let docker_version = match state.docker.engine_version().await {
        Ok(version) => Some(version),
        Err(e) => {
            debug!(error = %e, "Docker engine not reachable");
            None
        }
    };

    let status = if docker_version.is_some() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        active_terminals: metrics::active_terminals(),
        docker_version,
    })
}
