//! Engine overview handler

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::api::ApiError;
use crate::models::SystemSummary;
use crate::AppState;

/// Dashboard summary of the Docker engine
pub async fn get_system(State(state): State<Arc<AppState>>) -> Result<Json<SystemSummary>, ApiError> {
    Ok(Json(state.docker.system_summary().await?))
}
