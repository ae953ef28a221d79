//! Image, volume and network handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::api::ApiError;
use crate::models::{
    CreateNetworkRequest, CreateNetworkResponse, ImageSummary, NetworkDetails, NetworkSummary,
    VolumeSummary,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ForceQuery {
    #[serde(default)]
    pub force: bool,
}

pub async fn list_images(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ImageSummary>>, ApiError> {
    Ok(Json(state.docker.list_images().await?))
}

pub async fn remove_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ForceQuery>,
) -> Result<StatusCode, ApiError> {
    state.docker.remove_image(&id, query.force).await?;
    info!(image_id = %id, force = query.force, "Image removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_volumes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<VolumeSummary>>, ApiError> {
    Ok(Json(state.docker.list_volumes().await?))
}

pub async fn remove_volume(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.docker.remove_volume(&name).await?;
    info!(volume = %name, "Volume removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_networks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<NetworkSummary>>, ApiError> {
    Ok(Json(state.docker.list_networks().await?))
}

pub async fn create_network(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateNetworkRequest>,
) -> Result<(StatusCode, Json<CreateNetworkResponse>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Network name is required".to_string()));
    }
    Ok((StatusCode::CREATED, Json(state.docker.create_network(&request).await?)))
}

pub async fn inspect_network(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<NetworkDetails>, ApiError> {
    Ok(Json(state.docker.inspect_network(&id).await?))
}

pub async fn remove_network(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.docker.remove_network(&id).await?;
    info!(network_id = %id, "Network removed");
    Ok(StatusCode::NO_CONTENT)
}
