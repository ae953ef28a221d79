//! API module for Dockhand
//!
//! Provides REST API endpoints for:
//! - Engine overview
//! - Container lifecycle, logs and one-shot commands
//! - Interactive terminals over WebSocket
//! - Container creation and resource stats
//! - Image, volume and network housekeeping
//! - Health checks

mod error;
mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::AppState;

pub use error::ApiError;
pub use handlers::terminal::{ClientFrame, ServerFrame};

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health::health_check));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(crate::metrics::metrics_handler));
    }

    router
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes() -> Router<Arc<AppState>> {
    use handlers::{containers, resources, system, terminal};

    Router::new()
        .route("/system", get(system::get_system))
        // Containers
        .route(
            "/containers",
            get(containers::list_containers).post(containers::create_container),
        )
        .route(
            "/containers/:id",
            get(containers::inspect_container).delete(containers::remove_container),
        )
        .route("/containers/:id/inspect", get(containers::inspect_container_raw))
        .route("/containers/:id/stats", get(containers::container_stats))
        .route("/containers/:id/start", post(containers::start_container))
        .route("/containers/:id/stop", post(containers::stop_container))
        .route("/containers/:id/restart", post(containers::restart_container))
        .route("/containers/:id/pause", post(containers::pause_container))
        .route("/containers/:id/unpause", post(containers::unpause_container))
        .route("/containers/:id/logs", get(containers::container_logs))
        .route("/containers/:id/exec", post(containers::exec_command))
        .route("/containers/:id/terminal", get(terminal::terminal_handler))
        // Images, volumes, networks
        .route("/images", get(resources::list_images))
        .route("/images/:id", delete(resources::remove_image))
        .route("/volumes", get(resources::list_volumes))
        .route("/volumes/:name", delete(resources::remove_volume))
        .route(
            "/networks",
            get(resources::list_networks).post(resources::create_network),
        )
        .route(
            "/networks/:id",
            get(resources::inspect_network).delete(resources::remove_network),
        )
}
