//! Dockhand library
//!
//! Docker administration service with interactive terminal sessions attached
//! to running containers.

use std::sync::Arc;
use std::time::Instant;

pub mod api;
pub mod config;
pub mod exec;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod models;

use gateway::{DockerGateway, RuntimeGateway};

/// Application state shared across all handlers
pub struct AppState {
    pub config: config::AppConfig,
    /// Administration calls (containers, images, volumes, networks)
    pub docker: DockerGateway,
    /// Exec contract used by terminal sessions and one-shot commands
    pub runtime: Arc<dyn RuntimeGateway>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: config::AppConfig, docker: DockerGateway) -> Self {
        let runtime: Arc<dyn RuntimeGateway> = Arc::new(docker.clone());
        Self::with_runtime(config, docker, runtime)
    }

    /// State whose exec traffic goes to a different gateway than administration
    pub fn with_runtime(
        config: config::AppConfig,
        docker: DockerGateway,
        runtime: Arc<dyn RuntimeGateway>,
    ) -> Self {
        Self {
            config,
            docker,
            runtime,
            started_at: Instant::now(),
        }
    }
}
