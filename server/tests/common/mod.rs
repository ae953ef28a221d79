//! Scripted runtime shared by the router tests

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;

use dockhand::api::create_router;
use dockhand::config::AppConfig;
use dockhand::gateway::{DockerGateway, ExecSpec, ExecStream, GatewayError, RuntimeGateway};
use dockhand::AppState;

/// Runtime whose every exec prints a fixed line and exits
pub struct EchoRuntime;

#[async_trait]
impl RuntimeGateway for EchoRuntime {
    async fn create_exec(&self, container_id: &str, spec: &ExecSpec) -> Result<String, GatewayError> {
        if container_id == "missing" {
            return Err(GatewayError::NotFound(format!("No such container: {}", container_id)));
        }
        assert_eq!(spec.command[0], "/bin/sh");
        Ok("exec-1".to_string())
    }

    async fn attach_exec(&self, _exec_id: &str, _tty: bool) -> Result<ExecStream, GatewayError> {
        Ok(ExecStream::new(
            Cursor::new(b"hello from container\n".to_vec()),
            tokio::io::sink(),
        ))
    }

    async fn inspect_platform(&self, _container_id: &str) -> Result<String, GatewayError> {
        Ok("linux".to_string())
    }

    async fn resize_exec(&self, _exec_id: &str, _rows: u16, _cols: u16) -> Result<(), GatewayError> {
        Ok(())
    }
}

pub fn app(config: AppConfig) -> Router {
    // nothing listens on port 1, so every engine call fails fast
    let docker = DockerGateway::connect(Some("tcp://127.0.0.1:1"), Duration::from_secs(2)).unwrap();
    let state = AppState::with_runtime(config, docker, Arc::new(EchoRuntime));
    create_router(Arc::new(state))
}
