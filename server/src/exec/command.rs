//! One-shot, non-interactive command execution

use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::gateway::{ExecSpec, RuntimeGateway};

use super::error::ConnectError;
use super::session::ExecOptions;

/// Collected output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exec_id: String,
    /// Interleaved stdout and stderr
    pub output: String,
    pub duration: Duration,
}

/// Run `/bin/sh -c <command>` in a container and wait for it to finish
pub async fn run_command(
    gateway: &dyn RuntimeGateway,
    container_id: &str,
    command: &str,
    options: &ExecOptions,
    timeout: Duration,
) -> Result<CommandOutput, ConnectError> {
    let container_id = container_id.trim();
    if container_id.is_empty() {
        return Err(ConnectError::InvalidContainer);
    }

    let spec = ExecSpec {
        command: vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()],
        tty: true,
        working_dir: options.working_dir.clone(),
        user: options.user.clone(),
    };

    let started = Instant::now();
    let run = async {
        let exec_id = gateway.create_exec(container_id, &spec).await?;
        debug!(container_id, exec_id = %exec_id, command, "Running command");

        let (mut reader, writer) = gateway.attach_exec(&exec_id, spec.tty).await?.into_split();
        drop(writer);

        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| ConnectError::Other(format!("Failed to read command output: {}", e)))?;

        Ok::<_, ConnectError>(CommandOutput {
            exec_id,
            output: String::from_utf8_lossy(&bytes).into_owned(),
            duration: started.elapsed(),
        })
    };

    tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| ConnectError::Timeout(Some(timeout)))?
}
