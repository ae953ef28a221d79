//! Container runtime gateway
//!
//! The exec session manager never talks to the container runtime directly.
//! Everything it needs goes through [`RuntimeGateway`]:
//! - Creating exec instances inside a running container
//! - Attaching to an exec instance as a bidirectional byte stream
//! - Inspecting a container's platform (for default shell inference)
//! - Resizing the exec's terminal
//!
//! [`DockerGateway`] implements the contract against the Docker Engine API and
//! additionally carries the container/image/volume/network administration calls.

mod docker;
mod stats;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

pub use docker::DockerGateway;
pub use stats::StatsSample;

/// Read side of an attached exec stream
pub type ExecReader = Pin<Box<dyn AsyncRead + Send>>;

/// Write side of an attached exec stream
pub type ExecWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Errors reported by the container runtime
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Container runtime timed out")]
    Timeout,

    #[error("Container runtime error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Unsupported by container runtime: {0}")]
    Unsupported(String),

    #[error("Unexpected container runtime response: {0}")]
    Decode(String),
}

/// Parameters for creating an exec instance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecSpec {
    /// Command and arguments
    pub command: Vec<String>,

    /// Allocate a pseudo-terminal
    pub tty: bool,

    /// Working directory inside the container
    pub working_dir: Option<String>,

    /// User to run as
    pub user: Option<String>,
}

/// Bidirectional byte stream of an attached exec instance
pub struct ExecStream {
    pub reader: ExecReader,
    pub writer: ExecWriter,
}

impl ExecStream {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            writer: Box::pin(writer),
        }
    }

    /// Split into independently owned read and write halves
    pub fn into_split(self) -> (ExecReader, ExecWriter) {
        (self.reader, self.writer)
    }
}

impl fmt::Debug for ExecStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecStream").finish_non_exhaustive()
    }
}

/// Minimal contract the exec session manager needs from the runtime
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuntimeGateway: Send + Sync {
    /// Create an exec instance and return its ID
    async fn create_exec(&self, container_id: &str, spec: &ExecSpec) -> Result<String, GatewayError>;

    /// Start an exec instance and attach to its stdio
    async fn attach_exec(&self, exec_id: &str, tty: bool) -> Result<ExecStream, GatewayError>;

    /// Platform string of a container (e.g. "linux", "windows")
    async fn inspect_platform(&self, container_id: &str) -> Result<String, GatewayError>;

    /// Resize the pseudo-terminal of a running exec instance
    async fn resize_exec(&self, exec_id: &str, rows: u16, cols: u16) -> Result<(), GatewayError>;
}
