//! Exec session errors

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::gateway::GatewayError;

/// Failure to establish an exec session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Connection to the container runtime timed out{}", after(.0))]
    Timeout(Option<Duration>),

    #[error("Failed to start exec session: {0}")]
    Other(String),

    #[error("Container ID cannot be empty")]
    InvalidContainer,

    #[error("Exec session is already open")]
    AlreadyOpen,
}

fn after(limit: &Option<Duration>) -> String {
    limit.map(|d| format!(" after {:?}", d)).unwrap_or_default()
}

impl From<GatewayError> for ConnectError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout => ConnectError::Timeout(None),
            other => ConnectError::Other(other.to_string()),
        }
    }
}

/// Failure to write to an exec session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    #[error("Exec stream is closed")]
    StreamClosed,

    #[error("Exec stream I/O error: {0}")]
    Other(String),
}

impl From<io::Error> for IoError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero => IoError::StreamClosed,
            _ => IoError::Other(err.to_string()),
        }
    }
}
