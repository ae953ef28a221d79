//! Exec session management for Dockhand
//!
//! Handles interactive command execution inside running containers:
//! - Opening an exec session (shell inference, exec creation, stream attach)
//! - Pumping output into a bounded buffer in the background
//! - Forwarding input and terminal resizes
//! - Tearing the session down
//!
//! A session is owned by whoever opened it; nothing here keeps a registry.

mod buffer;
mod command;
mod decode;
mod error;
mod pump;
pub mod session;
mod shell;

pub use buffer::OutputBuffer;
pub use command::{run_command, CommandOutput};
pub use decode::Utf8Decoder;
pub use error::{ConnectError, IoError};
pub use session::{
    ExecOptions, ExecSession, SessionHandle, SessionState, SessionUpdate, TerminalSize,
};
pub use shell::{command_line, shell_for_platform, WINDOWS_SHELL};
