//! Interactive exec sessions attached to running containers

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::{ExecSpec, ExecStream, ExecWriter, RuntimeGateway};
use crate::metrics;

use super::buffer::OutputBuffer;
use super::error::{ConnectError, IoError};
use super::pump::{self, PumpSettings};
use super::shell::{command_line, infer_shell};

/// Session state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }

    /// No further transition happens without a new `open`
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

/// Notification delivered to session observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUpdate {
    pub state: SessionState,
    /// Sequence number of the next output chunk; grows as output arrives
    pub output_seq: u64,
}

/// Settings applied to every `open` of a session
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub default_shell: String,
    pub tty: bool,
    pub rows: u16,
    pub cols: u16,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub output_capacity: usize,
    pub chunk_size: usize,
    pub notify_batch: usize,
    pub flush_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            default_shell: "/bin/sh".to_string(),
            tty: true,
            rows: 24,
            cols: 80,
            working_dir: None,
            user: None,
            output_capacity: 5000,
            chunk_size: 4096,
            notify_batch: 10,
            flush_interval: Duration::from_millis(25),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl ExecOptions {
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn terminal_size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn notify_batch(mut self, batch: usize) -> Self {
        self.notify_batch = batch;
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    fn pump_settings(&self) -> PumpSettings {
        PumpSettings {
            chunk_size: self.chunk_size.max(1),
            notify_batch: self.notify_batch.max(1),
            flush_interval: self.flush_interval,
        }
    }
}

#[derive(Debug)]
struct Status {
    state: SessionState,
    /// Set iff state is Connected or Closing
    exec_id: Option<String>,
    last_error: Option<String>,
}

/// State shared between a session and its output pump
#[derive(Debug)]
pub(crate) struct Shared {
    status: RwLock<Status>,
    pub(crate) output: OutputBuffer,
    updates: watch::Sender<SessionUpdate>,
}

impl Shared {
    pub(crate) fn new(output_capacity: usize) -> Self {
        let (updates, _) = watch::channel(SessionUpdate {
            state: SessionState::Idle,
            output_seq: 0,
        });
        Self {
            status: RwLock::new(Status {
                state: SessionState::Idle,
                exec_id: None,
                last_error: None,
            }),
            output: OutputBuffer::new(output_capacity),
            updates,
        }
    }

    async fn state(&self) -> SessionState {
        self.status.read().await.state
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    async fn publish(&self, state: SessionState) {
        let output_seq = self.output.next_seq().await;
        self.updates.send_replace(SessionUpdate { state, output_seq });
    }

    /// Announce new output without a state change
    pub(crate) async fn notify(&self) {
        let state = self.state().await;
        self.publish(state).await;
    }

    async fn set_connecting(&self) {
        {
            let mut status = self.status.write().await;
            status.state = SessionState::Connecting;
            status.exec_id = None;
            status.last_error = None;
        }
        self.publish(SessionState::Connecting).await;
    }

    async fn set_connected(&self, exec_id: String) {
        {
            let mut status = self.status.write().await;
            status.state = SessionState::Connected;
            status.exec_id = Some(exec_id);
        }
        self.publish(SessionState::Connected).await;
    }

    /// Connecting -> Failed
    async fn fail_connect(&self, message: String) {
        {
            let mut status = self.status.write().await;
            status.state = SessionState::Failed;
            status.exec_id = None;
            status.last_error = Some(message);
        }
        self.publish(SessionState::Failed).await;
    }

    /// Connected -> Failed, when the stream breaks. A close in progress wins.
    pub(crate) async fn fail_stream(&self, message: String) -> bool {
        {
            let mut status = self.status.write().await;
            if status.state != SessionState::Connected {
                return false;
            }
            status.state = SessionState::Failed;
            status.exec_id = None;
            status.last_error = Some(message);
        }
        metrics::record_terminal_ended("failed");
        self.publish(SessionState::Failed).await;
        true
    }

    /// Connected -> Closing -> Closed, when the remote process exits
    pub(crate) async fn end_of_stream(&self) -> bool {
        {
            let mut status = self.status.write().await;
            if status.state != SessionState::Connected {
                return false;
            }
            status.state = SessionState::Closing;
        }
        self.publish(SessionState::Closing).await;
        self.finish_close().await;
        metrics::record_terminal_ended("exited");
        true
    }

    /// Connected -> Closing
    async fn begin_close(&self) -> bool {
        {
            let mut status = self.status.write().await;
            if status.state != SessionState::Connected {
                return false;
            }
            status.state = SessionState::Closing;
        }
        metrics::record_terminal_ended("closed");
        self.publish(SessionState::Closing).await;
        true
    }

    /// Closing -> Closed
    async fn finish_close(&self) {
        {
            let mut status = self.status.write().await;
            status.state = SessionState::Closed;
            status.exec_id = None;
        }
        self.publish(SessionState::Closed).await;
    }
}

/// Background output pump owned by a connected session
struct Pump {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// One interactive command execution attached to a container.
///
/// The session is owned by whoever opened it; there is no global registry.
/// `open`, `close` and `resize` take `&self`, so a [`SessionHandle`] can be
/// shared between the task forwarding input and the task rendering output.
pub struct ExecSession {
    gateway: Arc<dyn RuntimeGateway>,
    options: ExecOptions,
    shared: Arc<Shared>,
    container_id: RwLock<Option<String>>,
    shell: RwLock<Option<String>>,
    size: RwLock<TerminalSize>,
    writer: Mutex<Option<ExecWriter>>,
    /// Cancelled on release so a blocked write gives up the writer
    input_cancel: RwLock<CancellationToken>,
    /// Serializes open/close; holds the running pump
    lifecycle: Mutex<Option<Pump>>,
}

/// Thread-safe session handle
pub type SessionHandle = Arc<ExecSession>;

impl ExecSession {
    /// Create an idle session
    pub fn new(gateway: Arc<dyn RuntimeGateway>, options: ExecOptions) -> SessionHandle {
        let size = TerminalSize {
            rows: options.rows,
            cols: options.cols,
        };
        Arc::new(Self {
            gateway,
            shared: Arc::new(Shared::new(options.output_capacity)),
            options,
            container_id: RwLock::new(None),
            shell: RwLock::new(None),
            size: RwLock::new(size),
            writer: Mutex::new(None),
            input_cancel: RwLock::new(CancellationToken::new()),
            lifecycle: Mutex::new(None),
        })
    }

    /// Open the session against a running container.
    ///
    /// Without `shell_override` the shell is inferred from the container
    /// platform. On failure the session is left `Failed` with the error
    /// message available from [`ExecSession::last_error`].
    pub async fn open(&self, container_id: &str, shell_override: Option<&str>) -> Result<(), ConnectError> {
        let container_id = container_id.trim();
        if container_id.is_empty() {
            return Err(ConnectError::InvalidContainer);
        }

        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(
            self.shared.state().await,
            SessionState::Connecting | SessionState::Connected | SessionState::Closing
        ) {
            return Err(ConnectError::AlreadyOpen);
        }

        // Leftovers of a previous attempt that ended on its own
        self.release(&mut lifecycle).await;
        *self.input_cancel.write().await = CancellationToken::new();

        *self.container_id.write().await = Some(container_id.to_string());
        self.shared.set_connecting().await;
        debug!(container_id, "Opening exec session");

        let started = Instant::now();
        let limit = self.options.connect_timeout;
        let result = match tokio::time::timeout(limit, self.connect(container_id, shell_override)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Timeout(Some(limit))),
        };

        let (exec_id, stream) = match result {
            Ok(connected) => connected,
            Err(err) => {
                let reason = match err {
                    ConnectError::Timeout(_) => "timeout",
                    _ => "error",
                };
                metrics::record_terminal_failed(reason);
                warn!(container_id, error = %err, "Failed to open exec session");
                self.shared.fail_connect(err.to_string()).await;
                return Err(err);
            }
        };

        let (reader, writer) = stream.into_split();
        *self.writer.lock().await = Some(writer);
        self.shared.set_connected(exec_id.clone()).await;
        metrics::record_terminal_opened(started.elapsed().as_secs_f64());

        // Dimensions may have been set before the exec existed
        if self.options.tty {
            let size = *self.size.read().await;
            self.forward_resize(&exec_id, size).await;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump::run(
            self.shared.clone(),
            reader,
            self.options.pump_settings(),
            cancel.clone(),
        ));
        *lifecycle = Some(Pump { cancel, task });

        let shell = self.shell.read().await.clone();
        info!(container_id, exec_id = %exec_id, shell = ?shell, "Exec session connected");

        Ok(())
    }

    async fn connect(
        &self,
        container_id: &str,
        shell_override: Option<&str>,
    ) -> Result<(String, ExecStream), ConnectError> {
        let shell = match shell_override.map(str::trim).filter(|s| !s.is_empty()) {
            Some(shell) => shell.to_string(),
            None => infer_shell(self.gateway.as_ref(), container_id, &self.options.default_shell).await,
        };
        *self.shell.write().await = Some(shell.clone());

        let spec = ExecSpec {
            command: command_line(&shell),
            tty: self.options.tty,
            working_dir: self.options.working_dir.clone(),
            user: self.options.user.clone(),
        };

        let exec_id = self.gateway.create_exec(container_id, &spec).await?;
        debug!(container_id, exec_id = %exec_id, "Exec instance created");

        let stream = self.gateway.attach_exec(&exec_id, self.options.tty).await?;
        Ok((exec_id, stream))
    }

    /// Forward input to the remote process.
    ///
    /// Input to a session that is not connected is dropped without error.
    /// Write failures are returned but leave the session state untouched.
    /// A write still pending when the session is closed returns
    /// [`IoError::StreamClosed`].
    pub async fn send_input(&self, text: &str) -> Result<(), IoError> {
        if text.is_empty() || self.shared.state().await != SessionState::Connected {
            return Ok(());
        }

        let cancel = self.input_cancel.read().await.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IoError::StreamClosed),
            result = self.write_input(text) => result,
        };

        match result {
            Ok(()) => {
                metrics::record_input_bytes(text.len());
                Ok(())
            }
            Err(e) => {
                let err = IoError::from(e);
                warn!(error = %err, "Failed to send input to exec session");
                Err(err)
            }
        }
    }

    async fn write_input(&self, text: &str) -> std::io::Result<()> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Ok(());
        };
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await
    }

    /// Track new terminal dimensions and forward them when connected
    pub async fn resize(&self, rows: u16, cols: u16) {
        let size = TerminalSize { rows, cols };
        *self.size.write().await = size;

        let exec_id = {
            let status = self.shared.status.read().await;
            match status.state {
                SessionState::Connected => status.exec_id.clone(),
                _ => None,
            }
        };

        if let Some(exec_id) = exec_id {
            self.forward_resize(&exec_id, size).await;
        }
    }

    async fn forward_resize(&self, exec_id: &str, size: TerminalSize) {
        if size.rows == 0 || size.cols == 0 {
            return;
        }
        if let Err(e) = self.gateway.resize_exec(exec_id, size.rows, size.cols).await {
            debug!(exec_id, error = %e, "Exec resize not applied");
        }
    }

    /// Close the session. Calling it again is a no-op.
    ///
    /// Returns only after the output pump has exited.
    pub async fn close(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let closing = self.shared.begin_close().await;

        self.release(&mut lifecycle).await;

        if closing {
            self.shared.finish_close().await;
            let container_id = self.container_id.read().await.clone();
            info!(container_id = ?container_id, "Exec session closed");
        }
    }

    /// Stop the pump and drop the stream halves
    async fn release(&self, lifecycle: &mut Option<Pump>) {
        if let Some(pump) = lifecycle.take() {
            pump.cancel.cancel();
            if let Err(e) = pump.task.await {
                warn!(error = %e, "Output pump task did not exit cleanly");
            }
        }

        // A writer blocked on a remote that stopped reading holds the lock
        self.input_cancel.read().await.cancel();
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Exec input already closed");
            }
        }
    }

    /// Drop all buffered output
    pub async fn clear_output(&self) {
        self.shared.output.clear().await;
        self.shared.notify().await;
    }

    /// Subscribe to state and output notifications
    pub fn subscribe(&self) -> watch::Receiver<SessionUpdate> {
        self.shared.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.shared.state().await
    }

    /// Exec ID assigned by the runtime, while connected or closing
    pub async fn exec_id(&self) -> Option<String> {
        self.shared.status.read().await.exec_id.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.shared.status.read().await.last_error.clone()
    }

    pub async fn container_id(&self) -> Option<String> {
        self.container_id.read().await.clone()
    }

    /// Shell of the current or last attempt
    pub async fn shell(&self) -> Option<String> {
        self.shell.read().await.clone()
    }

    pub async fn terminal_size(&self) -> TerminalSize {
        *self.size.read().await
    }

    pub fn options(&self) -> &ExecOptions {
        &self.options
    }

    /// Ordered copy of the buffered output chunks
    pub async fn output(&self) -> Vec<String> {
        self.shared.output.snapshot().await
    }

    pub async fn output_text(&self) -> String {
        self.shared.output.text().await
    }

    /// Buffered chunks appended at or after `seq`, and the next sequence
    pub async fn output_since(&self, seq: u64) -> (Vec<String>, u64) {
        self.shared.output.since(seq).await
    }
}

impl fmt::Debug for ExecSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecSession")
            .field("options", &self.options)
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, DuplexStream, ReadHalf, WriteHalf};

    use crate::gateway::{GatewayError, MockRuntimeGateway};

    /// Gateway whose exec streams are in-memory pipes
    #[derive(Default)]
    struct PipeGateway {
        platform: Option<String>,
        created: StdMutex<Vec<(String, ExecSpec)>>,
        resizes: StdMutex<Vec<(String, u16, u16)>>,
        remotes: StdMutex<VecDeque<DuplexStream>>,
        hang_on_create: bool,
        broken_input: bool,
    }

    impl PipeGateway {
        fn linux() -> Self {
            Self {
                platform: Some("linux".into()),
                ..Self::default()
            }
        }

        /// Remote end of the most recent attach
        fn take_remote(&self) -> (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>) {
            let remote = self.remotes.lock().unwrap().pop_front().expect("no attached stream");
            tokio::io::split(remote)
        }
    }

    #[async_trait]
    impl RuntimeGateway for PipeGateway {
        async fn create_exec(&self, container_id: &str, spec: &ExecSpec) -> Result<String, GatewayError> {
            if self.hang_on_create {
                std::future::pending::<()>().await;
            }
            let mut created = self.created.lock().unwrap();
            created.push((container_id.to_string(), spec.clone()));
            Ok(format!("exec-{}", created.len()))
        }

        async fn attach_exec(&self, _exec_id: &str, _tty: bool) -> Result<ExecStream, GatewayError> {
            let (local, remote) = tokio::io::duplex(1024);
            self.remotes.lock().unwrap().push_back(remote);
            if self.broken_input {
                let input = tokio_test::io::Builder::new()
                    .write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
                    .build();
                return Ok(ExecStream::new(local, input));
            }
            let (read, write) = tokio::io::split(local);
            Ok(ExecStream::new(read, write))
        }

        async fn inspect_platform(&self, container_id: &str) -> Result<String, GatewayError> {
            self.platform
                .clone()
                .ok_or_else(|| GatewayError::NotFound(container_id.to_string()))
        }

        async fn resize_exec(&self, exec_id: &str, rows: u16, cols: u16) -> Result<(), GatewayError> {
            self.resizes.lock().unwrap().push((exec_id.to_string(), rows, cols));
            Ok(())
        }
    }

    fn fast_options() -> ExecOptions {
        ExecOptions::default()
            .flush_interval(Duration::from_millis(5))
            .connect_timeout(Duration::from_secs(5))
    }

    async fn wait_for_output(session: &ExecSession, expected: &str) -> String {
        let mut updates = session.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let text = session.output_text().await;
                if text.contains(expected) {
                    return text;
                }
                updates.changed().await.expect("session dropped");
            }
        })
        .await
        .expect("output did not arrive")
    }

    async fn wait_for_state(session: &ExecSession, expected: SessionState) {
        let mut updates = session.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.state().await != expected {
                updates.changed().await.expect("session dropped");
            }
        })
        .await
        .expect("state not reached");
    }

    #[tokio::test]
    async fn test_open_send_and_echo() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());

        session.open("abc123", None).await.unwrap();
        assert_eq!(session.state().await, SessionState::Connected);
        assert_eq!(session.exec_id().await.as_deref(), Some("exec-1"));
        assert_eq!(session.shell().await.as_deref(), Some("/bin/sh"));

        let (mut remote_read, mut remote_write) = gateway.take_remote();

        session.send_input("ls\n").await.unwrap();
        let mut received = [0u8; 3];
        remote_read.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"ls\n");

        // echo back the way a tty would, in two writes
        remote_write.write_all(b"ls\r\n").await.unwrap();
        remote_write.write_all(b"bin etc\r\n").await.unwrap();

        let text = wait_for_output(&session, "bin etc").await;
        assert_eq!(text, "ls\r\nbin etc\r\n");

        session.close().await;
        assert_eq!(session.state().await, SessionState::Closed);
        assert_eq!(session.exec_id().await, None);
    }

    #[tokio::test]
    async fn test_exec_spec_uses_options_and_override() {
        let gateway = Arc::new(PipeGateway::linux());
        let options = fast_options().working_dir("/srv").user("app");
        let session = ExecSession::new(gateway.clone(), options);

        session.open("abc123", Some("/bin/bash -l")).await.unwrap();

        let created = gateway.created.lock().unwrap().clone();
        assert_eq!(
            created,
            vec![(
                "abc123".to_string(),
                ExecSpec {
                    command: vec!["/bin/bash".into(), "-l".into()],
                    tty: true,
                    working_dir: Some("/srv".into()),
                    user: Some("app".into()),
                }
            )]
        );
        session.close().await;
    }

    #[tokio::test]
    async fn test_windows_container_gets_powershell() {
        let gateway = Arc::new(PipeGateway {
            platform: Some("windows".into()),
            ..PipeGateway::default()
        });
        let session = ExecSession::new(gateway.clone(), fast_options());

        session.open("win1", None).await.unwrap();
        assert_eq!(session.shell().await.as_deref(), Some("powershell.exe"));
        session.close().await;
    }

    #[tokio::test]
    async fn test_inspection_failure_falls_back_to_sh() {
        let gateway = Arc::new(PipeGateway::default());
        let session = ExecSession::new(gateway.clone(), fast_options());

        session.open("abc123", None).await.unwrap();
        assert_eq!(session.shell().await.as_deref(), Some("/bin/sh"));
        session.close().await;
    }

    #[tokio::test]
    async fn test_send_input_when_not_connected_is_noop() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());

        assert!(session.send_input("ls\n").await.is_ok());
        assert_eq!(session.state().await, SessionState::Idle);
        assert!(session.output().await.is_empty());
        assert_eq!(session.last_error().await, None);

        session.open("abc123", None).await.unwrap();
        session.close().await;

        assert!(session.send_input("ls\n").await.is_ok());
        assert_eq!(session.state().await, SessionState::Closed);
    }

    #[tokio::test]
    async fn test_empty_input_is_ignored() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());
        session.open("abc123", None).await.unwrap();

        assert!(session.send_input("").await.is_ok());
        session.close().await;
    }

    #[tokio::test]
    async fn test_write_after_remote_closed_returns_error() {
        let gateway = Arc::new(PipeGateway {
            broken_input: true,
            ..PipeGateway::linux()
        });
        let session = ExecSession::new(gateway.clone(), fast_options());
        session.open("abc123", None).await.unwrap();

        let err = session.send_input("ls\n").await.unwrap_err();
        assert_eq!(err, IoError::StreamClosed);
        assert_eq!(session.state().await, SessionState::Connected);

        session.close().await;
    }

    #[tokio::test]
    async fn test_close_while_input_is_blocked() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());
        session.open("abc123", None).await.unwrap();

        // remote never reads, so a large write fills the pipe and parks
        let _remote = gateway.take_remote();
        let writer = {
            let session = session.clone();
            tokio::spawn(async move { session.send_input(&"x".repeat(64 * 1024)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), session.close())
            .await
            .expect("close hung behind a blocked write");
        assert_eq!(session.state().await, SessionState::Closed);

        let result = tokio::time::timeout(Duration::from_secs(2), writer)
            .await
            .expect("send_input hung")
            .unwrap();
        assert_eq!(result, Err(IoError::StreamClosed));
    }

    #[test]
    fn test_lifecycle_futures_are_send() {
        fn assert_send<T: Send>(_: &T) {}

        let session = ExecSession::new(Arc::new(PipeGateway::linux()), fast_options());
        let open = session.open("abc123", None);
        assert_send(&open);
        drop(open);
        let close = session.close();
        assert_send(&close);
        let input = session.send_input("ls\n");
        assert_send(&input);
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let gateway = Arc::new(PipeGateway {
            hang_on_create: true,
            ..PipeGateway::linux()
        });
        let options = fast_options().connect_timeout(Duration::from_millis(50));
        let session = ExecSession::new(gateway, options);

        let err = session.open("abc123", None).await.unwrap_err();
        assert!(matches!(err, ConnectError::Timeout(_)));
        assert_eq!(session.state().await, SessionState::Failed);
        assert_eq!(session.exec_id().await, None);

        let message = session.last_error().await.unwrap();
        assert!(message.contains("timed out"), "unexpected message: {}", message);
    }

    #[tokio::test]
    async fn test_gateway_timeout_maps_to_timeout() {
        let mut gateway = MockRuntimeGateway::new();
        gateway
            .expect_inspect_platform()
            .returning(|_| Ok("linux".to_string()));
        gateway
            .expect_create_exec()
            .returning(|_, _| Err(GatewayError::Timeout));

        let session = ExecSession::new(Arc::new(gateway), fast_options());
        let err = session.open("abc123", None).await.unwrap_err();

        assert_eq!(err, ConnectError::Timeout(None));
        assert_eq!(session.state().await, SessionState::Failed);
        assert!(session.last_error().await.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_container_is_other_error() {
        let mut gateway = MockRuntimeGateway::new();
        gateway
            .expect_create_exec()
            .returning(|id, _| Err(GatewayError::NotFound(format!("No such container: {}", id))));
        gateway.expect_attach_exec().never();

        let session = ExecSession::new(Arc::new(gateway), fast_options());
        let err = session.open("missing", Some("/bin/sh")).await.unwrap_err();

        assert!(matches!(err, ConnectError::Other(ref m) if m.contains("missing")));
        assert_eq!(session.state().await, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_open_preconditions() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());

        assert_eq!(session.open("  ", None).await, Err(ConnectError::InvalidContainer));
        assert_eq!(session.state().await, SessionState::Idle);

        session.open("abc123", None).await.unwrap();
        assert_eq!(session.open("abc123", None).await, Err(ConnectError::AlreadyOpen));

        session.close().await;
    }

    #[tokio::test]
    async fn test_reopen_after_close() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());

        session.open("abc123", None).await.unwrap();
        session.close().await;
        session.open("abc123", None).await.unwrap();

        assert_eq!(session.exec_id().await.as_deref(), Some("exec-2"));
        session.close().await;
    }

    #[tokio::test]
    async fn test_resize_before_connect_is_tracked_and_applied() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());

        session.resize(40, 120).await;
        assert_eq!(session.terminal_size().await, TerminalSize { rows: 40, cols: 120 });
        assert!(gateway.resizes.lock().unwrap().is_empty());

        session.open("abc123", None).await.unwrap();
        session.resize(50, 132).await;

        let resizes = gateway.resizes.lock().unwrap().clone();
        assert_eq!(
            resizes,
            vec![("exec-1".to_string(), 40, 120), ("exec-1".to_string(), 50, 132)]
        );
        session.close().await;
    }

    #[tokio::test]
    async fn test_resize_failure_is_ignored() {
        let mut gateway = MockRuntimeGateway::new();
        gateway.expect_create_exec().returning(|_, _| Ok("exec-9".to_string()));
        gateway.expect_attach_exec().returning(|_, _| {
            let (local, _remote) = tokio::io::duplex(64);
            let (read, write) = tokio::io::split(local);
            Ok(ExecStream::new(read, write))
        });
        gateway
            .expect_resize_exec()
            .returning(|_, _, _| Err(GatewayError::Unsupported("resize".into())));

        let session = ExecSession::new(Arc::new(gateway), fast_options());
        session.open("abc123", Some("/bin/sh")).await.unwrap();
        session.resize(30, 100).await;

        assert_eq!(session.terminal_size().await, TerminalSize { rows: 30, cols: 100 });
        session.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());

        session.close().await;
        assert_eq!(session.state().await, SessionState::Idle);

        session.open("abc123", None).await.unwrap();
        session.close().await;
        session.close().await;
        assert_eq!(session.state().await, SessionState::Closed);
    }

    #[tokio::test]
    async fn test_close_mid_read_waits_for_pump() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());
        session.open("abc123", None).await.unwrap();

        // remote stays open and silent: the pump is parked in a read
        let _remote = gateway.take_remote();
        tokio::task::yield_now().await;

        tokio::time::timeout(Duration::from_secs(5), session.close())
            .await
            .expect("close hung");

        assert_eq!(session.state().await, SessionState::Closed);
        assert!(session.lifecycle.lock().await.is_none());
        assert!(session.writer.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_remote_exit_closes_session() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());
        session.open("abc123", None).await.unwrap();

        let (remote_read, mut remote_write) = gateway.take_remote();
        remote_write.write_all(b"exit\r\n").await.unwrap();
        drop(remote_write);
        drop(remote_read);

        wait_for_state(&session, SessionState::Closed).await;
        assert_eq!(session.output_text().await, "exit\r\n");
        assert_eq!(session.exec_id().await, None);

        session.close().await;
        assert_eq!(session.state().await, SessionState::Closed);
    }

    #[tokio::test]
    async fn test_stream_error_fails_session() {
        let mut gateway = MockRuntimeGateway::new();
        gateway.expect_create_exec().returning(|_, _| Ok("exec-1".to_string()));
        gateway.expect_attach_exec().returning(|_, _| {
            let reader = tokio_test::io::Builder::new()
                .read(b"partial")
                .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
                .build();
            Ok(ExecStream::new(reader, tokio::io::sink()))
        });
        gateway.expect_resize_exec().returning(|_, _, _| Ok(()));

        let session = ExecSession::new(Arc::new(gateway), fast_options());
        session.open("abc123", Some("/bin/sh")).await.unwrap();

        wait_for_state(&session, SessionState::Failed).await;
        assert_eq!(session.output_text().await, "partial");
        let message = session.last_error().await.unwrap();
        assert!(message.contains("disconnected"), "unexpected message: {}", message);

        // input is dropped, close only releases resources
        assert!(session.send_input("ls\n").await.is_ok());
        session.close().await;
        assert_eq!(session.state().await, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_clear_output() {
        let gateway = Arc::new(PipeGateway::linux());
        let session = ExecSession::new(gateway.clone(), fast_options());
        session.open("abc123", None).await.unwrap();

        let (_remote_read, mut remote_write) = gateway.take_remote();
        remote_write.write_all(b"hello").await.unwrap();
        wait_for_output(&session, "hello").await;

        session.clear_output().await;
        assert!(session.output().await.is_empty());
        session.close().await;
    }
}
