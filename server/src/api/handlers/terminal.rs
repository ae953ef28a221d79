//! Interactive container terminal over WebSocket
//!
//! Each socket owns one [`ExecSession`]. Client frames drive the session,
//! session notifications are forwarded as output and state frames.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::exec::{ExecSession, SessionHandle, SessionState};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TerminalQuery {
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub rows: Option<u16>,
    #[serde(default)]
    pub cols: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// Frames sent by the browser terminal
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Input { data: String },
    Resize { rows: u16, cols: u16 },
    Clear,
}

/// Frames sent to the browser terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    State {
        state: SessionState,
        container_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exec_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        shell: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Output { data: String },
    Error { message: String },
}

type Sender = SplitSink<WebSocket, Message>;

/// Pending input chunks per socket before new input is refused
const INPUT_QUEUE: usize = 64;

/// WebSocket upgrade for `/containers/:id/terminal`
pub async fn terminal_handler(
    ws: WebSocketUpgrade,
    Path(container_id): Path<String>,
    Query(query): Query<TerminalQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_terminal(socket, container_id, query, state))
}

async fn send_frame(sender: &mut Sender, frame: &ServerFrame) -> bool {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "Failed to encode terminal frame");
            return false;
        }
    };
    sender.send(Message::Text(text)).await.is_ok()
}

async fn state_frame(session: &ExecSession, container_id: &str, state: SessionState) -> ServerFrame {
    let message = match state {
        SessionState::Failed => session.last_error().await,
        _ => None,
    };
    ServerFrame::State {
        state,
        container_id: container_id.to_string(),
        exec_id: session.exec_id().await,
        shell: session.shell().await,
        message,
    }
}

/// Write queued input to the session outside the socket loop.
///
/// A remote that stops reading stalls only this task; the socket loop keeps
/// handling close frames and `close` cancels the pending write.
fn spawn_input_forwarder(
    session: SessionHandle,
    mut input: mpsc::Receiver<String>,
    errors: mpsc::Sender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(data) = input.recv().await {
            if let Err(e) = session.send_input(&data).await {
                if errors.send(e.to_string()).await.is_err() {
                    break;
                }
            }
        }
    })
}

/// Apply one client frame to the session. Returns an error frame to report.
async fn apply_client_frame(
    session: &ExecSession,
    input: &mpsc::Sender<String>,
    frame: ClientFrame,
) -> Option<ServerFrame> {
    match frame {
        ClientFrame::Input { data } => match input.try_send(data) {
            Ok(()) | Err(TrySendError::Closed(_)) => None,
            Err(TrySendError::Full(_)) => Some(ServerFrame::Error {
                message: "Terminal input is not being consumed, input dropped".to_string(),
            }),
        },
        ClientFrame::Resize { rows, cols } => {
            session.resize(rows, cols).await;
            None
        }
        ClientFrame::Clear => {
            session.clear_output().await;
            None
        }
    }
}

async fn handle_terminal(socket: WebSocket, container_id: String, query: TerminalQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut options = state.config.exec.session_options();
    if let Some(user) = query.user.filter(|u| !u.is_empty()) {
        options = options.user(user);
    }
    if let Some(dir) = query.working_dir.filter(|d| !d.is_empty()) {
        options = options.working_dir(dir);
    }
    let rows = query.rows.unwrap_or(options.rows);
    let cols = query.cols.unwrap_or(options.cols);
    options = options.terminal_size(rows, cols);

    let session: SessionHandle = ExecSession::new(state.runtime.clone(), options);
    let mut updates = session.subscribe();

    info!(container_id = %container_id, shell = ?query.shell, "Terminal WebSocket connected");

    let connecting = ServerFrame::State {
        state: SessionState::Connecting,
        container_id: container_id.clone(),
        exec_id: None,
        shell: query.shell.clone(),
        message: None,
    };
    if !send_frame(&mut sender, &connecting).await {
        return;
    }

    if let Err(e) = session.open(&container_id, query.shell.as_deref()).await {
        warn!(container_id = %container_id, error = %e, "Terminal session failed to open");
        let failed = state_frame(&session, &container_id, session.state().await).await;
        let _ = send_frame(&mut sender, &failed).await;
        let _ = send_frame(&mut sender, &ServerFrame::Error { message: e.to_string() }).await;
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    // open succeeded: Connected precedes any output, even from a remote that already exited
    let mut last_state = SessionState::Connected;
    let frame = state_frame(&session, &container_id, last_state).await;
    if !send_frame(&mut sender, &frame).await {
        session.close().await;
        return;
    }

    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE);
    let (error_tx, mut input_errors) = mpsc::channel(INPUT_QUEUE);
    let forwarder = spawn_input_forwarder(session.clone(), input_rx, error_tx);

    let mut cursor = 0u64;
    loop {
        tokio::select! {
            Some(message) = input_errors.recv() => {
                if !send_frame(&mut sender, &ServerFrame::Error { message }).await {
                    break;
                }
            }

            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let update = *updates.borrow_and_update();

                let (chunks, next) = session.output_since(cursor).await;
                cursor = next;
                if !chunks.is_empty() {
                    let output = ServerFrame::Output { data: chunks.concat() };
                    if !send_frame(&mut sender, &output).await {
                        break;
                    }
                }

                if update.state != last_state {
                    last_state = update.state;
                    let frame = state_frame(&session, &container_id, last_state).await;
                    if !send_frame(&mut sender, &frame).await {
                        break;
                    }
                }

                if last_state.is_finished() {
                    debug!(container_id = %container_id, state = %last_state, "Terminal session finished");
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => apply_client_frame(&session, &input_tx, frame).await,
                            Err(e) => Some(ServerFrame::Error {
                                message: format!("Invalid terminal frame: {}", e),
                            }),
                        };
                        if let Some(reply) = reply {
                            if !send_frame(&mut sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let frame = ClientFrame::Input { data: String::from_utf8_lossy(&bytes).into_owned() };
                        if let Some(reply) = apply_client_frame(&session, &input_tx, frame).await {
                            if !send_frame(&mut sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(container_id = %container_id, "Terminal WebSocket closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(container_id = %container_id, error = %e, "Terminal WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    session.close().await;
    drop(input_tx);
    drop(input_errors);
    if let Err(e) = forwarder.await {
        warn!(container_id = %container_id, error = %e, "Terminal input task did not exit cleanly");
    }
    let _ = sender.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::exec::ExecOptions;
    use crate::gateway::MockRuntimeGateway;

    #[test]
    fn test_parse_client_frames() {
        let input: ClientFrame = serde_json::from_str(r#"{"type":"input","data":"ls\n"}"#).unwrap();
        assert_eq!(input, ClientFrame::Input { data: "ls\n".into() });

        let resize: ClientFrame = serde_json::from_str(r#"{"type":"resize","rows":40,"cols":120}"#).unwrap();
        assert_eq!(resize, ClientFrame::Resize { rows: 40, cols: 120 });

        let clear: ClientFrame = serde_json::from_str(r#"{"type":"clear"}"#).unwrap();
        assert_eq!(clear, ClientFrame::Clear);

        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"bogus"}"#).is_err());
    }

    #[test]
    fn test_state_frame_encoding() {
        let frame = ServerFrame::State {
            state: SessionState::Connected,
            container_id: "abc123".into(),
            exec_id: Some("exec-1".into()),
            shell: Some("/bin/sh".into()),
            message: None,
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "state",
                "state": "connected",
                "container_id": "abc123",
                "exec_id": "exec-1",
                "shell": "/bin/sh",
            })
        );

        let output = serde_json::to_value(ServerFrame::Output { data: "hi".into() }).unwrap();
        assert_eq!(output, serde_json::json!({ "type": "output", "data": "hi" }));
    }

    #[tokio::test]
    async fn test_input_is_queued_not_written_inline() {
        let session = ExecSession::new(Arc::new(MockRuntimeGateway::new()), ExecOptions::default());
        let (input, mut queued) = mpsc::channel(1);

        let reply = apply_client_frame(&session, &input, ClientFrame::Input { data: "ls\n".into() }).await;
        assert_eq!(reply, None);
        assert_eq!(queued.try_recv().unwrap(), "ls\n");

        // a stalled forwarder leaves the queue full; the loop reports instead of waiting
        input.try_send("pending".into()).unwrap();
        let reply = apply_client_frame(&session, &input, ClientFrame::Input { data: "more".into() }).await;
        assert!(matches!(reply, Some(ServerFrame::Error { .. })));
    }
}
