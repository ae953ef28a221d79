//! Output pump: drains an exec stream into the session's output buffer

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::gateway::ExecReader;
use crate::metrics;

use super::decode::Utf8Decoder;
use super::session::Shared;

#[derive(Debug, Clone, Copy)]
pub(crate) struct PumpSettings {
    /// Bytes per read
    pub chunk_size: usize,
    /// Chunks appended before observers are notified
    pub notify_batch: usize,
    /// Quiet period after which pending chunks are announced anyway
    pub flush_interval: Duration,
}

enum Event {
    Cancelled,
    Quiet,
    Read(io::Result<usize>),
}

/// Read loop of a connected session. Exits on end of stream, stream error or
/// cancellation; only the first two change the session state.
pub(crate) async fn run(
    shared: Arc<Shared>,
    mut reader: ExecReader,
    settings: PumpSettings,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; settings.chunk_size];
    let mut decoder = Utf8Decoder::new();
    let mut pending = 0usize;

    let failure = loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => Event::Cancelled,
            _ = tokio::time::sleep(settings.flush_interval), if pending > 0 => Event::Quiet,
            read = reader.read(&mut buf) => Event::Read(read),
        };

        match event {
            Event::Cancelled => {
                debug!("Exec read loop cancelled");
                break None;
            }
            Event::Quiet => {
                shared.notify().await;
                pending = 0;
            }
            Event::Read(Ok(0)) => {
                debug!("Exec stream reached EOF");
                break None;
            }
            Event::Read(Ok(n)) => {
                metrics::record_output_bytes(n);
                let text = decoder.decode(&buf[..n]);
                if !text.is_empty() {
                    shared.output.push(text).await;
                    pending += 1;
                }
                if pending >= settings.notify_batch {
                    shared.notify().await;
                    pending = 0;
                }
            }
            Event::Read(Err(e)) => break Some(e),
        }
    };

    let tail = decoder.finish();
    if !tail.is_empty() {
        shared.output.push(tail).await;
        pending += 1;
    }

    match failure {
        Some(e) => {
            error!(error = %e, "Error in exec read loop");
            shared
                .fail_stream(format!("Session disconnected, the container may have stopped: {}", e))
                .await;
        }
        None if cancel.is_cancelled() => {
            if pending > 0 {
                shared.notify().await;
            }
        }
        None => {
            if !shared.end_of_stream().await && pending > 0 {
                shared.notify().await;
            }
        }
    }
}
