//! Server-sent events framing
//!
//! Only `data:` fields matter to the dashboard; `event:`, `id:`, `retry:` and
//! comment lines are skipped. An event is dispatched on the blank line that
//! ends it, and chunk boundaries may fall anywhere, including inside a
//! multi-byte character.

use super::EventStream;
use crate::error::DashboardError;
use bytes::{Buf, BytesMut};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Incremental SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the payload of every event completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw = self.buffer.split_to(pos);
            self.buffer.advance(1);

            let mut line = String::from_utf8_lossy(&raw).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }

            if let Some(value) = line.strip_prefix("data:") {
                let value = value.strip_prefix(' ').unwrap_or(value);
                self.data.push(value.to_string());
            }
        }

        events
    }
}

/// Turn a streaming HTTP response into an [`EventStream`] of `data` payloads
///
/// The body is drained by a background task; dropping the returned stream
/// stops that task at the next event.
pub fn event_stream(response: reqwest::Response, label: &'static str) -> EventStream {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for payload in decoder.push(&bytes) {
                        if tx.send(Ok(payload)).is_err() {
                            debug!(stream = label, "Event consumer dropped");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(stream = label, error = %e, "Stream body error");
                    let _ = tx.send(Err(DashboardError::transport(e)));
                    return;
                }
            }
        }

        debug!(stream = label, "Stream ended by server");
    });

    Box::pin(UnboundedReceiverStream::new(rx))
}
