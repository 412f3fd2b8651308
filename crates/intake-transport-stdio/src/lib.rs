// # Line Transport
//
// This crate provides a line-delimited JSON transport for the intake engine.
//
// ## Purpose
//
// A chat platform adapter can run the daemon as a child process and speak
// one JSON object per line:
//
// ```text
// in:  {"conversation_id": "42", "text": "register"}
// out: {"conversation_id": "42", "text": "Welcome to registration! ..."}
// ```
//
// It also serves for local testing and scripted replays.
//
// ## Architecture
//
// Input lines are mapped lazily onto `TransportEvent`s; the stream owns the
// reader, so dropping it releases stdin. `Ready` is emitted first since the
// pipe needs no authentication. Malformed lines are logged and skipped.

use intake_core::traits::{ConversationId, InboundMessage, Transport, TransportEvent};
use intake_core::{Error, Result};

use serde::Serialize;
use std::pin::Pin;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::{Stream, StreamExt};

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// One outbound reply line
#[derive(Debug, Serialize)]
struct OutboundLine<'a> {
    conversation_id: &'a ConversationId,
    text: &'a str,
}

/// Line-delimited JSON transport over any reader/writer pair
pub struct LineTransport {
    /// Input, taken by the first `events()` call
    reader: std::sync::Mutex<Option<Reader>>,

    /// Output; one reply is written at a time
    writer: Mutex<Writer>,
}

impl LineTransport {
    /// Create a transport over an arbitrary reader and writer
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: std::sync::Mutex::new(Some(Box::new(reader))),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Create a transport over the process stdin/stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

/// Parse one input line; `None` for blank or malformed lines
fn parse_line(line: &str) -> Option<TransportEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<InboundMessage>(line) {
        Ok(message) => Some(TransportEvent::Message(message)),
        Err(e) => {
            tracing::warn!("Skipping malformed input line: {}", e);
            None
        }
    }
}

#[async_trait::async_trait]
impl Transport for LineTransport {
    fn events(&self) -> Pin<Box<dyn Stream<Item = TransportEvent> + Send + 'static>> {
        let reader = self
            .reader
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or_else(|poisoned| poisoned.into_inner().take());

        let Some(reader) = reader else {
            tracing::warn!("Line transport input already consumed");
            return Box::pin(tokio_stream::empty());
        };

        tracing::info!("Reading line-delimited JSON messages");

        let messages = LinesStream::new(reader.lines())
            .map_while(|line| match line {
                Ok(line) => Some(parse_line(&line)),
                Err(e) => {
                    tracing::error!("Failed to read input: {}", e);
                    None
                }
            })
            .filter_map(|event| event);

        Box::pin(tokio_stream::once(TransportEvent::Ready).chain(messages))
    }

    async fn send(&self, conversation_id: &ConversationId, text: &str) -> Result<()> {
        let mut line = serde_json::to_vec(&OutboundLine {
            conversation_id,
            text,
        })?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| Error::transport(format!("Failed to write reply: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::transport(format!("Failed to flush reply: {}", e)))?;

        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "stdio"
    }
}
