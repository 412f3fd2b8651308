// # Transport Trait
//
// Defines the interface to the external messaging transport.
//
// ## Implementations
//
// - Line-delimited JSON over stdin/stdout: `intake-transport-stdio` crate
// - Future: chat-platform bridges
//
// ## Usage
//
// ```rust,ignore
// use intake_core::traits::{Transport, TransportEvent};
// use tokio_stream::StreamExt;
//
// let mut events = transport.events();
// while let Some(event) = events.next().await {
//     if let TransportEvent::Message(message) = event {
//         transport.send(&message.conversation_id, "hello").await?;
//     }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;

/// Opaque identifier of a chat, stable across messages in one exchange
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A text message delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub conversation_id: ConversationId,
    pub text: String,
}

impl InboundMessage {
    pub fn new(conversation_id: impl Into<ConversationId>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: text.into(),
        }
    }
}

/// Events delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Transport is connected and replies can be sent
    Ready,
    /// Transport could not authenticate; replies will not be delivered
    AuthenticationFailed { reason: String },
    /// Inbound text message
    Message(InboundMessage),
}

/// Trait for messaging transport implementations
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform protocol I/O (sockets, pipes, platform SDKs)
/// - ⚠️ Spawn tasks ONLY to read inbound events
///
/// ## Forbidden Capabilities
/// - ❌ Interpret message content (owned by the dispatcher)
/// - ❌ Access the record store
/// - ❌ Hold per-conversation state
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stream of inbound events
    ///
    /// Called once by the engine. The stream ends when the transport closes.
    fn events(&self) -> Pin<Box<dyn Stream<Item = TransportEvent> + Send + 'static>>;

    /// Send a reply to a conversation
    ///
    /// # Returns
    ///
    /// - `Ok(())`: handed to the transport
    /// - `Err(Error::Transport)`: the reply could not be sent
    async fn send(&self, conversation_id: &ConversationId, text: &str) -> Result<(), crate::Error>;

    /// Transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
