//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that observe the engine from
//! the outside without implementing real transports.

use intake_core::config::EngineConfig;
use intake_core::error::Result;
use intake_core::store::MemoryRecordStore;
use intake_core::traits::{
    AppendOutcome, CandidateRecord, ConversationId, InboundMessage, RecordStore,
    RegistrationRecord, Transport, TransportEvent,
};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// A transport fed by the test through a channel, recording every reply
#[derive(Clone)]
pub struct ScriptedTransport {
    /// Sender for test to push events; `None` once closed
    test_tx: Arc<std::sync::Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>>,
    /// Receiver for the engine's event stream
    engine_rx: Arc<std::sync::Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>>,
    /// Replies in send order
    sent: Arc<std::sync::Mutex<Vec<(ConversationId, String)>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        let (test_tx, engine_rx) = mpsc::unbounded_channel();

        Self {
            test_tx: Arc::new(std::sync::Mutex::new(Some(test_tx))),
            engine_rx: Arc::new(std::sync::Mutex::new(Some(engine_rx))),
            sent: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Deliver a chat message to the engine
    pub fn say(&self, conversation_id: &str, text: &str) {
        self.emit(TransportEvent::Message(InboundMessage::new(conversation_id, text)));
    }

    /// Deliver a lifecycle event to the engine
    pub fn emit(&self, event: TransportEvent) {
        if let Some(tx) = self.test_tx.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// End the event stream after everything already sent
    pub fn close(&self) {
        self.test_tx.lock().unwrap().take();
    }

    /// All replies in send order
    pub fn sent(&self) -> Vec<(ConversationId, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Replies sent to one conversation, in order
    pub fn replies_for(&self, conversation_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id.as_str() == conversation_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Wait until at least `count` replies were sent
    pub async fn wait_for_replies(&self, count: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while self.sent.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        assert!(
            waited.is_ok(),
            "expected {} replies, got {}",
            count,
            self.sent.lock().unwrap().len()
        );
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    fn events(&self) -> Pin<Box<dyn Stream<Item = TransportEvent> + Send + 'static>> {
        // Take the receiver (only called once)
        let rx = self
            .engine_rx
            .lock()
            .unwrap()
            .take()
            .expect("events() can only be called once");

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }

    async fn send(&self, conversation_id: &ConversationId, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id.clone(), text.to_string()));
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// A transport that never delivers anything (for idle testing)
pub struct IdleTransport;

#[async_trait::async_trait]
impl Transport for IdleTransport {
    fn events(&self) -> Pin<Box<dyn Stream<Item = TransportEvent> + Send + 'static>> {
        Box::pin(tokio_stream::pending())
    }

    async fn send(&self, _conversation_id: &ConversationId, _text: &str) -> Result<()> {
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "idle"
    }
}

/// A memory store that counts calls
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: MemoryRecordStore,
    append_call_count: Arc<AtomicUsize>,
    flush_call_count: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of times append() was called
    pub fn append_call_count(&self) -> usize {
        self.append_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times flush() was called
    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordStore for CountingStore {
    async fn append(&self, candidate: CandidateRecord) -> Result<AppendOutcome> {
        self.append_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.append(candidate).await
    }

    async fn records(&self) -> Result<Vec<RegistrationRecord>> {
        self.inner.records().await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }

    fn descriptor(&self) -> &'static str {
        "counting"
    }
}

/// The seven messages of a complete registration
pub fn registration_script(name: &str, contact: &str, email: &str) -> Vec<String> {
    ["register", name, contact, email, "CS", "USA", "MIT"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// A complete candidate for direct saves
pub fn candidate(name: &str, contact: &str, email: &str) -> CandidateRecord {
    CandidateRecord {
        name: name.to_string(),
        contact: contact.to_string(),
        email: email.to_string(),
        course: "CS".to_string(),
        country: "USA".to_string(),
        university: "MIT".to_string(),
    }
}

/// Helper to create a minimal EngineConfig for testing
pub fn minimal_config() -> EngineConfig {
    EngineConfig {
        session_idle_timeout_secs: 0,
        sweep_interval_secs: 1,
        event_channel_capacity: 100,
    }
}
