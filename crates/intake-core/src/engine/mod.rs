//! Conversation engine
//!
//! The ConversationEngine is responsible for:
//! - Receiving messages and lifecycle events from the Transport
//! - Owning the table of live registration sessions
//! - Routing each message through the dispatcher and session state machine
//! - Persisting completed registrations via the RecordStore
//! - Sending exactly one reply per processed message
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Transport  │─── TransportEvent ───┐
//! └─────────────┘                      │
//!        ▲                             ▼
//!        │                  ┌────────────────────┐
//!        └──── send() ──────│ ConversationEngine │
//!                           └────────────────────┘
//!                                      │
//!         ┌────────────────────────────┼───────────────────────────┐
//!         │                            │                           │
//!         ▼                            ▼                           ▼
//! ┌───────────────┐          ┌──────────────────┐          ┌─────────────┐
//! │ dispatch +    │          │   RecordStore    │          │   Events    │
//! │ SessionTable  │          │   (append)       │          │  (notify)   │
//! └───────────────┘          └──────────────────┘          └─────────────┘
//! ```
//!
//! ## Message Flow
//!
//! 1. Message arrives and is queued on its conversation's lane
//! 2. Dispatcher picks session continuation, a command, or the fallback
//! 3. Session validates and advances (or re-prompts)
//! 4. On completion the session is discarded and the candidate appended
//! 5. The reply is sent through the transport

use crate::config::EngineConfig;
use crate::dispatch::{self, Command, Route};
use crate::error::{Error, Result};
use crate::replies;
use crate::session::{SessionTable, Step, Transition};
use crate::traits::{
    AppendOutcome, CandidateRecord, ConversationId, DuplicateField, InboundMessage, RecordStore,
    Transport, TransportEvent,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Events emitted by the ConversationEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started,

    /// Transport reported it can send
    TransportReady,

    /// Transport failed to authenticate
    TransportAuthFailed { reason: String },

    /// Registration session started
    SessionStarted {
        conversation_id: ConversationId,
        /// An in-progress session was discarded
        replaced: bool,
    },

    /// Field value accepted
    FieldAccepted {
        conversation_id: ConversationId,
        step: Step,
    },

    /// Field value rejected by its validator
    FieldRejected {
        conversation_id: ConversationId,
        step: Step,
    },

    /// Completed registration stored
    RegistrationSaved {
        conversation_id: ConversationId,
        email: String,
    },

    /// Completed registration collided with an existing record
    RegistrationDuplicate {
        conversation_id: ConversationId,
        field: DuplicateField,
    },

    /// Completed registration could not be stored
    RegistrationFailed {
        conversation_id: ConversationId,
        error: String,
    },

    /// Idle session evicted
    SessionEvicted { conversation_id: ConversationId },

    /// Engine stopped
    Stopped { reason: String },
}

/// Next step once the session table lock is released
enum Action {
    Reply(String),
    Persist(CandidateRecord),
}

/// Per-conversation FIFO queue feeding one worker task
struct Lane {
    tx: mpsc::UnboundedSender<InboundMessage>,
    /// Messages queued or being processed
    pending: Arc<AtomicUsize>,
}

struct EngineInner {
    transport: Box<dyn Transport>,
    store: Arc<dyn RecordStore>,
    sessions: Mutex<SessionTable>,
    session_idle_timeout: Option<Duration>,
    sweep_interval: Duration,
    transport_ready: AtomicBool,
    /// Set by an authentication failure until the next `Ready`
    transport_failed: AtomicBool,
    event_tx: mpsc::Sender<EngineEvent>,
}

/// Core conversation engine
///
/// ## Lifecycle
///
/// 1. Create with [`ConversationEngine::new()`]
/// 2. Start with [`ConversationEngine::run()`]
/// 3. Engine runs until shutdown signal received or the transport closes
/// 4. Drop to cleanup
///
/// ## Threading
///
/// Messages of one conversation are processed strictly in arrival order;
/// different conversations proceed independently. The engine is cheap to
/// clone; clones share sessions, store and transport.
#[derive(Clone)]
pub struct ConversationEngine {
    inner: Arc<EngineInner>,
}

impl ConversationEngine {
    /// Create a new conversation engine
    ///
    /// # Parameters
    ///
    /// - `transport`: Messaging transport implementation
    /// - `store`: Record store, possibly shared with other producers
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        transport: Box<dyn Transport>,
        store: Arc<dyn RecordStore>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            inner: Arc::new(EngineInner {
                transport,
                store,
                sessions: Mutex::new(SessionTable::new()),
                session_idle_timeout: config.session_idle_timeout(),
                sweep_interval: config.sweep_interval(),
                transport_ready: AtomicBool::new(false),
                transport_failed: AtomicBool::new(false),
                event_tx: tx,
            }),
        };

        Ok((engine, rx))
    }

    /// Run the engine until Ctrl-C or until the transport closes
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine with a programmatic shutdown signal
    ///
    /// The daemon uses this to stop on SIGTERM; tests use it for controlled
    /// shutdown. `None` falls back to Ctrl-C.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(EngineEvent::Started);
        info!(
            "Conversation engine started (transport: {}, storage: {})",
            self.inner.transport.transport_name(),
            self.inner.store.descriptor()
        );

        let mut events = self.inner.transport.events();
        let mut lanes: HashMap<ConversationId, Lane> = HashMap::new();
        let mut workers = JoinSet::new();

        let period = self.inner.sweep_interval;
        let start = time::Instant::now()
            .checked_add(period)
            .unwrap_or_else(time::Instant::now);
        let mut sweep = time::interval_at(start, period);
        sweep.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        // Main event loop
        let reason = loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(TransportEvent::Message(message)) => {
                        self.enqueue(&mut lanes, &mut workers, message);
                    }
                    Some(TransportEvent::Ready) => self.on_transport_ready(),
                    Some(TransportEvent::AuthenticationFailed { reason }) => {
                        self.on_transport_auth_failed(reason);
                    }
                    None => break "Transport closed",
                },

                _ = sweep.tick() => self.sweep(&mut lanes).await,

                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = joined {
                        error!("Conversation worker failed: {}", e);
                    }
                }

                _ = &mut shutdown => break "Shutdown signal",
            }
        };

        info!("{}, draining conversations", reason);

        // Closing every lane lets each worker finish its queue and exit
        drop(lanes);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Conversation worker failed: {}", e);
            }
        }

        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });

        self.inner.store.flush().await?;
        info!("Store flushed, engine stopped");

        Ok(())
    }

    /// Process one inbound message to completion and send its reply
    ///
    /// # Returns
    ///
    /// - `Ok(())`: reply handed to the transport
    /// - `Err(Error::Transport)`: the reply could not be sent, or the transport
    ///   failed authentication; session state has already been updated
    pub async fn handle_message(&self, message: InboundMessage) -> Result<()> {
        let InboundMessage {
            conversation_id,
            text,
        } = message;
        debug!("Message from {}: {:?}", conversation_id, text);

        let reply = match self.route(&conversation_id, &text).await {
            Action::Reply(reply) => reply,
            Action::Persist(candidate) => self.persist(&conversation_id, candidate).await,
        };

        if self.inner.transport_failed.load(Ordering::SeqCst) {
            return Err(Error::transport(format!(
                "Transport {} is not authenticated; reply to {} dropped",
                self.inner.transport.transport_name(),
                conversation_id
            )));
        }

        if !self.inner.transport_ready.load(Ordering::SeqCst) {
            warn!(
                "Transport {} has not reported ready; reply to {} may not be delivered",
                self.inner.transport.transport_name(),
                conversation_id
            );
        }

        self.inner
            .transport
            .send(&conversation_id, &reply)
            .await
            .map_err(|e| match e {
                Error::Transport(_) => e,
                other => Error::transport(other.to_string()),
            })
    }

    /// Dispatch under the session table lock
    async fn route(&self, conversation_id: &ConversationId, text: &str) -> Action {
        let now = Instant::now();
        let mut sessions = self.inner.sessions.lock().await;

        match dispatch::dispatch(&sessions, conversation_id, text) {
            Route::ContinueSession => {
                let Some(session) = sessions.get_mut(conversation_id) else {
                    return Action::Reply(replies::UNKNOWN_COMMAND.to_string());
                };

                let step = session.current_step();
                match session.advance(text, now) {
                    Transition::Advanced { prompt, .. } => {
                        debug!("{} accepted {}", conversation_id, step);
                        self.emit_event(EngineEvent::FieldAccepted {
                            conversation_id: conversation_id.clone(),
                            step,
                        });
                        Action::Reply(prompt.to_string())
                    }
                    Transition::Rejected { step, prompt } => {
                        warn!("{} sent an invalid {}", conversation_id, step);
                        self.emit_event(EngineEvent::FieldRejected {
                            conversation_id: conversation_id.clone(),
                            step,
                        });
                        Action::Reply(prompt.to_string())
                    }
                    Transition::Complete(candidate) => {
                        // Discarded regardless of the persistence outcome
                        sessions.remove(conversation_id);
                        self.emit_event(EngineEvent::FieldAccepted {
                            conversation_id: conversation_id.clone(),
                            step,
                        });
                        Action::Persist(candidate)
                    }
                }
            }

            Route::Command(Command::StartRegistration) => {
                let replaced = sessions.start(conversation_id.clone(), now);
                if replaced {
                    warn!("{} restarted registration, discarding answers", conversation_id);
                } else {
                    info!("{} started registration", conversation_id);
                }
                self.emit_event(EngineEvent::SessionStarted {
                    conversation_id: conversation_id.clone(),
                    replaced,
                });
                Action::Reply(replies::welcome())
            }

            Route::Command(Command::Greeting) => Action::Reply(replies::GREETING.to_string()),

            Route::Command(Command::Help) => Action::Reply(replies::HELP.to_string()),

            Route::Unknown => {
                debug!("Unknown command from {}", conversation_id);
                Action::Reply(replies::UNKNOWN_COMMAND.to_string())
            }
        }
    }

    /// Append a completed registration and build the outcome reply
    async fn persist(&self, conversation_id: &ConversationId, candidate: CandidateRecord) -> String {
        match self.inner.store.append(candidate).await {
            Ok(AppendOutcome::Inserted(record)) => {
                info!("Registration saved for {}: {}", conversation_id, record.email);
                self.emit_event(EngineEvent::RegistrationSaved {
                    conversation_id: conversation_id.clone(),
                    email: record.email.clone(),
                });
                replies::registration_complete(&record)
            }
            Ok(AppendOutcome::Duplicate { field }) => {
                info!("Duplicate registration from {} ({})", conversation_id, field);
                self.emit_event(EngineEvent::RegistrationDuplicate {
                    conversation_id: conversation_id.clone(),
                    field,
                });
                replies::DUPLICATE.to_string()
            }
            Err(e) => {
                error!("Failed to save registration for {}: {}", conversation_id, e);
                self.emit_event(EngineEvent::RegistrationFailed {
                    conversation_id: conversation_id.clone(),
                    error: e.to_string(),
                });
                match e {
                    Error::StorageLocked { medium } => replies::storage_locked(&medium),
                    _ => replies::STORAGE_FAILURE.to_string(),
                }
            }
        }
    }

    /// Queue a message on its conversation's lane, opening one if needed
    fn enqueue(
        &self,
        lanes: &mut HashMap<ConversationId, Lane>,
        workers: &mut JoinSet<()>,
        message: InboundMessage,
    ) {
        let id = message.conversation_id.clone();
        let lane = lanes
            .entry(id.clone())
            .or_insert_with(|| self.spawn_lane(workers, &id));

        lane.pending.fetch_add(1, Ordering::SeqCst);
        let Err(mpsc::error::SendError(message)) = lane.tx.send(message) else {
            return;
        };

        // The worker is gone; replace the lane
        warn!("Lane for {} closed unexpectedly, reopening", id);
        let lane = self.spawn_lane(workers, &id);
        lane.pending.fetch_add(1, Ordering::SeqCst);
        if lane.tx.send(message).is_err() {
            error!("Failed to queue message from {}", id);
        }
        lanes.insert(id, lane);
    }

    fn spawn_lane(&self, workers: &mut JoinSet<()>, conversation_id: &ConversationId) -> Lane {
        debug!("Opening lane for {}", conversation_id);

        let (tx, mut rx) = mpsc::unbounded_channel::<InboundMessage>();
        let pending = Arc::new(AtomicUsize::new(0));

        let engine = self.clone();
        let worker_pending = Arc::clone(&pending);
        workers.spawn(async move {
            while let Some(message) = rx.recv().await {
                let conversation_id = message.conversation_id.clone();
                if let Err(e) = engine.handle_message(message).await {
                    error!("Failed to handle message from {}: {}", conversation_id, e);
                }
                worker_pending.fetch_sub(1, Ordering::SeqCst);
            }
        });

        Lane { tx, pending }
    }

    /// Periodic housekeeping: evict idle sessions, close idle lanes
    async fn sweep(&self, lanes: &mut HashMap<ConversationId, Lane>) {
        self.evict_idle_sessions(Instant::now()).await;

        let sessions = self.inner.sessions.lock().await;
        let before = lanes.len();
        lanes.retain(|id, lane| lane.pending.load(Ordering::SeqCst) > 0 || sessions.contains(id));

        if lanes.len() < before {
            debug!("Closed {} idle lane(s)", before - lanes.len());
        }
    }

    /// Evict sessions idle longer than the configured timeout
    ///
    /// Does nothing when no timeout is configured.
    pub async fn evict_idle_sessions(&self, now: Instant) -> Vec<ConversationId> {
        let Some(timeout) = self.inner.session_idle_timeout else {
            return Vec::new();
        };

        let evicted = self.inner.sessions.lock().await.evict_idle(now, timeout);
        for conversation_id in &evicted {
            info!("Evicted idle session for {}", conversation_id);
            self.emit_event(EngineEvent::SessionEvicted {
                conversation_id: conversation_id.clone(),
            });
        }

        evicted
    }

    /// Current step of a conversation's session, if one is active
    pub async fn session_step(&self, conversation_id: &ConversationId) -> Option<Step> {
        self.inner
            .sessions
            .lock()
            .await
            .get(conversation_id)
            .map(|s| s.current_step())
    }

    /// Number of active sessions
    pub async fn active_sessions(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// Whether the transport has reported ready
    pub fn is_transport_ready(&self) -> bool {
        self.inner.transport_ready.load(Ordering::SeqCst)
    }

    fn on_transport_ready(&self) {
        info!("Transport {} ready", self.inner.transport.transport_name());
        self.inner.transport_ready.store(true, Ordering::SeqCst);
        self.inner.transport_failed.store(false, Ordering::SeqCst);
        self.emit_event(EngineEvent::TransportReady);
    }

    fn on_transport_auth_failed(&self, reason: String) {
        error!(
            "Transport {} authentication failed: {}",
            self.inner.transport.transport_name(),
            reason
        );
        self.inner.transport_ready.store(false, Ordering::SeqCst);
        self.inner.transport_failed.store(true, Ordering::SeqCst);
        self.emit_event(EngineEvent::TransportAuthFailed { reason });
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        if self.inner.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
