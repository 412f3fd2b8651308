// # intake-core
//
// Core library for the chat-driven registration intake.
//
// ## Architecture Overview
//
// This library collects registrations through a guided chat dialogue:
// - **Transport**: Trait for receiving chat messages and sending replies
// - **RecordStore**: Trait for the deduplicating, append-only record medium
// - **RegistrationSession**: Per-conversation state machine over six fields
// - **ConversationEngine**: Routes messages, drives sessions, persists results
// - **StoreRegistry**: Plugin-based registry for record stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Dialogue logic is separate from transports and media
// 2. **Event-Driven**: Messages arrive as an async stream of transport events
// 3. **Plugin-Based**: Stores are registered dynamically, no hard-coded if-else
// 4. **Library-First**: Direct save and status probe are usable without a transport
// 5. **Single Writer Path**: Every producer appends through the same deduplicating call

pub mod traits;
pub mod validate;
pub mod session;
pub mod dispatch;
pub mod replies;
pub mod engine;
pub mod store;
pub mod registry;
pub mod save;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{RecordStore, Transport};
pub use engine::{ConversationEngine, EngineEvent};
pub use registry::StoreRegistry;
pub use config::{EngineConfig, IntakeConfig, StoreConfig};
pub use error::{Error, Result};
pub use store::{FileRecordStore, MemoryRecordStore};
pub use save::{bot_status, save_registration};
