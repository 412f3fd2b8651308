//! Core traits for the intake system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`Transport`]: Deliver inbound chat messages and send replies
//! - [`RecordStore`]: Durable, deduplicating registration storage

pub mod record_store;
pub mod transport;

pub use record_store::{
    AppendOutcome, CandidateRecord, DuplicateField, RecordStore, RecordStoreFactory,
    RegistrationRecord, COLUMNS,
};
pub use transport::{ConversationId, InboundMessage, Transport, TransportEvent};
