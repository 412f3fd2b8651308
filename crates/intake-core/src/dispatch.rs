//! Command dispatcher
//!
//! Decides what an inbound message means for its conversation: the next
//! answer of an active registration, one of the fixed commands, or noise.
//! Matching is exact and case-insensitive on the trimmed text.
//!
//! While a session is active every text is an answer, with one exception:
//! `register` restarts the session from the first step.

use crate::session::SessionTable;
use crate::traits::ConversationId;

/// Fixed command words, in the order they are advertised
pub const COMMANDS: [&str; 4] = ["hello", "hi", "register", "help"];

/// A recognized command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Greeting,
    StartRegistration,
    Help,
}

impl Command {
    /// Parse a command word
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "hello" | "hi" => Some(Command::Greeting),
            "register" => Some(Command::StartRegistration),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Where an inbound message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Feed the text to the conversation's active session
    ContinueSession,
    /// Run a command
    Command(Command),
    /// No session, no command: send the fallback reply
    Unknown,
}

/// Route a message given the engine's session table
///
/// An active session takes every message as an answer, with one exception:
/// `register` restarts the registration instead of being stored as the
/// answer to the current step.
pub fn dispatch(sessions: &SessionTable, conversation_id: &ConversationId, text: &str) -> Route {
    let command = Command::parse(text);

    if sessions.contains(conversation_id) {
        return match command {
            Some(Command::StartRegistration) => Route::Command(Command::StartRegistration),
            _ => Route::ContinueSession,
        };
    }

    match command {
        Some(command) => Route::Command(command),
        None => Route::Unknown,
    }
}
