//! Registration session state machine
//!
//! A session walks one conversation through the fixed field order
//!
//! ```text
//! name → contact → email → course → country → university → complete
//! ```
//!
//! Each inbound text is trimmed and checked by the current step's validator.
//! A rejected value leaves the session where it is; an accepted value is
//! stored and the session moves to the next step. Reaching `complete` hands
//! the collected [`CandidateRecord`] back to the engine for persistence.
//!
//! Sessions live in a [`SessionTable`] owned by the
//! [`ConversationEngine`](crate::engine::ConversationEngine).

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::replies;
use crate::traits::{CandidateRecord, ConversationId};
use crate::validate;

/// Registration steps, in collection order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Step {
    Name,
    Contact,
    Email,
    Course,
    Country,
    University,
    /// Terminal: every field collected
    Complete,
}

impl Step {
    /// The step that follows this one
    pub fn next(self) -> Step {
        match self {
            Step::Name => Step::Contact,
            Step::Contact => Step::Email,
            Step::Email => Step::Course,
            Step::Course => Step::Country,
            Step::Country => Step::University,
            Step::University | Step::Complete => Step::Complete,
        }
    }

    /// Validator for the value collected at this step
    pub fn validator(self) -> fn(&str) -> bool {
        match self {
            Step::Name => validate::is_valid_name,
            Step::Contact => validate::is_valid_phone,
            Step::Email => validate::is_valid_email,
            Step::Course | Step::Country | Step::University | Step::Complete => {
                validate::is_non_empty
            }
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Name => "name",
            Step::Contact => "contact",
            Step::Email => "email",
            Step::Course => "course",
            Step::Country => "country",
            Step::University => "university",
            Step::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Fields collected so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub course: Option<String>,
    pub country: Option<String>,
    pub university: Option<String>,
}

impl PartialRecord {
    /// Value collected for `step`, if any
    pub fn get(&self, step: Step) -> Option<&str> {
        match step {
            Step::Name => self.name.as_deref(),
            Step::Contact => self.contact.as_deref(),
            Step::Email => self.email.as_deref(),
            Step::Course => self.course.as_deref(),
            Step::Country => self.country.as_deref(),
            Step::University => self.university.as_deref(),
            Step::Complete => None,
        }
    }

    fn set(&mut self, step: Step, value: String) {
        let slot = match step {
            Step::Name => &mut self.name,
            Step::Contact => &mut self.contact,
            Step::Email => &mut self.email,
            Step::Course => &mut self.course,
            Step::Country => &mut self.country,
            Step::University => &mut self.university,
            Step::Complete => return,
        };
        *slot = Some(value);
    }

    /// Build a candidate once every field is present
    fn to_candidate(&self) -> Option<CandidateRecord> {
        Some(CandidateRecord {
            name: self.name.clone()?,
            contact: self.contact.clone()?,
            email: self.email.clone()?,
            course: self.course.clone()?,
            country: self.country.clone()?,
            university: self.university.clone()?,
        })
    }
}

/// Outcome of feeding one message to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Value accepted; reply with the prompt for the new step
    Advanced { step: Step, prompt: &'static str },
    /// Value rejected; the session stays at `step`
    Rejected { step: Step, prompt: &'static str },
    /// Every field collected; persist the candidate and discard the session
    Complete(CandidateRecord),
}

/// In-progress registration for one conversation
#[derive(Debug, Clone)]
pub struct RegistrationSession {
    conversation_id: ConversationId,
    step: Step,
    collected: PartialRecord,
    last_activity: Instant,
}

impl RegistrationSession {
    /// Start a session at the first step
    pub fn new(conversation_id: ConversationId, now: Instant) -> Self {
        Self {
            conversation_id,
            step: Step::Name,
            collected: PartialRecord::default(),
            last_activity: now,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// The first field not yet collected
    pub fn current_step(&self) -> Step {
        self.step
    }

    pub fn collected(&self) -> &PartialRecord {
        &self.collected
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Feed one inbound text to the session
    pub fn advance(&mut self, text: &str, now: Instant) -> Transition {
        self.last_activity = now;

        let step = self.step;
        let value = text.trim();

        if step == Step::Complete || !(step.validator())(value) {
            return Transition::Rejected {
                step,
                prompt: replies::rejection(step),
            };
        }

        let value = if step == Step::Email {
            value.to_lowercase()
        } else {
            value.to_string()
        };

        self.collected.set(step, value);
        self.step = step.next();

        if self.step == Step::Complete
            && let Some(candidate) = self.collected.to_candidate()
        {
            return Transition::Complete(candidate);
        }

        Transition::Advanced {
            step: self.step,
            prompt: replies::prompt(self.step),
        }
    }
}

/// Live sessions keyed by conversation
///
/// At most one session exists per conversation.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<ConversationId, RegistrationSession>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session, replacing any existing one
    ///
    /// Returns `true` if an in-progress session was discarded.
    pub fn start(&mut self, conversation_id: ConversationId, now: Instant) -> bool {
        let session = RegistrationSession::new(conversation_id.clone(), now);
        self.sessions.insert(conversation_id, session).is_some()
    }

    pub fn get(&self, conversation_id: &ConversationId) -> Option<&RegistrationSession> {
        self.sessions.get(conversation_id)
    }

    pub fn get_mut(&mut self, conversation_id: &ConversationId) -> Option<&mut RegistrationSession> {
        self.sessions.get_mut(conversation_id)
    }

    pub fn contains(&self, conversation_id: &ConversationId) -> bool {
        self.sessions.contains_key(conversation_id)
    }

    pub fn remove(&mut self, conversation_id: &ConversationId) -> Option<RegistrationSession> {
        self.sessions.remove(conversation_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove sessions idle for longer than `idle_timeout`
    ///
    /// Returns the evicted conversation ids.
    pub fn evict_idle(&mut self, now: Instant, idle_timeout: Duration) -> Vec<ConversationId> {
        let expired: Vec<ConversationId> = self
            .sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_activity) > idle_timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            self.sessions.remove(id);
        }

        expired
    }
}
