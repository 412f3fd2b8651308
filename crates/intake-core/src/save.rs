//! Direct save entry point and status probe
//!
//! `save_registration` is the programmatic alternative to the chat dialogue:
//! it takes a complete candidate and runs it through the same
//! [`RecordStore::append`] the engine uses, so both producers share one
//! deduplication and serialization path. The result carries an HTTP-style
//! status code for whatever façade sits in front of it.

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::dispatch::COMMANDS;
use crate::session::Step;
use crate::traits::{AppendOutcome, CandidateRecord, RecordStore};

/// Storage descriptor reported by the status probe
pub const STORAGE_DESCRIPTOR: &str = "tabular-file";

/// Outcome class of a direct save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Saved,
    Invalid,
    Duplicate,
    StorageError,
}

impl SaveStatus {
    /// HTTP status code for this outcome
    pub fn status_code(self) -> u16 {
        match self {
            SaveStatus::Saved => 201,
            SaveStatus::Invalid => 400,
            SaveStatus::Duplicate => 409,
            SaveStatus::StorageError => 500,
        }
    }
}

/// Response envelope of a direct save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub status: SaveStatus,
    /// The saved fields, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CandidateRecord>,
}

impl SaveResponse {
    fn new(status: SaveStatus, message: impl Into<String>, data: Option<CandidateRecord>) -> Self {
        Self {
            status_code: status.status_code(),
            message: message.into(),
            success: status == SaveStatus::Saved,
            status,
            data,
        }
    }
}

/// First field of the candidate that fails its validator
fn first_invalid_field(candidate: &CandidateRecord) -> Option<Step> {
    let fields = [
        (Step::Name, candidate.name.as_str()),
        (Step::Contact, candidate.contact.as_str()),
        (Step::Email, candidate.email.as_str()),
        (Step::Course, candidate.course.as_str()),
        (Step::Country, candidate.country.as_str()),
        (Step::University, candidate.university.as_str()),
    ];

    fields
        .into_iter()
        .find(|(step, value)| !(step.validator())(*value))
        .map(|(step, _)| step)
}

/// Save a complete registration without a chat session
pub async fn save_registration(store: &dyn RecordStore, candidate: CandidateRecord) -> SaveResponse {
    let candidate = candidate.normalized();

    if let Some(step) = first_invalid_field(&candidate) {
        tracing::warn!("Direct save rejected: invalid {}", step);
        return SaveResponse::new(SaveStatus::Invalid, format!("Invalid {}.", step), None);
    }

    match store.append(candidate.clone()).await {
        Ok(AppendOutcome::Inserted(_)) => {
            tracing::info!("Direct save stored {}", candidate.email);
            SaveResponse::new(SaveStatus::Saved, "User saved successfully", Some(candidate))
        }
        Ok(AppendOutcome::Duplicate { field }) => {
            tracing::info!("Direct save duplicate {}: {}", field, candidate.email);
            SaveResponse::new(
                SaveStatus::Duplicate,
                "Duplicate entry: user with this email or contact already exists.",
                None,
            )
        }
        Err(e) => {
            tracing::error!("Direct save failed: {}", e);
            let message = match e {
                Error::StorageLocked { medium } => {
                    format!("Storage is locked. Please close {} and try again.", medium)
                }
                _ => "Something went wrong while saving user".to_string(),
            };
            SaveResponse::new(SaveStatus::StorageError, message, None)
        }
    }
}

/// Read-only status probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotStatus {
    pub status: String,
    pub message: String,
    pub commands: Vec<String>,
    pub storage: String,
}

/// Report the fixed command set and storage descriptor
pub fn bot_status() -> BotStatus {
    BotStatus {
        status: "running".to_string(),
        message: "Registration bot is active".to_string(),
        commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        storage: STORAGE_DESCRIPTOR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;

    fn candidate() -> CandidateRecord {
        CandidateRecord {
            name: "Jane Doe".to_string(),
            contact: "9876543210".to_string(),
            email: " Jane@X.com ".to_string(),
            course: "CS".to_string(),
            country: "USA".to_string(),
            university: "MIT".to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_then_duplicate() {
        let store = MemoryRecordStore::new();

        let first = save_registration(&store, candidate()).await;
        assert_eq!(first.status_code, 201);
        assert!(first.success);
        assert_eq!(first.data.unwrap().email, "jane@x.com");

        let second = save_registration(&store, candidate()).await;
        assert_eq!(second.status_code, 409);
        assert_eq!(second.status, SaveStatus::Duplicate);
        assert!(!second.success);

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_candidate_not_stored() {
        let store = MemoryRecordStore::new();
        let bad = CandidateRecord {
            contact: "12345".to_string(),
            ..candidate()
        };

        let response = save_registration(&store, bad).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(response.message, "Invalid contact.");
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_status_probe() {
        let status = bot_status();
        assert_eq!(status.commands, vec!["hello", "hi", "register", "help"]);
        assert_eq!(status.storage, "tabular-file");

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "running");
    }

    #[test]
    fn test_response_envelope_shape() {
        let response = SaveResponse::new(SaveStatus::Duplicate, "dup", None);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["statusCode"], 409);
        assert_eq!(json["success"], false);
        assert_eq!(json["status"], "duplicate");
        assert!(json.get("data").is_none());
    }
}
