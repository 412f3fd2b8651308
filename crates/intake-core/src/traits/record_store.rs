// # Record Store Trait
//
// Defines the interface for the durable, deduplicating registration store.
//
// ## Purpose
//
// The record store is the single place where accepted registrations live.
// It guarantees:
// - No two records share an email (case-insensitive) or a contact (exact)
// - Every accepted record is durable before `append` returns
// - Appends are serialized, whichever entry point they come from
//
// ## Implementations
//
// - File-based: JSON sheet document (`FileRecordStore`)
// - In-memory: `MemoryRecordStore`
//
// ## Usage
//
// ```rust,ignore
// use intake_core::traits::{AppendOutcome, CandidateRecord, RecordStore};
//
// let outcome = store.append(candidate).await?;
// match outcome {
//     AppendOutcome::Inserted(record) => println!("saved at {}", record.created_at),
//     AppendOutcome::Duplicate { field } => println!("duplicate {}", field),
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column headers of the persisted table, in order
pub const COLUMNS: [&str; 7] = [
    "Name",
    "Contact",
    "Email",
    "Course",
    "Country",
    "University",
    "Date",
];

/// Index of the contact column in [`COLUMNS`]
pub const CONTACT_COLUMN: usize = 1;

/// Index of the email column in [`COLUMNS`]
pub const EMAIL_COLUMN: usize = 2;

/// A fully collected registration that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub name: String,
    pub contact: String,
    pub email: String,
    pub course: String,
    pub country: String,
    pub university: String,
}

impl CandidateRecord {
    /// Trim every field and lower-case the email
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            contact: self.contact.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            course: self.course.trim().to_string(),
            country: self.country.trim().to_string(),
            university: self.university.trim().to_string(),
        }
    }

    /// Whether this candidate collides with an existing row
    ///
    /// Email compares case-insensitively, contact compares exactly.
    pub fn conflicts_with(&self, email: &str, contact: &str) -> Option<DuplicateField> {
        if email.to_lowercase() == self.email.to_lowercase() {
            Some(DuplicateField::Email)
        } else if contact == self.contact {
            Some(DuplicateField::Contact)
        } else {
            None
        }
    }

    /// Stamp the candidate with its creation time
    pub(crate) fn into_record(self, created_at: DateTime<Utc>) -> RegistrationRecord {
        RegistrationRecord {
            name: self.name,
            contact: self.contact,
            email: self.email,
            course: self.course,
            country: self.country,
            university: self.university,
            created_at,
        }
    }
}

/// A persisted registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub name: String,
    pub contact: String,
    pub email: String,
    pub course: String,
    pub country: String,
    pub university: String,
    /// Assigned by the store at append time
    pub created_at: DateTime<Utc>,
}

impl RegistrationRecord {
    /// Cells of this record in [`COLUMNS`] order
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.contact.clone(),
            self.email.clone(),
            self.course.clone(),
            self.country.clone(),
            self.university.clone(),
            self.created_at.to_rfc3339(),
        ]
    }

    /// Parse a row in [`COLUMNS`] order
    pub fn from_row(row: &[String]) -> Result<Self, crate::Error> {
        let [name, contact, email, course, country, university, date] = row else {
            return Err(crate::Error::storage(format!(
                "Row has {} cells, expected {}",
                row.len(),
                COLUMNS.len()
            )));
        };

        let created_at = DateTime::parse_from_rfc3339(date)
            .map_err(|e| crate::Error::storage(format!("Invalid date '{}': {}", date, e)))?
            .with_timezone(&Utc);

        Ok(Self {
            name: name.clone(),
            contact: contact.clone(),
            email: email.clone(),
            course: course.clone(),
            country: country.clone(),
            university: university.clone(),
            created_at,
        })
    }
}

/// Which unique field an append collided on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateField {
    Email,
    Contact,
}

impl fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateField::Email => write!(f, "email"),
            DuplicateField::Contact => write!(f, "contact"),
        }
    }
}

/// Result of a successful call to [`RecordStore::append`]
///
/// Storage failures are reported through the `Err` side of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Record was durably written
    Inserted(RegistrationRecord),
    /// Nothing was written; an existing record shares this field
    Duplicate { field: DuplicateField },
}

/// Trait for record store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// `append` must run its read/check/write sequence under an exclusion
/// scoped to the physical medium, so that an inserted record is visible to
/// the uniqueness check of every later append.
///
/// ## Forbidden Capabilities
/// - ❌ Validate field formats (owned by the validators and the session)
/// - ❌ Talk to the transport (owned by `ConversationEngine`)
/// - ❌ Retry failed writes (failures are reported to the submitter)
/// - ❌ Mutate or delete existing records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a candidate record
    ///
    /// Assigns `created_at`, checks uniqueness against every persisted
    /// record and writes the record durably.
    ///
    /// # Returns
    ///
    /// - `Ok(AppendOutcome::Inserted(_))`: record written
    /// - `Ok(AppendOutcome::Duplicate { .. })`: nothing written
    /// - `Err(Error)`: the medium could not be read or written
    async fn append(&self, candidate: CandidateRecord) -> Result<AppendOutcome, crate::Error>;

    /// All persisted records, in insertion order
    async fn records(&self) -> Result<Vec<RegistrationRecord>, crate::Error>;

    /// Persist any pending changes
    ///
    /// Appends are durable on return, so this is a no-op for the built-in
    /// stores; it exists for buffered implementations.
    async fn flush(&self) -> Result<(), crate::Error>;

    /// Short descriptor of the backing medium (e.g. "tabular-file")
    fn descriptor(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<std::sync::Arc<dyn RecordStore>, crate::Error>;
}
