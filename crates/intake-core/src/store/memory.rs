// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Same deduplication and serialization rules as the file store, without
// persistence. Useful for tests and throwaway runs.
//
// ## Crash Behavior
//
// - All records are lost on restart/crash
// - Duplicates are only detected against records accepted by this process

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::Error;
use crate::config::StoreConfig;
use crate::traits::record_store::{
    AppendOutcome, CandidateRecord, RecordStore, RecordStoreFactory, RegistrationRecord,
};

/// In-memory record store implementation
///
/// Records live in a `Vec` behind a single async mutex, which also serves as
/// the append critical section.
///
/// # Example
///
/// ```rust,no_run
/// use intake_core::store::MemoryRecordStore;
/// use intake_core::traits::{CandidateRecord, RecordStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///     let candidate = CandidateRecord {
///         name: "Jane Doe".into(),
///         contact: "9876543210".into(),
///         email: "jane@x.com".into(),
///         course: "CS".into(),
///         country: "USA".into(),
///         university: "MIT".into(),
///     };
///
///     store.append(candidate).await?;
///     assert_eq!(store.len().await, 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Mutex<Vec<RegistrationRecord>>>,
}

impl MemoryRecordStore {
    /// Create a new empty memory record store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn append(&self, candidate: CandidateRecord) -> Result<AppendOutcome, Error> {
        let mut records = self.inner.lock().await;

        let existing = records
            .iter()
            .map(|r| (r.email.as_str(), r.contact.as_str()));
        if let Some(field) = super::find_duplicate(&candidate, existing) {
            tracing::debug!("Duplicate {} rejected: {}", field, candidate.email);
            return Ok(AppendOutcome::Duplicate { field });
        }

        let record = candidate.into_record(chrono::Utc::now());
        records.push(record.clone());

        Ok(AppendOutcome::Inserted(record))
    }

    async fn records(&self) -> Result<Vec<RegistrationRecord>, Error> {
        Ok(self.inner.lock().await.clone())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing is buffered
        Ok(())
    }

    fn descriptor(&self) -> &'static str {
        "memory"
    }
}

/// Factory for the `memory` store type
#[derive(Debug, Default)]
pub struct MemoryRecordStoreFactory;

impl RecordStoreFactory for MemoryRecordStoreFactory {
    fn create(&self, config: &StoreConfig) -> Result<Arc<dyn RecordStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Arc::new(MemoryRecordStore::new())),
            other => Err(Error::config(format!(
                "Memory store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
