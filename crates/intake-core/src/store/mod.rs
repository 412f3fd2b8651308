// # Record Store Implementations
//
// This module provides implementations of the RecordStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileRecordStore, FileRecordStoreFactory};
pub use memory::{MemoryRecordStore, MemoryRecordStoreFactory};

use crate::traits::{CandidateRecord, DuplicateField};

/// Find the first existing `(email, contact)` pair the candidate collides with
pub(crate) fn find_duplicate<'a, I>(candidate: &CandidateRecord, existing: I) -> Option<DuplicateField>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    existing
        .into_iter()
        .find_map(|(email, contact)| candidate.conflicts_with(email, contact))
}
