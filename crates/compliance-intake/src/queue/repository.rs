use thiserror::Error;

use crate::db::DatabaseError;

use super::entry::{QueueEntry, QueueEntryPatch, QueueStatus};

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Queue entry not found: {id}")]
    NotFound { id: String },

    #[error("Queue entry already exists: {id}")]
    Duplicate { id: String },

    #[error("Queue entry {id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        id: String,
        expected: i64,
        actual: i64,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for PersistenceError {
    fn from(e: DatabaseError) -> Self {
        PersistenceError::Backend(e.to_string())
    }
}

/// Key-indexed store of queue entries.
pub trait QueueRepository: Send + Sync {
    fn insert(&self, entry: &QueueEntry) -> Result<(), PersistenceError>;

    fn find_by_id(&self, id: &str) -> Result<Option<QueueEntry>, PersistenceError>;

    /// Merges `patch` into the entry and returns the stored result. With
    /// `expected_version`, the write only happens if the stored version
    /// still matches.
    fn update_queue_entry(
        &self,
        id: &str,
        patch: &QueueEntryPatch,
        expected_version: Option<i64>,
    ) -> Result<QueueEntry, PersistenceError>;

    /// Entries ordered by creation time, oldest first.
    fn list(&self, status: Option<QueueStatus>) -> Result<Vec<QueueEntry>, PersistenceError>;
}
