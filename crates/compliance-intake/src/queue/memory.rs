use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use super::entry::{QueueEntry, QueueEntryPatch, QueueStatus};
use super::repository::{PersistenceError, QueueRepository};

/// In-process repository for tests and embedding without a database.
#[derive(Default)]
pub struct MemoryQueueRepository {
    entries: RwLock<HashMap<String, QueueEntry>>,
}

impl MemoryQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, QueueEntry>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Queue repository lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, QueueEntry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Queue repository lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl QueueRepository for MemoryQueueRepository {
    fn insert(&self, entry: &QueueEntry) -> Result<(), PersistenceError> {
        let mut entries = self.write();
        if entries.contains_key(&entry.id) {
            return Err(PersistenceError::Duplicate {
                id: entry.id.clone(),
            });
        }
        entries.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<QueueEntry>, PersistenceError> {
        Ok(self.read().get(id).cloned())
    }

    fn update_queue_entry(
        &self,
        id: &str,
        patch: &QueueEntryPatch,
        expected_version: Option<i64>,
    ) -> Result<QueueEntry, PersistenceError> {
        let mut entries = self.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound { id: id.to_string() })?;

        if let Some(expected) = expected_version {
            if entry.version != expected {
                return Err(PersistenceError::VersionConflict {
                    id: id.to_string(),
                    expected,
                    actual: entry.version,
                });
            }
        }

        patch.apply(entry, Utc::now());
        Ok(entry.clone())
    }

    fn list(&self, status: Option<QueueStatus>) -> Result<Vec<QueueEntry>, PersistenceError> {
        let mut result: Vec<QueueEntry> = self
            .read()
            .values()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(result)
    }
}
