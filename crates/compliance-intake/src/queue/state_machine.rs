use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::classify::is_valid_state_code;
use crate::failure::ClassifiedError;

use super::entry::{QueueEntry, QueueEntryPatch, QueueStatus};
use super::repository::{PersistenceError, QueueRepository};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue entry not found: {id}")]
    NotFound { id: String },

    #[error("Cannot move queue entry {id} from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: QueueStatus,
        to: QueueStatus,
    },

    #[error("Queue entry {id} was updated by another writer; reload and retry")]
    Conflict { id: String },

    #[error(transparent)]
    Persistence(PersistenceError),
}

impl From<PersistenceError> for QueueError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::NotFound { id } => QueueError::NotFound { id },
            PersistenceError::VersionConflict { id, .. } => QueueError::Conflict { id },
            other => QueueError::Persistence(other),
        }
    }
}

/// The four transitions a parser reports through.
///
/// Each call reads the entry, checks the move against
/// [`QueueStatus::can_transition_to`], and writes conditionally on the
/// version it read. Two parsers racing on one entry cannot both win.
#[derive(Clone)]
pub struct ProcessingQueue {
    repo: Arc<dyn QueueRepository>,
}

impl ProcessingQueue {
    pub fn new(repo: Arc<dyn QueueRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<dyn QueueRepository> {
        &self.repo
    }

    pub fn get(&self, id: &str) -> Result<QueueEntry, QueueError> {
        self.repo
            .find_by_id(id)?
            .ok_or_else(|| QueueError::NotFound { id: id.to_string() })
    }

    fn transition<F>(&self, id: &str, to: QueueStatus, build: F) -> Result<QueueEntry, QueueError>
    where
        F: FnOnce(&QueueEntry) -> QueueEntryPatch,
    {
        let current = self.get(id)?;
        if !current.status.can_transition_to(to) {
            warn!(entry_id = %id, from = %current.status, to = %to, "Rejected queue transition");
            return Err(QueueError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                to,
            });
        }

        let mut patch = build(&current);
        patch.status = Some(to);
        let updated = self
            .repo
            .update_queue_entry(id, &patch, Some(current.version))?;

        info!(
            entry_id = %id,
            from = %current.status,
            to = %to,
            version = updated.version,
            "Queue entry transitioned"
        );
        Ok(updated)
    }

    pub fn mark_processing(&self, id: &str) -> Result<QueueEntry, QueueError> {
        self.transition(id, QueueStatus::Processing, |_| QueueEntryPatch {
            processing_started_at: Some(Utc::now()),
            ..Default::default()
        })
    }

    /// Records a successful parse. Non-empty `warnings` replace the error
    /// log as advisories; empty ones clear whatever log was stored before.
    ///
    /// When neither `current_state_code` nor the stored entry has a state
    /// and the extracted data names exactly one valid state, that state is
    /// written to the entry.
    pub fn mark_parsed(
        &self,
        id: &str,
        extracted_data: Value,
        record_count: u32,
        current_state_code: Option<&str>,
        warnings: &[String],
    ) -> Result<QueueEntry, QueueError> {
        self.transition(id, QueueStatus::Parsed, move |current| {
            let state_code = match (current_state_code, current.state_code.as_deref()) {
                (None, None) => single_valid_state(&extracted_data),
                _ => None,
            };
            if let Some(ref code) = state_code {
                info!(entry_id = %id, state_code = %code, "Auto-filled state code from extracted data");
            }

            let error_log = if !warnings.is_empty() {
                Some(warnings.to_vec())
            } else if current.error_log.is_some() {
                Some(Vec::new())
            } else {
                None
            };

            QueueEntryPatch {
                state_code,
                extracted_data: Some(extracted_data),
                records_extracted: Some(record_count),
                error_log,
                processing_completed_at: Some(Utc::now()),
                ..Default::default()
            }
        })
    }

    /// Records a failed parse. Each raw error is stored as its classified
    /// message followed by its truncated detail.
    pub fn mark_failed(&self, id: &str, errors: &[String]) -> Result<QueueEntry, QueueError> {
        let classified: Vec<ClassifiedError> =
            errors.iter().map(|e| ClassifiedError::from_raw(e)).collect();
        let retryable = !classified.is_empty() && classified.iter().all(|c| c.retryable);
        for c in &classified {
            warn!(entry_id = %id, kind = ?c.kind, retryable = c.retryable, "Processing failed: {}", c.message);
        }

        self.transition(id, QueueStatus::Failed, move |_| QueueEntryPatch {
            error_log: Some(classified.iter().flat_map(|c| c.log_lines()).collect()),
            retryable: Some(retryable),
            processing_completed_at: Some(Utc::now()),
            ..Default::default()
        })
    }

    pub fn mark_imported(&self, id: &str, import_stats: Value) -> Result<QueueEntry, QueueError> {
        self.transition(id, QueueStatus::Imported, move |_| QueueEntryPatch {
            import_stats: Some(import_stats),
            imported_at: Some(Utc::now()),
            ..Default::default()
        })
    }
}

fn single_valid_state(extracted: &Value) -> Option<String> {
    let states = extracted_state_codes(extracted);
    if states.len() != 1 {
        return None;
    }
    states.into_iter().next().filter(|s| is_valid_state_code(s))
}

/// Distinct state codes named by a parser payload, uppercased.
///
/// Looks at a top-level `states` array, top-level `stateCode`/`state`
/// strings, and the same keys on each object in a `records` array.
pub fn extracted_state_codes(extracted: &Value) -> BTreeSet<String> {
    let mut states = BTreeSet::new();

    if let Some(list) = extracted.get("states").and_then(Value::as_array) {
        states.extend(list.iter().filter_map(Value::as_str).filter_map(normalize_state));
    }
    states.extend(state_fields(extracted));

    if let Some(records) = extracted.get("records").and_then(Value::as_array) {
        for record in records {
            states.extend(state_fields(record));
        }
    }

    states
}

fn state_fields(object: &Value) -> impl Iterator<Item = String> + '_ {
    ["stateCode", "state"]
        .into_iter()
        .filter_map(|key| object.get(key).and_then(Value::as_str))
        .filter_map(normalize_state)
}

fn normalize_state(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_ascii_uppercase())
}
