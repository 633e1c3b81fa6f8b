use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a queue entry.
///
/// `queued` is accepted as a synonym of `uploaded` when parsing and
/// deserializing; it is always written back as `uploaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    #[serde(alias = "queued")]
    Uploaded,
    Processing,
    Parsed,
    Failed,
    Imported,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Uploaded => "uploaded",
            QueueStatus::Processing => "processing",
            QueueStatus::Parsed => "parsed",
            QueueStatus::Failed => "failed",
            QueueStatus::Imported => "imported",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" | "queued" => Some(QueueStatus::Uploaded),
            "processing" => Some(QueueStatus::Processing),
            "parsed" => Some(QueueStatus::Parsed),
            "failed" => Some(QueueStatus::Failed),
            "imported" => Some(QueueStatus::Imported),
            _ => None,
        }
    }

    /// Forward-only transition table. Re-applying the current state is
    /// allowed so a parser can safely repeat its last call.
    pub fn can_transition_to(self, next: QueueStatus) -> bool {
        use QueueStatus::*;
        self == next
            || matches!(
                (self, next),
                (Uploaded, Processing)
                    | (Processing, Parsed)
                    | (Processing, Failed)
                    | (Parsed, Imported)
            )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Failed | QueueStatus::Imported)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted record tracking one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: String,
    pub file_name: String,
    pub storage_key: String,
    pub content_hash: Option<String>,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub category: Option<String>,
    pub state_code: Option<String>,
    pub status: QueueStatus,
    pub extracted_data: Option<Value>,
    pub records_extracted: u32,
    pub error_log: Option<Vec<String>>,
    pub import_stats: Option<Value>,
    /// Set by `mark_failed`: whether resubmitting might succeed.
    pub retryable: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub imported_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every write; used for compare-and-swap updates.
    pub version: i64,
}

/// Fields known when a transfer completes.
#[derive(Debug, Clone, Default)]
pub struct NewQueueEntry {
    pub id: String,
    pub file_name: String,
    pub storage_key: String,
    pub content_hash: Option<String>,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub category: Option<String>,
    pub state_code: Option<String>,
}

impl QueueEntry {
    pub fn uploaded(new: NewQueueEntry) -> Self {
        let now = Utc::now();
        Self {
            id: new.id,
            file_name: new.file_name,
            storage_key: new.storage_key,
            content_hash: new.content_hash,
            file_size: new.file_size,
            mime_type: new.mime_type,
            category: new.category,
            state_code: new.state_code,
            status: QueueStatus::Uploaded,
            extracted_data: None,
            records_extracted: 0,
            error_log: None,
            import_stats: None,
            retryable: None,
            created_at: now,
            processing_started_at: None,
            processing_completed_at: None,
            imported_at: None,
            updated_at: now,
            version: 1,
        }
    }
}

/// Partial update of a queue entry. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueEntryPatch {
    pub status: Option<QueueStatus>,
    pub state_code: Option<String>,
    pub extracted_data: Option<Value>,
    pub records_extracted: Option<u32>,
    pub error_log: Option<Vec<String>>,
    pub import_stats: Option<Value>,
    pub retryable: Option<bool>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub imported_at: Option<DateTime<Utc>>,
}

impl QueueEntryPatch {
    /// Merges the patch, stamps `updated_at` and bumps `version`.
    pub fn apply(&self, entry: &mut QueueEntry, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            entry.status = status;
        }
        if let Some(ref state_code) = self.state_code {
            entry.state_code = Some(state_code.clone());
        }
        if let Some(ref data) = self.extracted_data {
            entry.extracted_data = Some(data.clone());
        }
        if let Some(count) = self.records_extracted {
            entry.records_extracted = count;
        }
        if let Some(ref log) = self.error_log {
            entry.error_log = Some(log.clone());
        }
        if let Some(ref stats) = self.import_stats {
            entry.import_stats = Some(stats.clone());
        }
        if let Some(retryable) = self.retryable {
            entry.retryable = Some(retryable);
        }
        if let Some(at) = self.processing_started_at {
            entry.processing_started_at = Some(at);
        }
        if let Some(at) = self.processing_completed_at {
            entry.processing_completed_at = Some(at);
        }
        if let Some(at) = self.imported_at {
            entry.imported_at = Some(at);
        }
        entry.updated_at = now;
        entry.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queued_is_uploaded() {
        assert_eq!(QueueStatus::parse("queued"), Some(QueueStatus::Uploaded));
        let status: QueueStatus = serde_json::from_str("\"queued\"").unwrap();
        assert_eq!(status, QueueStatus::Uploaded);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"uploaded\"");
        assert_eq!(QueueStatus::parse("done"), None);
    }

    #[test]
    fn test_transition_table() {
        use QueueStatus::*;
        let allowed = [
            (Uploaded, Processing),
            (Processing, Parsed),
            (Processing, Failed),
            (Parsed, Imported),
        ];
        let all = [Uploaded, Processing, Parsed, Failed, Imported];
        for from in all {
            for to in all {
                let expected = from == to || allowed.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expected, "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_patch_apply_bumps_version() {
        let mut entry = QueueEntry::uploaded(NewQueueEntry {
            id: "q1".to_string(),
            file_name: "KY_DMR.pdf".to_string(),
            storage_key: "uploads/q1".to_string(),
            ..Default::default()
        });
        let now = Utc::now();
        QueueEntryPatch {
            status: Some(QueueStatus::Processing),
            extracted_data: Some(json!({"rows": 2})),
            ..Default::default()
        }
        .apply(&mut entry, now);

        assert_eq!(entry.status, QueueStatus::Processing);
        assert_eq!(entry.version, 2);
        assert_eq!(entry.updated_at, now);
        assert_eq!(entry.extracted_data, Some(json!({"rows": 2})));
        assert!(entry.state_code.is_none());
    }
}
