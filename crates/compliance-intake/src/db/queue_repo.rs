//! Queue repository over the `processing_queue` table.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use super::{Database, DatabaseError};
use crate::queue::{PersistenceError, QueueEntry, QueueEntryPatch, QueueRepository, QueueStatus};

/// [`QueueRepository`] backed by SQLite.
///
/// JSON payloads are stored as TEXT and timestamps as RFC 3339 strings.
/// Updates are compare-and-swap on the `version` column.
#[derive(Clone)]
pub struct SqliteQueueRepository {
    db: Database,
}

impl SqliteQueueRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Counts entries in one status.
    pub fn count_by_status(&self, status: QueueStatus) -> Result<u64, PersistenceError> {
        let count = self.db.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM processing_queue
                 WHERE status = ?1 OR (?1 = 'uploaded' AND status = 'queued')",
                params![status.as_str()],
                |r| r.get(0),
            )?;
            Ok(count)
        })?;
        Ok(count)
    }
}

fn conversion_error(
    row: &Row<'_>,
    column: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    let idx = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn timestamp(row: &Row<'_>, column: &str) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(row, column, e))
    })
    .transpose()
}

fn required_timestamp(row: &Row<'_>, column: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    timestamp(row, column)?.ok_or(rusqlite::Error::InvalidColumnType(
        row.as_ref().column_index(column).unwrap_or(0),
        column.to_string(),
        Type::Null,
    ))
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    column: &str,
) -> Result<Option<T>, rusqlite::Error> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(row, column, e)))
        .transpose()
}

fn entry_from_row(row: &Row<'_>) -> Result<QueueEntry, rusqlite::Error> {
    let status_raw: String = row.get("status")?;
    let status = QueueStatus::parse(&status_raw).ok_or_else(|| {
        conversion_error(
            row,
            "status",
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown queue status '{}'", status_raw),
            ),
        )
    })?;

    Ok(QueueEntry {
        id: row.get("id")?,
        file_name: row.get("file_name")?,
        storage_key: row.get("storage_key")?,
        content_hash: row.get("content_hash")?,
        file_size: row.get("file_size")?,
        mime_type: row.get("mime_type")?,
        category: row.get("category")?,
        state_code: row.get("state_code")?,
        status,
        extracted_data: json_column::<Value>(row, "extracted_data")?,
        records_extracted: row.get("records_extracted")?,
        error_log: json_column::<Vec<String>>(row, "error_log")?,
        import_stats: json_column::<Value>(row, "import_stats")?,
        retryable: row.get("retryable")?,
        created_at: required_timestamp(row, "created_at")?,
        processing_started_at: timestamp(row, "processing_started_at")?,
        processing_completed_at: timestamp(row, "processing_completed_at")?,
        imported_at: timestamp(row, "imported_at")?,
        updated_at: required_timestamp(row, "updated_at")?,
        version: row.get("version")?,
    })
}

fn to_json_text<T: serde::Serialize>(column: &'static str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|source| DatabaseError::Json { column, source })
}

fn find(conn: &Connection, id: &str) -> Result<Option<QueueEntry>, DatabaseError> {
    let entry = conn
        .query_row(
            "SELECT * FROM processing_queue WHERE id = ?1",
            params![id],
            entry_from_row,
        )
        .optional()?;
    Ok(entry)
}

impl QueueRepository for SqliteQueueRepository {
    fn insert(&self, entry: &QueueEntry) -> Result<(), PersistenceError> {
        let extracted = entry
            .extracted_data
            .as_ref()
            .map(|v| to_json_text("extracted_data", v))
            .transpose()?;
        let error_log = entry
            .error_log
            .as_ref()
            .map(|v| to_json_text("error_log", v))
            .transpose()?;
        let import_stats = entry
            .import_stats
            .as_ref()
            .map(|v| to_json_text("import_stats", v))
            .transpose()?;

        let result = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO processing_queue (id, file_name, storage_key, content_hash, file_size,
                 mime_type, category, state_code, status, extracted_data, records_extracted,
                 error_log, import_stats, retryable, created_at, processing_started_at,
                 processing_completed_at, imported_at, updated_at, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20)",
                params![
                    entry.id,
                    entry.file_name,
                    entry.storage_key,
                    entry.content_hash,
                    entry.file_size,
                    entry.mime_type,
                    entry.category,
                    entry.state_code,
                    entry.status.as_str(),
                    extracted,
                    entry.records_extracted,
                    error_log,
                    import_stats,
                    entry.retryable,
                    entry.created_at.to_rfc3339(),
                    entry.processing_started_at.map(|t| t.to_rfc3339()),
                    entry.processing_completed_at.map(|t| t.to_rfc3339()),
                    entry.imported_at.map(|t| t.to_rfc3339()),
                    entry.updated_at.to_rfc3339(),
                    entry.version,
                ],
            )?;
            Ok(())
        });

        match result {
            Err(DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(PersistenceError::Duplicate {
                    id: entry.id.clone(),
                })
            }
            other => Ok(other?),
        }
    }

    fn find_by_id(&self, id: &str) -> Result<Option<QueueEntry>, PersistenceError> {
        Ok(self.db.with_conn(|conn| find(conn, id))?)
    }

    fn update_queue_entry(
        &self,
        id: &str,
        patch: &QueueEntryPatch,
        expected_version: Option<i64>,
    ) -> Result<QueueEntry, PersistenceError> {
        let now = Utc::now();
        let mut sets = vec![
            "updated_at = ?1".to_string(),
            "version = version + 1".to_string(),
        ];
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now.to_rfc3339())];

        if let Some(status) = patch.status {
            sets.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str()));
        }
        if let Some(ref state_code) = patch.state_code {
            sets.push(format!("state_code = ?{}", param_values.len() + 1));
            param_values.push(Box::new(state_code.clone()));
        }
        if let Some(ref data) = patch.extracted_data {
            sets.push(format!("extracted_data = ?{}", param_values.len() + 1));
            param_values.push(Box::new(to_json_text("extracted_data", data)?));
        }
        if let Some(count) = patch.records_extracted {
            sets.push(format!("records_extracted = ?{}", param_values.len() + 1));
            param_values.push(Box::new(count));
        }
        if let Some(ref log) = patch.error_log {
            sets.push(format!("error_log = ?{}", param_values.len() + 1));
            param_values.push(Box::new(to_json_text("error_log", log)?));
        }
        if let Some(ref stats) = patch.import_stats {
            sets.push(format!("import_stats = ?{}", param_values.len() + 1));
            param_values.push(Box::new(to_json_text("import_stats", stats)?));
        }
        if let Some(retryable) = patch.retryable {
            sets.push(format!("retryable = ?{}", param_values.len() + 1));
            param_values.push(Box::new(retryable));
        }
        if let Some(at) = patch.processing_started_at {
            sets.push(format!("processing_started_at = ?{}", param_values.len() + 1));
            param_values.push(Box::new(at.to_rfc3339()));
        }
        if let Some(at) = patch.processing_completed_at {
            sets.push(format!("processing_completed_at = ?{}", param_values.len() + 1));
            param_values.push(Box::new(at.to_rfc3339()));
        }
        if let Some(at) = patch.imported_at {
            sets.push(format!("imported_at = ?{}", param_values.len() + 1));
            param_values.push(Box::new(at.to_rfc3339()));
        }

        param_values.push(Box::new(id.to_string()));
        let mut where_clause = format!("id = ?{}", param_values.len());
        if let Some(expected) = expected_version {
            param_values.push(Box::new(expected));
            where_clause.push_str(&format!(" AND version = ?{}", param_values.len()));
        }

        let sql = format!(
            "UPDATE processing_queue SET {} WHERE {}",
            sets.join(", "),
            where_clause
        );

        let (changed, current) = self.db.with_conn(|conn| {
            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();
            let changed = conn.execute(&sql, params_ref.as_slice())?;
            Ok((changed, find(conn, id)?))
        })?;

        let Some(current) = current else {
            return Err(PersistenceError::NotFound { id: id.to_string() });
        };
        if changed == 0 {
            return Err(PersistenceError::VersionConflict {
                id: id.to_string(),
                expected: expected_version.unwrap_or_default(),
                actual: current.version,
            });
        }
        Ok(current)
    }

    fn list(&self, status: Option<QueueStatus>) -> Result<Vec<QueueEntry>, PersistenceError> {
        let rows = self.db.with_conn(|conn| {
            let mut conditions = Vec::new();
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(status) = status {
                let placeholder = param_values.len() + 1;
                // Rows written by older producers may still say `queued`.
                if status == QueueStatus::Uploaded {
                    conditions.push(format!("status IN (?{}, 'queued')", placeholder));
                } else {
                    conditions.push(format!("status = ?{}", placeholder));
                }
                param_values.push(Box::new(status.as_str()));
            }

            let where_clause = if conditions.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", conditions.join(" AND "))
            };
            let sql = format!(
                "SELECT * FROM processing_queue {} ORDER BY created_at ASC, id ASC",
                where_clause
            );

            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows: Vec<QueueEntry> = stmt
                .query_map(params_ref.as_slice(), entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::NewQueueEntry;
    use serde_json::json;

    fn test_repo() -> SqliteQueueRepository {
        SqliteQueueRepository::new(
            Database::open_in_memory().expect("Failed to create test database"),
        )
    }

    fn sample_entry(id: &str) -> QueueEntry {
        QueueEntry::uploaded(NewQueueEntry {
            id: id.to_string(),
            file_name: "KY_DMR_2024Q1.pdf".to_string(),
            storage_key: format!("uploads/{}", id),
            content_hash: Some("ab".repeat(32)),
            file_size: 2048,
            mime_type: Some("application/pdf".to_string()),
            category: Some("dmr".to_string()),
            state_code: None,
        })
    }

    #[test]
    fn test_insert_and_find() {
        let repo = test_repo();
        let entry = sample_entry("q1");
        repo.insert(&entry).unwrap();

        let found = repo.find_by_id("q1").unwrap().unwrap();
        assert_eq!(found.file_name, "KY_DMR_2024Q1.pdf");
        assert_eq!(found.status, QueueStatus::Uploaded);
        assert_eq!(found.version, 1);
        assert_eq!(found.created_at.timestamp(), entry.created_at.timestamp());
        assert!(found.extracted_data.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let repo = test_repo();
        assert!(repo.find_by_id("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert() {
        let repo = test_repo();
        repo.insert(&sample_entry("q1")).unwrap();
        assert!(matches!(
            repo.insert(&sample_entry("q1")),
            Err(PersistenceError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_update_round_trips_json_columns() {
        let repo = test_repo();
        repo.insert(&sample_entry("q1")).unwrap();

        let patch = QueueEntryPatch {
            status: Some(QueueStatus::Processing),
            extracted_data: Some(json!({"records": [{"state": "KY"}]})),
            error_log: Some(vec!["warning".to_string()]),
            retryable: Some(true),
            processing_started_at: Some(Utc::now()),
            ..Default::default()
        };
        let updated = repo.update_queue_entry("q1", &patch, Some(1)).unwrap();
        assert_eq!(updated.status, QueueStatus::Processing);
        assert_eq!(updated.version, 2);
        assert_eq!(updated.extracted_data, Some(json!({"records": [{"state": "KY"}]})));
        assert_eq!(updated.error_log, Some(vec!["warning".to_string()]));
        assert_eq!(updated.retryable, Some(true));
        assert!(updated.processing_started_at.is_some());
        // Untouched fields survive.
        assert_eq!(updated.category.as_deref(), Some("dmr"));
    }

    #[test]
    fn test_stale_version_conflict() {
        let repo = test_repo();
        repo.insert(&sample_entry("q1")).unwrap();
        let patch = QueueEntryPatch {
            status: Some(QueueStatus::Processing),
            ..Default::default()
        };
        repo.update_queue_entry("q1", &patch, Some(1)).unwrap();

        let result = repo.update_queue_entry("q1", &patch, Some(1));
        assert!(matches!(
            result,
            Err(PersistenceError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_update_missing() {
        let repo = test_repo();
        let result = repo.update_queue_entry("nope", &QueueEntryPatch::default(), None);
        assert!(matches!(result, Err(PersistenceError::NotFound { .. })));
    }

    #[test]
    fn test_queued_rows_read_as_uploaded() {
        let repo = test_repo();
        repo.database()
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO processing_queue (id, file_name, storage_key, status, created_at, updated_at)
                     VALUES ('legacy', 'a.csv', 'k', 'queued', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let found = repo.find_by_id("legacy").unwrap().unwrap();
        assert_eq!(found.status, QueueStatus::Uploaded);
        assert_eq!(repo.list(Some(QueueStatus::Uploaded)).unwrap().len(), 1);
    }

    #[test]
    fn test_list_and_count_by_status() {
        let repo = test_repo();
        repo.insert(&sample_entry("a")).unwrap();
        repo.insert(&sample_entry("b")).unwrap();
        repo.update_queue_entry(
            "b",
            &QueueEntryPatch {
                status: Some(QueueStatus::Processing),
                ..Default::default()
            },
            None,
        )
        .unwrap();

        assert_eq!(repo.list(None).unwrap().len(), 2);
        let processing = repo.list(Some(QueueStatus::Processing)).unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, "b");
        assert_eq!(repo.count_by_status(QueueStatus::Uploaded).unwrap(), 1);
    }
}
