//! Schema versioning for the intake database.
//!
//! Each step runs inside its own transaction together with the row that
//! records it in `_migrations`, so a failed step leaves no trace.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
    guard: Guard,
}

/// When a step's SQL is actually executed.
enum Guard {
    Always,
    /// `ADD COLUMN` steps; a database that already has the column only gets
    /// the step recorded.
    ColumnMissing {
        table: &'static str,
        column: &'static str,
    },
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "create_processing_queue",
        sql: include_str!("sql/001_create_processing_queue.sql"),
        guard: Guard::Always,
    },
    Step {
        version: 2,
        name: "add_processing_queue_retryable",
        sql: include_str!("sql/002_add_retryable.sql"),
        guard: Guard::ColumnMissing {
            table: "processing_queue",
            column: "retryable",
        },
    },
    Step {
        version: 3,
        name: "index_processing_queue_content_hash",
        sql: include_str!("sql/003_add_content_hash_index.sql"),
        guard: Guard::Always,
    },
];

/// Highest schema version this build knows about.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |s| s.version)
}

/// Version recorded in `_migrations`, or 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

/// Brings the schema up to [`latest_version`].
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = schema_version(conn)?;
    for step in STEPS.iter().filter(|s| s.version > current) {
        apply(conn, step)?;
    }
    Ok(())
}

fn apply(conn: &Connection, step: &Step) -> Result<(), DatabaseError> {
    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: step.version,
        reason: e.to_string(),
    };

    let execute = match step.guard {
        Guard::Always => true,
        Guard::ColumnMissing { table, column } => !has_column(conn, table, column)?,
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    if execute {
        log::info!("Applying schema v{} ({})", step.version, step.name);
        tx.execute_batch(step.sql).map_err(failed)?;
    } else {
        log::info!("Recording schema v{} ({}), already present", step.version, step.name);
    }
    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        params![step.version, step.name],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    // PRAGMA arguments cannot be bound, so the name is checked instead.
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("Invalid table name: {}", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>("name"))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
