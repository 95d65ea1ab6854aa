//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order. Column additions are handled conditionally so
//! databases created by older builds can be upgraded in place.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    /// Execute the SQL directly.
    Standard,
    /// ALTER TABLE ADD COLUMN, skipped if the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_jobs_and_drafts_tables",
        sql: include_str!("sql/001_create_jobs.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "create_page_tables",
        sql: include_str!("sql/002_create_pages.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 3,
        description: "create_final_document_tables",
        sql: include_str!("sql/003_create_final_documents.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 4,
        description: "create_audit_and_error_log_tables",
        sql: include_str!("sql/004_create_audit_log.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 5,
        description: "add_mime_type_to_jobs",
        sql: include_str!("sql/005_add_mime_type.sql"),
        kind: MigrationKind::AddColumn {
            table: "jobs",
            column: "mime_type",
        },
    },
    Migration {
        version: 6,
        description: "one_active_job_per_document",
        sql: include_str!("sql/006_one_active_job.sql"),
        kind: MigrationKind::Standard,
    },
];

/// Applies every migration newer than the recorded schema version.
///
/// Each migration commits together with its `_migrations` row, so a failure
/// leaves the schema at the last fully applied version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied = schema_version(conn)?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > applied);

    for migration in pending {
        let tx = conn.unchecked_transaction()?;
        apply(&tx, migration)?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
        tx.commit()?;
    }

    Ok(())
}

/// Highest applied migration, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |r| r.get(0))?)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    if let MigrationKind::AddColumn { table, column } = &migration.kind {
        if column_exists(conn, table, column)? {
            log::info!(
                "Schema v{} ({}): {}.{} already present",
                migration.version,
                migration.description,
                table,
                column
            );
            return Ok(());
        }
    }

    log::info!("Applying schema v{}: {}", migration.version, migration.description);
    conn.execute_batch(migration.sql).map_err(|e| DatabaseError::Migration {
        version: migration.version,
        reason: e.to_string(),
    })
}

/// Whether `table` has `column`, via `PRAGMA table_info`.
fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("Invalid table name: {}", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    Ok(names.any(|name| matches!(name, Ok(n) if n == column)))
}
