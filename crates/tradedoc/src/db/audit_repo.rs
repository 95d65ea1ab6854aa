//! Append-only audit and error logs.

use rusqlite::{params, Connection};

use super::{parse_tag, parse_timestamp, to_timestamp, DatabaseError};
use crate::models::{AuditEntry, ErrorLogEntry};

pub fn append(conn: &Connection, entry: &AuditEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (case_id, document_id, action, message, source, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.case_id,
            entry.document_id,
            entry.action.as_str(),
            entry.message,
            entry.source,
            to_timestamp(&entry.recorded_at),
        ],
    )?;
    Ok(())
}

pub fn find_for_document(conn: &Connection, document_id: &str) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT case_id, document_id, action, message, source, recorded_at
         FROM audit_log WHERE document_id = ?1 ORDER BY id",
    )?;
    let entries = stmt
        .query_map(params![document_id], |row| {
            let action: String = row.get(2)?;
            let recorded_at: String = row.get(5)?;
            Ok(AuditEntry {
                case_id: row.get(0)?,
                document_id: row.get(1)?,
                action: parse_tag(2, &action)?,
                message: row.get(3)?,
                source: row.get(4)?,
                recorded_at: parse_timestamp(5, &recorded_at)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn append_error(conn: &Connection, entry: &ErrorLogEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO error_log (case_id, document_id, step, error, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.case_id,
            entry.document_id,
            entry.step,
            entry.error,
            to_timestamp(&entry.recorded_at),
        ],
    )?;
    Ok(())
}

pub fn find_errors(conn: &Connection, document_id: &str) -> Result<Vec<ErrorLogEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT case_id, document_id, step, error, recorded_at
         FROM error_log WHERE document_id = ?1 ORDER BY id",
    )?;
    let entries = stmt
        .query_map(params![document_id], |row| {
            let recorded_at: String = row.get(4)?;
            Ok(ErrorLogEntry {
                case_id: row.get(0)?,
                document_id: row.get(1)?,
                step: row.get(2)?,
                error: row.get(3)?,
                recorded_at: parse_timestamp(4, &recorded_at)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::AuditAction;
    use chrono::Utc;

    #[test]
    fn test_audit_trail_keeps_write_order() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            for action in [
                AuditAction::ProcessingStarted,
                AuditAction::OcrCompleted,
                AuditAction::ProcessingCompleted,
            ] {
                append(conn, &AuditEntry::new(Some("C1"), "D1", action, "step", "SYSTEM"))?;
            }
            append(
                conn,
                &AuditEntry::new(None, "D2", AuditAction::ProcessingStarted, "other", "SYSTEM"),
            )?;

            let actions: Vec<AuditAction> =
                find_for_document(conn, "D1")?.into_iter().map(|e| e.action).collect();
            assert_eq!(
                actions,
                vec![
                    AuditAction::ProcessingStarted,
                    AuditAction::OcrCompleted,
                    AuditAction::ProcessingCompleted
                ]
            );
            assert_eq!(find_for_document(conn, "D2")?[0].case_id, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_error_log() {
        let db = Database::open_in_memory().unwrap();
        let entry = ErrorLogEntry {
            case_id: "C1".to_string(),
            document_id: "D1".to_string(),
            step: "CLASSIFICATION".to_string(),
            error: "SQLite error: disk I/O error".to_string(),
            recorded_at: Utc::now(),
        };
        db.with_conn(|conn| {
            append_error(conn, &entry)?;
            assert_eq!(find_errors(conn, "D1")?, vec![entry.clone()]);
            assert!(find_errors(conn, "D2")?.is_empty());
            Ok(())
        })
        .unwrap();
    }
}
