//! Final document repository: `final_documents` and `final_document_history`.
//!
//! The update functions only touch a row that is still DRAFT at the expected
//! version and report how many rows changed; callers run them inside a
//! transaction together with the matching history insert.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_json, parse_tag, parse_timestamp, to_timestamp, DatabaseError};
use crate::models::{DocumentContent, FinalDocument, FinalStatus, HistoryEntry};

const FINAL_COLUMNS: &str = "document_id, case_id, content, whole_text, status, version, \
                             last_editor, created_at, updated_at";

fn final_from_row(row: &Row<'_>) -> Result<FinalDocument, rusqlite::Error> {
    let content: String = row.get(2)?;
    let status: String = row.get(4)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(FinalDocument {
        document_id: row.get(0)?,
        case_id: row.get(1)?,
        content: parse_json(2, &content)?,
        whole_text: row.get(3)?,
        status: parse_tag(4, &status)?,
        version: row.get(5)?,
        last_editor: row.get(6)?,
        created_at: parse_timestamp(7, &created_at)?,
        updated_at: parse_timestamp(8, &updated_at)?,
    })
}

/// Inserts the record unless the document already has one.
pub fn insert(conn: &Connection, document: &FinalDocument) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO final_documents (document_id, case_id, content, whole_text, status,
         version, last_editor, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            document.document_id,
            document.case_id,
            serde_json::to_string(&document.content)?,
            document.whole_text,
            document.status.as_str(),
            document.version,
            document.last_editor,
            to_timestamp(&document.created_at),
            to_timestamp(&document.updated_at),
        ],
    )?;
    Ok(inserted == 1)
}

pub fn find(conn: &Connection, document_id: &str) -> Result<Option<FinalDocument>, DatabaseError> {
    let sql = format!("SELECT {} FROM final_documents WHERE document_id = ?1", FINAL_COLUMNS);
    Ok(conn.query_row(&sql, params![document_id], final_from_row).optional()?)
}

pub fn status_and_version(
    conn: &Connection,
    document_id: &str,
) -> Result<Option<(FinalStatus, u32)>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT status, version FROM final_documents WHERE document_id = ?1",
            params![document_id],
            |row| {
                let status: String = row.get(0)?;
                Ok((parse_tag(0, &status)?, row.get(1)?))
            },
        )
        .optional()?;
    Ok(row)
}

/// Replaces the content of a DRAFT record and bumps its version by one.
pub fn update_content(
    conn: &Connection,
    document_id: &str,
    expected_version: u32,
    content: &DocumentContent,
    whole_text: &str,
    editor: &str,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE final_documents
         SET content = ?3, whole_text = ?4, last_editor = ?5, updated_at = ?6, version = version + 1
         WHERE document_id = ?1 AND status = 'DRAFT' AND version = ?2",
        params![
            document_id,
            expected_version,
            serde_json::to_string(content)?,
            whole_text,
            editor,
            to_timestamp(now),
        ],
    )?;
    Ok(changed == 1)
}

/// Moves a DRAFT record at `expected_version` to APPROVED without changing its version.
pub fn mark_approved(
    conn: &Connection,
    document_id: &str,
    expected_version: u32,
    approver: &str,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE final_documents SET status = 'APPROVED', last_editor = ?3, updated_at = ?4
         WHERE document_id = ?1 AND status = 'DRAFT' AND version = ?2",
        params![document_id, expected_version, approver, to_timestamp(now)],
    )?;
    Ok(changed == 1)
}

pub fn insert_history(conn: &Connection, entry: &HistoryEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO final_document_history (document_id, version, content, action, actor, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.document_id,
            entry.version,
            serde_json::to_string(&entry.content)?,
            entry.action.as_str(),
            entry.actor,
            to_timestamp(&entry.recorded_at),
        ],
    )?;
    Ok(())
}

pub fn find_history(conn: &Connection, document_id: &str) -> Result<Vec<HistoryEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT document_id, version, content, action, actor, recorded_at
         FROM final_document_history WHERE document_id = ?1 ORDER BY id",
    )?;
    let entries = stmt
        .query_map(params![document_id], |row| {
            let content: String = row.get(2)?;
            let action: String = row.get(3)?;
            let recorded_at: String = row.get(5)?;
            Ok(HistoryEntry {
                document_id: row.get(0)?,
                version: row.get(1)?,
                content: parse_json(2, &content)?,
                action: parse_tag(3, &action)?,
                actor: row.get(4)?,
                recorded_at: parse_timestamp(5, &recorded_at)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}
