//! Document summary repository. At most one row per document.

use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_json, parse_tag, parse_timestamp, to_timestamp, DatabaseError};
use crate::models::DocumentSummary;

/// Inserts the summary unless the document already has one.
pub fn insert_if_absent(conn: &Connection, summary: &DocumentSummary) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO document_summaries (document_id, case_id, product, document_names,
         content, approved_version, approved_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            summary.document_id,
            summary.case_id,
            summary.product.as_str(),
            serde_json::to_string(&summary.document_names)?,
            serde_json::to_string(&summary.content)?,
            summary.approved_version,
            summary.approved_by,
            to_timestamp(&summary.created_at),
        ],
    )?;
    Ok(inserted == 1)
}

pub fn find(conn: &Connection, document_id: &str) -> Result<Option<DocumentSummary>, DatabaseError> {
    let summary = conn
        .query_row(
            "SELECT document_id, case_id, product, document_names, content, approved_version,
             approved_by, created_at
             FROM document_summaries WHERE document_id = ?1",
            params![document_id],
            |row| {
                let product: String = row.get(2)?;
                let names: String = row.get(3)?;
                let content: String = row.get(4)?;
                let created_at: String = row.get(7)?;
                Ok(DocumentSummary {
                    document_id: row.get(0)?,
                    case_id: row.get(1)?,
                    product: parse_tag(2, &product)?,
                    document_names: parse_json(3, &names)?,
                    content: parse_json(4, &content)?,
                    approved_version: row.get(5)?,
                    approved_by: row.get(6)?,
                    created_at: parse_timestamp(7, &created_at)?,
                })
            },
        )
        .optional()?;
    Ok(summary)
}
