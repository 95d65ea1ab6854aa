//! Page repository: per-page text and per-page classification rows.
//!
//! Rows are append-only. A re-run of the same document writes a new set under
//! its own job id.

use rusqlite::{params, Connection};

use super::{parse_tag, DatabaseError};
use crate::models::{PageClassification, PageText};

pub fn insert_texts(conn: &Connection, pages: &[PageText]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO page_texts (document_id, job_id, page_number, text, annotation)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for page in pages {
        stmt.execute(params![
            page.document_id,
            page.job_id,
            page.page_number,
            page.text,
            page.annotation,
        ])?;
    }
    Ok(())
}

pub fn find_texts(conn: &Connection, document_id: &str, job_id: &str) -> Result<Vec<PageText>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT document_id, job_id, page_number, text, annotation FROM page_texts
         WHERE document_id = ?1 AND job_id = ?2 ORDER BY page_number",
    )?;
    let rows = stmt
        .query_map(params![document_id, job_id], |row| {
            Ok(PageText {
                document_id: row.get(0)?,
                job_id: row.get(1)?,
                page_number: row.get(2)?,
                text: row.get(3)?,
                annotation: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_classifications(conn: &Connection, rows: &[PageClassification]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO page_classifications (document_id, job_id, page_number, code, document_name,
         source_text, fusion_source, is_external)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.document_id,
            row.job_id,
            row.page_number,
            row.code,
            row.document_name,
            row.source_text,
            row.fusion_source.as_str(),
            row.is_external,
        ])?;
    }
    Ok(())
}

pub fn find_classifications(
    conn: &Connection,
    document_id: &str,
    job_id: &str,
) -> Result<Vec<PageClassification>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT document_id, job_id, page_number, code, document_name, source_text,
         fusion_source, is_external
         FROM page_classifications WHERE document_id = ?1 AND job_id = ?2 ORDER BY page_number",
    )?;
    let rows = stmt
        .query_map(params![document_id, job_id], |row| {
            let fusion_source: String = row.get(6)?;
            Ok(PageClassification {
                document_id: row.get(0)?,
                job_id: row.get(1)?,
                page_number: row.get(2)?,
                code: row.get(3)?,
                document_name: row.get(4)?,
                source_text: row.get(5)?,
                fusion_source: parse_tag(6, &fusion_source)?,
                is_external: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
