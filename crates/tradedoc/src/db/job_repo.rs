//! Job repository: the `jobs` and `drafts` tables.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_tag, parse_timestamp, to_timestamp, DatabaseError};
use crate::models::{DraftRecord, JobRecord, JobStatus};

const JOB_COLUMNS: &str =
    "job_id, document_id, case_id, source_ref, mime_type, status, error, created_at, updated_at";

fn job_from_row(row: &Row<'_>) -> Result<JobRecord, rusqlite::Error> {
    let status: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(JobRecord {
        job_id: row.get(0)?,
        document_id: row.get(1)?,
        case_id: row.get(2)?,
        source_ref: row.get(3)?,
        mime_type: row.get(4)?,
        status: parse_tag(5, &status)?,
        error: row.get(6)?,
        created_at: parse_timestamp(7, &created_at)?,
        updated_at: parse_timestamp(8, &updated_at)?,
    })
}

/// Inserts a job. Returns `false`, writing nothing, when the document already
/// has a QUEUED or PROCESSING job.
pub fn insert(conn: &Connection, job: &JobRecord) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO jobs (job_id, document_id, case_id, source_ref, mime_type, status, error,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            job.job_id,
            job.document_id,
            job.case_id,
            job.source_ref,
            job.mime_type,
            job.status.as_str(),
            job.error,
            to_timestamp(&job.created_at),
            to_timestamp(&job.updated_at),
        ],
    )?;
    Ok(inserted == 1)
}

pub fn find_by_id(conn: &Connection, job_id: &str) -> Result<Option<JobRecord>, DatabaseError> {
    let sql = format!("SELECT {} FROM jobs WHERE job_id = ?1", JOB_COLUMNS);
    Ok(conn.query_row(&sql, params![job_id], job_from_row).optional()?)
}

/// Most recent job of a document that has not reached a terminal state.
pub fn find_active_for_document(
    conn: &Connection,
    document_id: &str,
) -> Result<Option<JobRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM jobs WHERE document_id = ?1 AND status IN ('QUEUED', 'PROCESSING')
         ORDER BY created_at DESC, rowid DESC LIMIT 1",
        JOB_COLUMNS
    );
    Ok(conn.query_row(&sql, params![document_id], job_from_row).optional()?)
}

/// Jobs in `status`, oldest update first.
pub fn find_by_status(conn: &Connection, status: JobStatus) -> Result<Vec<JobRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM jobs WHERE status = ?1 ORDER BY updated_at, rowid",
        JOB_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let jobs = stmt
        .query_map(params![status.as_str()], job_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(jobs)
}

/// Compare-and-set on the job status. Returns `false` when the job was not in
/// `from` (or does not exist).
pub fn transition(
    conn: &Connection,
    job_id: &str,
    from: JobStatus,
    to: JobStatus,
    error: Option<&str>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = ?3, error = COALESCE(?4, error), updated_at = ?5
         WHERE job_id = ?1 AND status = ?2",
        params![
            job_id,
            from.as_str(),
            to.as_str(),
            error,
            to_timestamp(&Utc::now()),
        ],
    )?;
    Ok(changed == 1)
}

/// Removes a job that never left QUEUED. Returns `false` when it had already
/// been picked up.
pub fn delete_queued(conn: &Connection, job_id: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM jobs WHERE job_id = ?1 AND status = 'QUEUED'",
        params![job_id],
    )?;
    Ok(deleted == 1)
}

/// Inserts the draft linkage unless one exists for the document.
pub fn insert_draft(conn: &Connection, draft: &DraftRecord) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO drafts (document_id, case_id, document_name, source_ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            draft.document_id,
            draft.case_id,
            draft.document_name,
            draft.source_ref,
            to_timestamp(&draft.created_at),
        ],
    )?;
    Ok(inserted == 1)
}

pub fn find_draft(conn: &Connection, document_id: &str) -> Result<Option<DraftRecord>, DatabaseError> {
    let draft = conn
        .query_row(
            "SELECT document_id, case_id, document_name, source_ref, created_at
             FROM drafts WHERE document_id = ?1",
            params![document_id],
            |row| {
                let created_at: String = row.get(4)?;
                Ok(DraftRecord {
                    document_id: row.get(0)?,
                    case_id: row.get(1)?,
                    document_name: row.get(2)?,
                    source_ref: row.get(3)?,
                    created_at: parse_timestamp(4, &created_at)?,
                })
            },
        )
        .optional()?;
    Ok(draft)
}

/// Distinct document ids seen for a case, sorted.
pub fn document_ids_for_case(conn: &Connection, case_id: &str) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT document_id FROM drafts WHERE case_id = ?1
         UNION
         SELECT document_id FROM jobs WHERE case_id = ?1
         ORDER BY 1",
    )?;
    let ids = stmt
        .query_map(params![case_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
