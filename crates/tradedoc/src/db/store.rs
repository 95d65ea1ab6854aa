//! `Persistence` implementation over the SQLite repositories.

use chrono::Utc;
use rusqlite::Connection;

use super::{audit_repo, final_repo, job_repo, page_repo, summary_repo, Database, DatabaseError};
use crate::models::{
    AuditEntry, DocumentContent, DocumentSummary, DraftRecord, ErrorLogEntry, FinalDocument,
    FinalStatus, HistoryAction, HistoryEntry, JobRecord, JobStatus, PageClassification, PageText,
};
use crate::persistence::{MutationOutcome, Persistence};

/// Explains why a guarded update touched no row.
fn missed_update(conn: &Connection, document_id: &str) -> Result<MutationOutcome, DatabaseError> {
    Ok(match final_repo::status_and_version(conn, document_id)? {
        None => MutationOutcome::NotFound,
        Some((FinalStatus::Approved, _)) => MutationOutcome::AlreadyApproved,
        Some((FinalStatus::Draft, current_version)) => MutationOutcome::Stale { current_version },
    })
}

impl Persistence for Database {
    fn insert_job(&self, job: &JobRecord) -> Result<bool, DatabaseError> {
        self.with_conn(|conn| job_repo::insert(conn, job))
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, DatabaseError> {
        self.with_conn(|conn| job_repo::find_by_id(conn, job_id))
    }

    fn active_job_for_document(&self, document_id: &str) -> Result<Option<JobRecord>, DatabaseError> {
        self.with_conn(|conn| job_repo::find_active_for_document(conn, document_id))
    }

    fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, DatabaseError> {
        self.with_conn(|conn| job_repo::find_by_status(conn, status))
    }

    fn transition_job(
        &self,
        job_id: &str,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        if !from.can_transition_to(to) {
            log::warn!("Refusing job transition {} -> {} for {}", from, to, job_id);
            return Ok(false);
        }
        self.with_conn(|conn| job_repo::transition(conn, job_id, from, to, error))
    }

    fn withdraw_job(&self, job_id: &str) -> Result<bool, DatabaseError> {
        self.with_conn(|conn| job_repo::delete_queued(conn, job_id))
    }

    fn insert_draft(&self, draft: &DraftRecord) -> Result<bool, DatabaseError> {
        self.with_conn(|conn| job_repo::insert_draft(conn, draft))
    }

    fn get_draft(&self, document_id: &str) -> Result<Option<DraftRecord>, DatabaseError> {
        self.with_conn(|conn| job_repo::find_draft(conn, document_id))
    }

    fn document_ids_for_case(&self, case_id: &str) -> Result<Vec<String>, DatabaseError> {
        self.with_conn(|conn| job_repo::document_ids_for_case(conn, case_id))
    }

    fn insert_page_texts(&self, pages: &[PageText]) -> Result<(), DatabaseError> {
        self.with_tx(|tx| page_repo::insert_texts(tx, pages))
    }

    fn page_texts(&self, document_id: &str, job_id: &str) -> Result<Vec<PageText>, DatabaseError> {
        self.with_conn(|conn| page_repo::find_texts(conn, document_id, job_id))
    }

    fn insert_classifications(&self, rows: &[PageClassification]) -> Result<(), DatabaseError> {
        self.with_tx(|tx| page_repo::insert_classifications(tx, rows))
    }

    fn classifications(
        &self,
        document_id: &str,
        job_id: &str,
    ) -> Result<Vec<PageClassification>, DatabaseError> {
        self.with_conn(|conn| page_repo::find_classifications(conn, document_id, job_id))
    }

    fn create_final_document(&self, document: &FinalDocument, actor: &str) -> Result<bool, DatabaseError> {
        self.with_tx(|tx| {
            if !final_repo::insert(tx, document)? {
                return Ok(false);
            }
            final_repo::insert_history(
                tx,
                &HistoryEntry {
                    document_id: document.document_id.clone(),
                    version: document.version,
                    content: document.content.clone(),
                    action: HistoryAction::Created,
                    actor: actor.to_string(),
                    recorded_at: document.created_at,
                },
            )?;
            Ok(true)
        })
    }

    fn get_final_document(&self, document_id: &str) -> Result<Option<FinalDocument>, DatabaseError> {
        self.with_conn(|conn| final_repo::find(conn, document_id))
    }

    fn update_final_content(
        &self,
        document_id: &str,
        expected_version: u32,
        content: &DocumentContent,
        whole_text: &str,
        editor: &str,
    ) -> Result<MutationOutcome, DatabaseError> {
        let now = Utc::now();
        self.with_tx(|tx| {
            if !final_repo::update_content(tx, document_id, expected_version, content, whole_text, editor, &now)? {
                return missed_update(tx, document_id);
            }

            let version = expected_version + 1;
            final_repo::insert_history(
                tx,
                &HistoryEntry {
                    document_id: document_id.to_string(),
                    version,
                    content: content.clone(),
                    action: HistoryAction::Edited,
                    actor: editor.to_string(),
                    recorded_at: now,
                },
            )?;
            Ok(MutationOutcome::Applied { version })
        })
    }

    fn approve_final_document(
        &self,
        document_id: &str,
        expected_version: u32,
        approver: &str,
        summary: &DocumentSummary,
    ) -> Result<MutationOutcome, DatabaseError> {
        let now = Utc::now();
        self.with_tx(|tx| {
            let Some(document) = final_repo::find(tx, document_id)? else {
                return Ok(MutationOutcome::NotFound);
            };
            if !final_repo::mark_approved(tx, document_id, expected_version, approver, &now)? {
                return missed_update(tx, document_id);
            }

            final_repo::insert_history(
                tx,
                &HistoryEntry {
                    document_id: document_id.to_string(),
                    version: document.version,
                    content: document.content,
                    action: HistoryAction::Approved,
                    actor: approver.to_string(),
                    recorded_at: now,
                },
            )?;
            if !summary_repo::insert_if_absent(tx, summary)? {
                log::debug!("Summary for {} already present at approval", document_id);
            }
            Ok(MutationOutcome::Applied {
                version: document.version,
            })
        })
    }

    fn history(&self, document_id: &str) -> Result<Vec<HistoryEntry>, DatabaseError> {
        self.with_conn(|conn| final_repo::find_history(conn, document_id))
    }

    fn insert_summary(&self, summary: &DocumentSummary) -> Result<bool, DatabaseError> {
        self.with_conn(|conn| summary_repo::insert_if_absent(conn, summary))
    }

    fn get_summary(&self, document_id: &str) -> Result<Option<DocumentSummary>, DatabaseError> {
        self.with_conn(|conn| summary_repo::find(conn, document_id))
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        self.with_conn(|conn| audit_repo::append(conn, entry))
    }

    fn audit_trail(&self, document_id: &str) -> Result<Vec<AuditEntry>, DatabaseError> {
        self.with_conn(|conn| audit_repo::find_for_document(conn, document_id))
    }

    fn append_error_log(&self, entry: &ErrorLogEntry) -> Result<(), DatabaseError> {
        self.with_conn(|conn| audit_repo::append_error(conn, entry))
    }

    fn error_log(&self, document_id: &str) -> Result<Vec<ErrorLogEntry>, DatabaseError> {
        self.with_conn(|conn| audit_repo::find_errors(conn, document_id))
    }
}
