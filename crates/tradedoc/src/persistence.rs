//! Persistence port consumed by the pipeline, the review workflow and the
//! summary compiler.
//!
//! Final document mutations are compare-and-set operations keyed on the
//! version the caller read, so concurrent writers serialize at the store
//! rather than in process memory.

use crate::db::DatabaseError;
use crate::models::{
    AuditEntry, DocumentContent, DocumentSummary, DraftRecord, ErrorLogEntry, FinalDocument,
    HistoryEntry, JobRecord, JobStatus, PageClassification, PageText,
};

/// Result of a compare-and-set on a final document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The mutation was written; the record is now at `version`.
    Applied { version: u32 },
    NotFound,
    /// The record was already approved; nothing was written.
    AlreadyApproved,
    /// The record moved past the expected version; nothing was written.
    Stale { current_version: u32 },
}

pub trait Persistence: Send + Sync {
    /// Returns `false`, writing nothing, when the document already has a
    /// QUEUED or PROCESSING job.
    fn insert_job(&self, job: &JobRecord) -> Result<bool, DatabaseError>;

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, DatabaseError>;

    /// Most recent QUEUED or PROCESSING job for a document, if any.
    fn active_job_for_document(&self, document_id: &str) -> Result<Option<JobRecord>, DatabaseError>;

    /// Every job currently in `status`, oldest update first.
    fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, DatabaseError>;

    /// Moves a job from `from` to `to`. Returns `false` when the job was not in `from`.
    fn transition_job(
        &self,
        job_id: &str,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
    ) -> Result<bool, DatabaseError>;

    /// Deletes a job that is still QUEUED, for submissions the worker pool
    /// refused. Returns `false` once a worker has claimed it.
    fn withdraw_job(&self, job_id: &str) -> Result<bool, DatabaseError>;

    /// Inserts the draft linkage unless one exists. Returns whether it was inserted.
    fn insert_draft(&self, draft: &DraftRecord) -> Result<bool, DatabaseError>;

    fn get_draft(&self, document_id: &str) -> Result<Option<DraftRecord>, DatabaseError>;

    /// Document ids known for a case, from drafts and jobs.
    fn document_ids_for_case(&self, case_id: &str) -> Result<Vec<String>, DatabaseError>;

    fn insert_page_texts(&self, pages: &[PageText]) -> Result<(), DatabaseError>;

    /// Page texts of one run in page order.
    fn page_texts(&self, document_id: &str, job_id: &str) -> Result<Vec<PageText>, DatabaseError>;

    fn insert_classifications(&self, rows: &[PageClassification]) -> Result<(), DatabaseError>;

    /// Classifications of one run in page order.
    fn classifications(
        &self,
        document_id: &str,
        job_id: &str,
    ) -> Result<Vec<PageClassification>, DatabaseError>;

    /// Writes version 0 with its CREATED history entry. Returns `false` if the
    /// document already has a final record.
    fn create_final_document(&self, document: &FinalDocument, actor: &str) -> Result<bool, DatabaseError>;

    fn get_final_document(&self, document_id: &str) -> Result<Option<FinalDocument>, DatabaseError>;

    /// Replaces the content of a DRAFT record at `expected_version`, bumping the
    /// version and appending an EDITED history entry.
    fn update_final_content(
        &self,
        document_id: &str,
        expected_version: u32,
        content: &DocumentContent,
        whole_text: &str,
        editor: &str,
    ) -> Result<MutationOutcome, DatabaseError>;

    /// Approves a DRAFT record at `expected_version`. The status change, the
    /// APPROVED history entry and the insert-if-absent of `summary` commit
    /// together or not at all.
    fn approve_final_document(
        &self,
        document_id: &str,
        expected_version: u32,
        approver: &str,
        summary: &DocumentSummary,
    ) -> Result<MutationOutcome, DatabaseError>;

    /// History in the order it was written.
    fn history(&self, document_id: &str) -> Result<Vec<HistoryEntry>, DatabaseError>;

    /// Inserts unless a summary exists. Returns whether it was inserted.
    fn insert_summary(&self, summary: &DocumentSummary) -> Result<bool, DatabaseError>;

    fn get_summary(&self, document_id: &str) -> Result<Option<DocumentSummary>, DatabaseError>;

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), DatabaseError>;

    /// Audit entries of a document in the order they were written.
    fn audit_trail(&self, document_id: &str) -> Result<Vec<AuditEntry>, DatabaseError>;

    fn append_error_log(&self, entry: &ErrorLogEntry) -> Result<(), DatabaseError>;

    fn error_log(&self, document_id: &str) -> Result<Vec<ErrorLogEntry>, DatabaseError>;
}
