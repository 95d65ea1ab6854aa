//! Workflow-facing entry point: submission, review and read access.
//!
//! Review calls surface [`WorkflowError`] through [`ServiceError::Workflow`]:
//!
//! - `NotFound`: no final document exists for the id (or no job, for
//!   [`DocumentService::job_status`]).
//! - `InvalidState`: the document is approved and can no longer be edited.
//! - `AlreadyExists`: the document already has a queued or processing job.
//! - `Conflict`: other writers kept changing the document while this call
//!   retried. Nothing was written; read the document again and retry.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;

use crate::classifier::ChatClassifier;
use crate::config::Config;
use crate::db::Database;
use crate::error::{ConfigError, ServiceError, WorkerError, WorkflowError};
use crate::lifecycle::{ApprovalResult, FinalDocumentStore};
use crate::models::{
    AuditAction, AuditEntry, DocumentContent, DocumentSummary, ErrorLogEntry, FinalDocument, HistoryEntry,
    JobRecord, JobStatus,
};
use crate::persistence::Persistence;
use crate::pipeline::{Classifiers, Pipeline, PipelineConfig};
use crate::summary::SummaryCompiler;
use crate::worker::{Job, JobResult, WorkerPool};

/// Error recorded on jobs that were PROCESSING when their process stopped.
pub const INTERRUPTED: &str = "Interrupted before completion";

/// Error log step for jobs failed during recovery.
const RECOVERY_STEP: &str = "RECOVERY";

/// Jobs found orphaned by [`DocumentService::recover_interrupted`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recovery {
    /// PROCESSING jobs moved to FAILED.
    pub failed: Vec<String>,
    /// QUEUED jobs deleted so their documents can be submitted again.
    pub withdrawn: Vec<String>,
}

pub struct DocumentService {
    persistence: Arc<dyn Persistence>,
    documents: FinalDocumentStore,
    pool: WorkerPool,
}

impl DocumentService {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        config: PipelineConfig,
        classifiers: Classifiers,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Result<Self, ServiceError> {
        let summaries = Arc::new(SummaryCompiler::new(Arc::clone(&persistence), config.products.clone()));
        let documents = FinalDocumentStore::new(Arc::clone(&persistence), summaries);
        let pipeline = Arc::new(Pipeline::new(config, Arc::clone(&persistence), classifiers));
        let pool = WorkerPool::new(pipeline, worker_count, queue_capacity)?;

        Ok(Self {
            persistence,
            documents,
            pool,
        })
    }

    /// Opens the configured database, wires the chat classifier into every
    /// classifier role and recovers jobs a previous process left behind.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let path = config.database_path().ok_or_else(|| ConfigError::Validation {
            message: "No databasePath configured and no home directory to default to".to_string(),
        })?;
        let database = Arc::new(Database::open(&path)?);

        let chat = ChatClassifier::new(config.classifier.to_chat_config(config.pdf_render_dpi)?)?;
        let classifiers = Classifiers::from_chat(Arc::new(chat));

        let service = Self::new(
            database,
            PipelineConfig::from_config(config),
            classifiers,
            config.worker_count,
            config.queue_capacity(),
        )?;
        service.recover_interrupted(Duration::from_secs(config.interrupted_job_grace_secs))?;
        Ok(service)
    }

    /// Fails PROCESSING jobs and withdraws QUEUED jobs not updated for
    /// `grace`. Only call this for jobs no live worker can own.
    pub fn recover_interrupted(&self, grace: Duration) -> Result<Recovery, ServiceError> {
        let mut recovery = Recovery::default();
        let Some(cutoff) = chrono::Duration::from_std(grace)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace))
        else {
            return Ok(recovery);
        };

        for job in self.persistence.jobs_with_status(JobStatus::Processing)? {
            if job.updated_at > cutoff {
                continue;
            }
            if !self
                .persistence
                .transition_job(&job.job_id, JobStatus::Processing, JobStatus::Failed, Some(INTERRUPTED))?
            {
                continue;
            }
            log::warn!("Job {} for document {} was interrupted, marked FAILED", job.job_id, job.document_id);
            self.record_interruption(&job);
            recovery.failed.push(job.job_id);
        }

        for job in self.persistence.jobs_with_status(JobStatus::Queued)? {
            if job.updated_at <= cutoff && self.persistence.withdraw_job(&job.job_id)? {
                log::warn!("Withdrew stale queued job {} for document {}", job.job_id, job.document_id);
                recovery.withdrawn.push(job.job_id);
            }
        }

        if !recovery.failed.is_empty() || !recovery.withdrawn.is_empty() {
            log::info!(
                "Recovered {} interrupted and {} stale queued jobs",
                recovery.failed.len(),
                recovery.withdrawn.len()
            );
        }
        Ok(recovery)
    }

    fn record_interruption(&self, job: &JobRecord) {
        let entry = ErrorLogEntry {
            case_id: job.case_id.clone(),
            document_id: job.document_id.clone(),
            step: RECOVERY_STEP.to_string(),
            error: INTERRUPTED.to_string(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.persistence.append_error_log(&entry) {
            log::error!("Failed to write error log for job {}: {}", job.job_id, e);
        }

        let audit = AuditEntry::new(
            Some(job.case_id.as_str()),
            &job.document_id,
            AuditAction::ProcessingFailed,
            INTERRUPTED,
            "SYSTEM",
        );
        if let Err(e) = self.persistence.append_audit(&audit) {
            log::error!("Failed to record interruption of job {}: {}", job.job_id, e);
        }
    }

    /// Queues a document for processing, blocking while the queue is full.
    /// Returns the job id.
    pub fn submit(&self, document_id: &str, case_id: &str, source: impl AsRef<Path>) -> Result<String, ServiceError> {
        self.enqueue(document_id, case_id, source.as_ref(), |pool, job| pool.submit(job))
    }

    /// Like [`submit`](Self::submit), but fails with `QueueFull` instead of blocking.
    pub fn try_submit(
        &self,
        document_id: &str,
        case_id: &str,
        source: impl AsRef<Path>,
    ) -> Result<String, ServiceError> {
        self.enqueue(document_id, case_id, source.as_ref(), |pool, job| pool.try_submit(job))
    }

    fn enqueue<F>(&self, document_id: &str, case_id: &str, source: &Path, send: F) -> Result<String, ServiceError>
    where
        F: FnOnce(&WorkerPool, Job) -> Result<(), WorkerError>,
    {
        let job = Job::new(document_id, case_id, source.to_path_buf());
        let now = Utc::now();
        let record = JobRecord {
            job_id: job.id.clone(),
            document_id: job.document_id.clone(),
            case_id: job.case_id.clone(),
            source_ref: job.source_path.display().to_string(),
            mime_type: job.mime_type.clone(),
            status: JobStatus::Queued,
            error: None,
            created_at: now,
            updated_at: now,
        };

        if !self.persistence.insert_job(&record)? {
            return Err(WorkflowError::AlreadyExists(format!(
                "document '{}' already has a job in progress",
                document_id
            ))
            .into());
        }

        let job_id = job.id.clone();
        if let Err(e) = send(&self.pool, job) {
            if !self.persistence.withdraw_job(&job_id)? {
                log::warn!("Rejected job {} was already claimed", job_id);
            }
            return Err(e.into());
        }

        log::info!("Queued job {} for document {}", job_id, document_id);
        Ok(job_id)
    }

    /// Next free `DOC-<case>-NNN` id for a case.
    pub fn next_document_id(&self, case_id: &str) -> Result<String, ServiceError> {
        let existing = self.persistence.document_ids_for_case(case_id)?;
        Ok(next_document_id(case_id, &existing))
    }

    pub fn job_status(&self, job_id: &str) -> Result<JobRecord, ServiceError> {
        self.persistence
            .get_job(job_id)?
            .ok_or_else(|| WorkflowError::NotFound(job_id.to_string()).into())
    }

    pub fn get_final_document(&self, document_id: &str) -> Result<FinalDocument, ServiceError> {
        Ok(self.documents.get(document_id)?)
    }

    /// Replaces the reviewed content. Returns the new version.
    ///
    /// Fails with `NotFound`, `InvalidState` once approved, or `Conflict`
    /// when concurrent edits kept winning the version race.
    pub fn edit_final_document(
        &self,
        document_id: &str,
        content: DocumentContent,
        editor: &str,
    ) -> Result<u32, ServiceError> {
        Ok(self.documents.edit(document_id, content, editor)?)
    }

    /// Approves the draft and publishes its summary. Approving twice is not an
    /// error: the second call reports `newly_approved == false`.
    ///
    /// Fails with `NotFound`, or `Conflict` when concurrent edits kept moving
    /// the version.
    pub fn approve_final_document(&self, document_id: &str, approver: &str) -> Result<ApprovalResult, ServiceError> {
        Ok(self.documents.approve(document_id, approver)?)
    }

    pub fn history(&self, document_id: &str) -> Result<Vec<HistoryEntry>, ServiceError> {
        Ok(self.documents.history(document_id)?)
    }

    pub fn summary(&self, document_id: &str) -> Result<Option<DocumentSummary>, ServiceError> {
        Ok(self.persistence.get_summary(document_id)?)
    }

    pub fn audit_trail(&self, document_id: &str) -> Result<Vec<AuditEntry>, ServiceError> {
        Ok(self.persistence.audit_trail(document_id)?)
    }

    pub fn error_log(&self, document_id: &str) -> Result<Vec<ErrorLogEntry>, ServiceError> {
        Ok(self.persistence.error_log(document_id)?)
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.pool.recv_result()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.pool.recv_result_timeout(timeout)
    }

    /// Stops the workers after their current job. Jobs still queued are
    /// withdrawn so their documents can be submitted again.
    pub fn shutdown(&self) {
        self.pool.shutdown();
        for job in self.pool.drain_pending() {
            withdraw(self.persistence.as_ref(), &job);
        }
    }

    /// Lets queued jobs finish, then stops the workers. After a shutdown,
    /// anything still queued is withdrawn instead.
    pub fn wait(self) {
        for job in self.pool.wait() {
            withdraw(self.persistence.as_ref(), &job);
        }
    }

}

fn withdraw(persistence: &dyn Persistence, job: &Job) {
    match persistence.withdraw_job(&job.id) {
        Ok(true) => log::info!("Withdrew undelivered job {} for document {}", job.id, job.document_id),
        Ok(false) => log::warn!("Undelivered job {} had already left QUEUED", job.id),
        Err(e) => log::error!("Failed to withdraw job {}: {}", job.id, e),
    }
}

/// One past the highest `DOC-<case>-NNN` sequence among `existing`.
pub fn next_document_id(case_id: &str, existing: &[String]) -> String {
    let pattern = format!(r"^DOC-{}-(\d+)$", regex::escape(case_id));
    let highest = Regex::new(&pattern)
        .map(|re| {
            existing
                .iter()
                .filter_map(|id| re.captures(id))
                .filter_map(|caps| caps[1].parse::<u32>().ok())
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);
    format!("DOC-{}-{:03}", case_id, highest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_document_id() {
        assert_eq!(next_document_id("C1", &[]), "DOC-C1-001");
    }

    #[test]
    fn test_next_document_id_skips_gaps() {
        let existing = ids(&["DOC-C1-001", "DOC-C1-007", "DOC-C1-003"]);
        assert_eq!(next_document_id("C1", &existing), "DOC-C1-008");
    }

    #[test]
    fn test_next_document_id_ignores_other_shapes() {
        let existing = ids(&["DOC-C10-050", "upload-1", "DOC-C1-abc", "DOC-C1-002"]);
        assert_eq!(next_document_id("C1", &existing), "DOC-C1-003");
    }

    #[test]
    fn test_case_ids_with_regex_characters() {
        let existing = ids(&["DOC-TF.2024-004", "DOC-TFX2024-009"]);
        assert_eq!(next_document_id("TF.2024", &existing), "DOC-TF.2024-005");
    }

    #[test]
    fn test_sequence_past_three_digits() {
        let existing = ids(&["DOC-C1-999"]);
        assert_eq!(next_document_id("C1", &existing), "DOC-C1-1000");
    }
}
