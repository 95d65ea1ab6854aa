//! Stand-ins for the classifier providers and the persistence port.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tradedoc::classifier::{ClassifierError, ClassifierResult, PageImageRef};
use tradedoc::db::DatabaseError;
use tradedoc::models::{
    AuditAction, AuditEntry, DocumentContent, DocumentSummary, DraftRecord, ErrorLogEntry, FinalDocument, HistoryEntry,
    JobRecord, JobStatus, PageClassification, PageText,
};
use tradedoc::worker::crossbeam_channel::{unbounded, Receiver, Sender};
use tradedoc::{Database, MutationOutcome, Persistence, Taxonomy, TextClassifier, Verdict, VisionClassifier};

/// Text classifier answering from a keyword table. The first keyword found
/// in the page (case-insensitive) wins; no match yields UNKNOWN.
pub struct KeywordClassifier {
    rules: Vec<(String, Verdict)>,
    calls: AtomicUsize,
}

impl KeywordClassifier {
    pub fn new(rules: &[(&str, &str, f64)]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|(keyword, code, confidence)| (keyword.to_lowercase(), Verdict::new(*code, *confidence)))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Invoice, packing list and bill of lading keywords, all confident.
    pub fn trade() -> Self {
        Self::new(&[
            ("invoice", "INV", 0.92),
            ("packing", "PL", 0.90),
            ("lading", "BL", 0.95),
        ])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextClassifier for KeywordClassifier {
    fn classify_text(&self, text: &str, _taxonomy: &Taxonomy) -> ClassifierResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        Ok(self
            .rules
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, verdict)| verdict.clone())
            .unwrap_or_else(Verdict::unknown))
    }
}

/// Vision classifier that cannot see anything.
pub struct BlindVision;

impl VisionClassifier for BlindVision {
    fn classify_vision(&self, page: &PageImageRef, _taxonomy: &Taxonomy) -> ClassifierResult {
        Err(ClassifierError::ImageUnavailable(format!(
            "{} page {}",
            page.source.display(),
            page.page_number
        )))
    }
}

/// Vision classifier returning the same verdict for every page.
pub struct FixedVision(pub Verdict);

impl VisionClassifier for FixedVision {
    fn classify_vision(&self, _page: &PageImageRef, _taxonomy: &Taxonomy) -> ClassifierResult {
        Ok(self.0.clone())
    }
}

/// Text classifier that parks every call until the test releases it.
///
/// Each call announces itself on `started` before blocking on `release`, so a
/// test can tell exactly when a worker is busy.
pub struct GatedClassifier {
    started: Sender<()>,
    release: Receiver<()>,
}

/// Test-side ends of a [`GatedClassifier`].
pub struct Gate {
    pub started: Receiver<()>,
    pub release: Sender<()>,
}

impl GatedClassifier {
    pub fn new() -> (Self, Gate) {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        (
            Self {
                started: started_tx,
                release: release_rx,
            },
            Gate {
                started: started_rx,
                release: release_tx,
            },
        )
    }
}

impl TextClassifier for GatedClassifier {
    fn classify_text(&self, _text: &str, _taxonomy: &Taxonomy) -> ClassifierResult {
        let _ = self.started.send(());
        let _ = self.release.recv();
        Ok(Verdict::new("PL", 0.9))
    }
}

/// Operations [`FailingPersistence`] can be told to break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Classifications,
    FinalDocument,
    /// Only the PROCESSING_COMPLETED audit entry.
    CompletionAudit,
    /// Edits and approvals always find a newer version than expected.
    VersionRace,
}

/// Delegates to a real database but fails one chosen write.
pub struct FailingPersistence {
    inner: Arc<Database>,
    fail: FailPoint,
}

impl FailingPersistence {
    pub fn new(inner: Arc<Database>, fail: FailPoint) -> Self {
        Self { inner, fail }
    }

    fn check(&self, point: FailPoint) -> Result<(), DatabaseError> {
        if self.fail == point {
            Err(DatabaseError::LockPoisoned)
        } else {
            Ok(())
        }
    }
}

impl Persistence for FailingPersistence {
    fn insert_job(&self, job: &JobRecord) -> Result<bool, DatabaseError> {
        self.inner.insert_job(job)
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, DatabaseError> {
        self.inner.get_job(job_id)
    }

    fn active_job_for_document(&self, document_id: &str) -> Result<Option<JobRecord>, DatabaseError> {
        self.inner.active_job_for_document(document_id)
    }

    fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, DatabaseError> {
        self.inner.jobs_with_status(status)
    }

    fn transition_job(
        &self,
        job_id: &str,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        self.inner.transition_job(job_id, from, to, error)
    }

    fn withdraw_job(&self, job_id: &str) -> Result<bool, DatabaseError> {
        self.inner.withdraw_job(job_id)
    }

    fn insert_draft(&self, draft: &DraftRecord) -> Result<bool, DatabaseError> {
        self.inner.insert_draft(draft)
    }

    fn get_draft(&self, document_id: &str) -> Result<Option<DraftRecord>, DatabaseError> {
        self.inner.get_draft(document_id)
    }

    fn document_ids_for_case(&self, case_id: &str) -> Result<Vec<String>, DatabaseError> {
        self.inner.document_ids_for_case(case_id)
    }

    fn insert_page_texts(&self, pages: &[PageText]) -> Result<(), DatabaseError> {
        self.inner.insert_page_texts(pages)
    }

    fn page_texts(&self, document_id: &str, job_id: &str) -> Result<Vec<PageText>, DatabaseError> {
        self.inner.page_texts(document_id, job_id)
    }

    fn insert_classifications(&self, rows: &[PageClassification]) -> Result<(), DatabaseError> {
        self.check(FailPoint::Classifications)?;
        self.inner.insert_classifications(rows)
    }

    fn classifications(
        &self,
        document_id: &str,
        job_id: &str,
    ) -> Result<Vec<PageClassification>, DatabaseError> {
        self.inner.classifications(document_id, job_id)
    }

    fn create_final_document(&self, document: &FinalDocument, actor: &str) -> Result<bool, DatabaseError> {
        self.check(FailPoint::FinalDocument)?;
        self.inner.create_final_document(document, actor)
    }

    fn get_final_document(&self, document_id: &str) -> Result<Option<FinalDocument>, DatabaseError> {
        self.inner.get_final_document(document_id)
    }

    fn update_final_content(
        &self,
        document_id: &str,
        expected_version: u32,
        content: &DocumentContent,
        whole_text: &str,
        editor: &str,
    ) -> Result<MutationOutcome, DatabaseError> {
        if self.fail == FailPoint::VersionRace {
            return Ok(MutationOutcome::Stale {
                current_version: expected_version + 1,
            });
        }
        self.inner
            .update_final_content(document_id, expected_version, content, whole_text, editor)
    }

    fn approve_final_document(
        &self,
        document_id: &str,
        expected_version: u32,
        approver: &str,
        summary: &DocumentSummary,
    ) -> Result<MutationOutcome, DatabaseError> {
        if self.fail == FailPoint::VersionRace {
            return Ok(MutationOutcome::Stale {
                current_version: expected_version + 1,
            });
        }
        self.inner
            .approve_final_document(document_id, expected_version, approver, summary)
    }

    fn history(&self, document_id: &str) -> Result<Vec<HistoryEntry>, DatabaseError> {
        self.inner.history(document_id)
    }

    fn insert_summary(&self, summary: &DocumentSummary) -> Result<bool, DatabaseError> {
        self.inner.insert_summary(summary)
    }

    fn get_summary(&self, document_id: &str) -> Result<Option<DocumentSummary>, DatabaseError> {
        self.inner.get_summary(document_id)
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        if entry.action == AuditAction::ProcessingCompleted {
            self.check(FailPoint::CompletionAudit)?;
        }
        self.inner.append_audit(entry)
    }

    fn audit_trail(&self, document_id: &str) -> Result<Vec<AuditEntry>, DatabaseError> {
        self.inner.audit_trail(document_id)
    }

    fn append_error_log(&self, entry: &ErrorLogEntry) -> Result<(), DatabaseError> {
        self.inner.append_error_log(entry)
    }

    fn error_log(&self, document_id: &str) -> Result<Vec<ErrorLogEntry>, DatabaseError> {
        self.inner.error_log(document_id)
    }
}
