//! Versioned final documents: DRAFT → (edits) → APPROVED.
//!
//! Every mutation is a compare-and-set on the version the caller read, so two
//! writers racing on the same document cannot both win. A writer that loses
//! the race re-reads and tries again, a bounded number of times.

use std::sync::Arc;

use chrono::Utc;

use crate::error::WorkflowError;
use crate::models::{
    AuditAction, AuditEntry, DocumentContent, FinalDocument, FinalStatus, HistoryEntry, PageClassification,
    PageEntry, PageText,
};
use crate::persistence::{MutationOutcome, Persistence};
use crate::summary::SummaryCompiler;

/// Attempts per mutation before giving up with [`WorkflowError::Conflict`].
const MAX_ATTEMPTS: usize = 3;

/// Outcome of an approval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalResult {
    pub document_id: String,
    pub status: FinalStatus,
    pub version: u32,
    /// `false` when the document had already been approved.
    pub newly_approved: bool,
}

pub struct FinalDocumentStore {
    persistence: Arc<dyn Persistence>,
    summaries: Arc<SummaryCompiler>,
}

impl FinalDocumentStore {
    pub fn new(persistence: Arc<dyn Persistence>, summaries: Arc<SummaryCompiler>) -> Self {
        Self {
            persistence,
            summaries,
        }
    }

    /// Writes version 0 of a document. Fails if the document already has a final record.
    pub fn create(
        &self,
        document_id: &str,
        case_id: &str,
        content: DocumentContent,
        whole_text: String,
        actor: &str,
    ) -> Result<FinalDocument, WorkflowError> {
        let now = Utc::now();
        let document = FinalDocument {
            document_id: document_id.to_string(),
            case_id: case_id.to_string(),
            content,
            whole_text,
            status: FinalStatus::Draft,
            version: 0,
            last_editor: None,
            created_at: now,
            updated_at: now,
        };

        if !self.persistence.create_final_document(&document, actor)? {
            return Err(WorkflowError::AlreadyExists(document_id.to_string()));
        }
        tracing::info!(document_id, "Final document created at version 0");
        Ok(document)
    }

    pub fn get(&self, document_id: &str) -> Result<FinalDocument, WorkflowError> {
        self.persistence
            .get_final_document(document_id)?
            .ok_or_else(|| WorkflowError::NotFound(document_id.to_string()))
    }

    pub fn history(&self, document_id: &str) -> Result<Vec<HistoryEntry>, WorkflowError> {
        let history = self.persistence.history(document_id)?;
        if history.is_empty() {
            return Err(WorkflowError::NotFound(document_id.to_string()));
        }
        Ok(history)
    }

    /// Replaces the content of a draft. Returns the new version.
    ///
    /// The stored whole text is rebuilt from the new content.
    pub fn edit(&self, document_id: &str, content: DocumentContent, editor: &str) -> Result<u32, WorkflowError> {
        let text = whole_text(&content);

        for attempt in 1..=MAX_ATTEMPTS {
            let current = self.get(document_id)?;
            if current.status == FinalStatus::Approved {
                return Err(approved_is_final(document_id));
            }

            match self
                .persistence
                .update_final_content(document_id, current.version, &content, &text, editor)?
            {
                MutationOutcome::Applied { version } => {
                    tracing::info!(document_id, version, editor, "Final document edited");
                    self.audit(
                        &current,
                        AuditAction::FinalDocumentEdited,
                        format!("Reviewer updated content (version {})", version),
                        editor,
                    );
                    return Ok(version);
                }
                MutationOutcome::NotFound => {
                    return Err(WorkflowError::NotFound(document_id.to_string()))
                }
                MutationOutcome::AlreadyApproved => return Err(approved_is_final(document_id)),
                MutationOutcome::Stale { current_version } => {
                    tracing::debug!(
                        document_id,
                        attempt,
                        expected = current.version,
                        current_version,
                        "Edit lost a version race, retrying"
                    );
                }
            }
        }

        Err(WorkflowError::Conflict(document_id.to_string()))
    }

    /// Approves a draft and publishes its summary in the same commit.
    ///
    /// Approving an approved document succeeds without writing anything.
    pub fn approve(&self, document_id: &str, approver: &str) -> Result<ApprovalResult, WorkflowError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let current = self.get(document_id)?;
            if current.status == FinalStatus::Approved {
                return Ok(already_approved(&current));
            }

            let summary = self.summaries.compile(&current, approver);
            match self
                .persistence
                .approve_final_document(document_id, current.version, approver, &summary)?
            {
                MutationOutcome::Applied { version } => {
                    tracing::info!(document_id, version, approver, product = %summary.product, "Final document approved");
                    self.audit(
                        &current,
                        AuditAction::FinalDocumentApproved,
                        format!("Approved and locked at version {}", version),
                        approver,
                    );
                    return Ok(ApprovalResult {
                        document_id: document_id.to_string(),
                        status: FinalStatus::Approved,
                        version,
                        newly_approved: true,
                    });
                }
                MutationOutcome::AlreadyApproved => {
                    return Ok(already_approved(&self.get(document_id)?));
                }
                MutationOutcome::NotFound => {
                    return Err(WorkflowError::NotFound(document_id.to_string()))
                }
                MutationOutcome::Stale { current_version } => {
                    tracing::debug!(
                        document_id,
                        attempt,
                        expected = current.version,
                        current_version,
                        "Approval lost a version race, retrying"
                    );
                }
            }
        }

        Err(WorkflowError::Conflict(document_id.to_string()))
    }

    /// Audit entries for reviewer actions are written after the commit; a
    /// failure here cannot undo the mutation and is only logged.
    fn audit(&self, document: &FinalDocument, action: AuditAction, message: String, actor: &str) {
        let entry = AuditEntry::new(
            Some(document.case_id.as_str()),
            &document.document_id,
            action,
            message,
            actor,
        );
        if let Err(e) = self.persistence.append_audit(&entry) {
            tracing::warn!(
                document_id = %document.document_id,
                action = %action,
                "Failed to write audit entry: {}",
                e
            );
        }
    }
}

fn approved_is_final(document_id: &str) -> WorkflowError {
    WorkflowError::invalid_state(document_id, "approved documents cannot be edited")
}

fn already_approved(document: &FinalDocument) -> ApprovalResult {
    ApprovalResult {
        document_id: document.document_id.clone(),
        status: FinalStatus::Approved,
        version: document.version,
        newly_approved: false,
    }
}

/// Groups page texts by classified document name, pages in page order.
///
/// Pages without a classification are left out.
pub fn assemble_content(pages: &[PageText], classifications: &[PageClassification]) -> DocumentContent {
    let mut content = DocumentContent::new();
    for page in pages {
        let Some(class) = classifications.iter().find(|c| c.page_number == page.page_number) else {
            continue;
        };
        content
            .entry(class.document_name.clone())
            .or_default()
            .push(PageEntry {
                page_number: page.page_number,
                text: page.text.clone(),
                annotation: page.annotation.clone(),
            });
    }
    for entries in content.values_mut() {
        entries.sort_by_key(|e| e.page_number);
    }
    content
}

/// All page texts of a document in page order, separated by blank lines.
pub fn whole_text(content: &DocumentContent) -> String {
    let mut pages: Vec<&PageEntry> = content.values().flatten().collect();
    pages.sort_by_key(|p| p.page_number);
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{FusionSource, HistoryAction};
    use crate::summary::ProductSets;

    fn store() -> (Arc<Database>, FinalDocumentStore) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let compiler = Arc::new(SummaryCompiler::new(db.clone(), ProductSets::default()));
        (db.clone(), FinalDocumentStore::new(db, compiler))
    }

    fn page(page_number: u32, text: &str) -> PageEntry {
        PageEntry {
            page_number,
            text: text.to_string(),
            annotation: "N/A".to_string(),
        }
    }

    fn two_names() -> DocumentContent {
        let mut content = DocumentContent::new();
        content.insert("invoice".to_string(), vec![page(1, "Invoice 42")]);
        content.insert("packing_list".to_string(), vec![page(2, "12 cartons")]);
        content
    }

    fn create(store: &FinalDocumentStore) -> Result<FinalDocument, WorkflowError> {
        store.create("D1", "C1", two_names(), "Invoice 42\n\n12 cartons".to_string(), "SYSTEM")
    }

    #[test]
    fn test_create_twice_is_rejected() {
        let (_, store) = store();
        let created = create(&store).unwrap();
        assert_eq!(created.version, 0);
        assert_eq!(created.whole_text, "Invoice 42\n\n12 cartons");

        let again = create(&store);
        assert!(matches!(again, Err(WorkflowError::AlreadyExists(_))));
    }

    #[test]
    fn test_versions_count_mutations() {
        let (_, store) = store();
        create(&store).unwrap();

        for n in 1..=4u32 {
            let mut content = two_names();
            content.insert("note".to_string(), vec![page(3, &format!("edit {}", n))]);
            assert_eq!(store.edit("D1", content, "bob").unwrap(), n);
        }

        let document = store.get("D1").unwrap();
        assert_eq!(document.version, 4);
        assert_eq!(store.history("D1").unwrap().len(), 5);
        assert!(document.whole_text.ends_with("edit 4"));
    }

    #[test]
    fn test_review_scenario() {
        let (db, store) = store();
        create(&store).unwrap();

        let mut edited = two_names();
        edited.insert("bill_of_lading".to_string(), vec![page(3, "MV Example")]);
        assert_eq!(store.edit("D1", edited, "bob").unwrap(), 1);

        let result = store.approve("D1", "alice").unwrap();
        assert_eq!(
            result,
            ApprovalResult {
                document_id: "D1".to_string(),
                status: FinalStatus::Approved,
                version: 1,
                newly_approved: true,
            }
        );

        let history: Vec<(HistoryAction, u32)> = store
            .history("D1")
            .unwrap()
            .into_iter()
            .map(|h| (h.action, h.version))
            .collect();
        assert_eq!(
            history,
            vec![
                (HistoryAction::Created, 0),
                (HistoryAction::Edited, 1),
                (HistoryAction::Approved, 1)
            ]
        );

        let summary = db.get_summary("D1").unwrap().unwrap();
        assert_eq!(summary.approved_version, 1);
        assert_eq!(summary.approved_by, "alice");
        assert_eq!(
            summary.document_names,
            vec!["bill_of_lading", "invoice", "packing_list"]
        );
    }

    #[test]
    fn test_second_approval_is_a_no_op() {
        let (db, store) = store();
        create(&store).unwrap();

        assert!(store.approve("D1", "alice").unwrap().newly_approved);
        let second = store.approve("D1", "bob").unwrap();
        assert!(!second.newly_approved);
        assert_eq!(second.status, FinalStatus::Approved);

        let approvals = store
            .history("D1")
            .unwrap()
            .iter()
            .filter(|h| h.action == HistoryAction::Approved)
            .count();
        assert_eq!(approvals, 1);
        assert_eq!(db.get_summary("D1").unwrap().unwrap().approved_by, "alice");

        let audits: Vec<_> = db
            .audit_trail("D1")
            .unwrap()
            .into_iter()
            .filter(|a| a.action == AuditAction::FinalDocumentApproved)
            .collect();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].case_id.as_deref(), Some("C1"));
        assert_eq!(audits[0].source, "alice");
    }

    #[test]
    fn test_reviewer_audit_entries_carry_the_case() {
        let (db, store) = store();
        create(&store).unwrap();
        store.edit("D1", two_names(), "carol").unwrap();

        let edited = db
            .audit_trail("D1")
            .unwrap()
            .into_iter()
            .find(|a| a.action == AuditAction::FinalDocumentEdited)
            .unwrap();
        assert_eq!(edited.case_id.as_deref(), Some("C1"));
        assert_eq!(edited.source, "carol");
    }

    #[test]
    fn test_edit_after_approval_changes_nothing() {
        let (_, store) = store();
        create(&store).unwrap();
        store.approve("D1", "alice").unwrap();
        let before = store.get("D1").unwrap();

        let result = store.edit("D1", DocumentContent::new(), "bob");
        assert!(matches!(result, Err(WorkflowError::InvalidState { .. })));

        let after = store.get("D1").unwrap();
        assert_eq!(after.version, before.version);
        assert_eq!(after.content, before.content);
        assert_eq!(store.history("D1").unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_document() {
        let (_, store) = store();
        assert!(matches!(store.get("nope"), Err(WorkflowError::NotFound(_))));
        assert!(matches!(
            store.edit("nope", DocumentContent::new(), "bob"),
            Err(WorkflowError::NotFound(_))
        ));
        assert!(matches!(store.approve("nope", "alice"), Err(WorkflowError::NotFound(_))));
        assert!(matches!(store.history("nope"), Err(WorkflowError::NotFound(_))));
    }

    #[test]
    fn test_assemble_content_groups_by_name() {
        let text = |n: u32| PageText {
            document_id: "D1".to_string(),
            job_id: "J1".to_string(),
            page_number: n,
            text: format!("page {}", n),
            annotation: "No signature or stamp detected.".to_string(),
        };
        let class = |n: u32, name: &str| PageClassification {
            document_id: "D1".to_string(),
            job_id: "J1".to_string(),
            page_number: n,
            code: "X".to_string(),
            document_name: name.to_string(),
            source_text: String::new(),
            fusion_source: FusionSource::Text,
            is_external: false,
        };

        let content = assemble_content(
            &[text(3), text(1), text(2), text(4)],
            &[class(1, "invoice"), class(2, "packing_list"), class(3, "invoice")],
        );

        assert_eq!(content.len(), 2);
        let invoice: Vec<u32> = content["invoice"].iter().map(|p| p.page_number).collect();
        assert_eq!(invoice, vec![1, 3]);
        assert_eq!(content["packing_list"][0].text, "page 2");
        assert_eq!(whole_text(&content), "page 1\n\npage 2\n\npage 3");
    }
}
