//! Records shared by the pipeline, the review workflow and the persistence port.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel code for pages no classifier could place in the taxonomy.
pub const UNKNOWN_CODE: &str = "UNKNOWN";

/// Document name recorded for [`UNKNOWN_CODE`] pages.
pub const UNKNOWN_NAME: &str = "unknown";

/// Returned when a stored status/tag string does not map to a known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} value: '{value}'")]
pub struct ParseTagError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a fieldless enum persisted as a fixed upper-case tag.
macro_rules! tagged_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $tag:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $tag)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $tag,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseTagError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok(Self::$variant),)+
                    other => Err(ParseTagError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

tagged_enum!(
    /// Lifecycle of one processing run.
    JobStatus, "job status" {
        Queued => "QUEUED",
        Processing => "PROCESSING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
);

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Transitions move forward along QUEUED → PROCESSING → {COMPLETED | FAILED}.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

tagged_enum!(
    /// Which classifier(s) the accepted page classification came from.
    FusionSource, "fusion source" {
        Text => "TEXT",
        Vision => "VISION",
        TextVision => "TEXT+VISION",
        Weighted => "WEIGHTED",
        None => "NONE",
    }
);

tagged_enum!(
    FinalStatus, "final document status" {
        Draft => "DRAFT",
        Approved => "APPROVED",
    }
);

tagged_enum!(
    HistoryAction, "history action" {
        Created => "CREATED",
        Edited => "EDITED",
        Approved => "APPROVED",
    }
);

tagged_enum!(
    AuditAction, "audit action" {
        ProcessingStarted => "PROCESSING_STARTED",
        OcrStarted => "OCR_STARTED",
        OcrCompleted => "OCR_COMPLETED",
        ClassificationCompleted => "CLASSIFICATION_COMPLETED",
        FinalJsonCreated => "FINAL_JSON_CREATED",
        ProcessingCompleted => "PROCESSING_COMPLETED",
        ProcessingFailed => "PROCESSING_FAILED",
        FinalDocumentEdited => "FINAL_DOCUMENT_EDITED",
        FinalDocumentApproved => "FINAL_DOCUMENT_APPROVED",
    }
);

tagged_enum!(
    /// Product line derived from the classified document names of an approved record.
    ProductCategory, "product category" {
        TradeFinance => "Trade Finance",
        Insurance => "Insurance",
        Onboarding => "Onboarding",
        Unknown => "Unknown",
    }
);

/// One processing run for a submitted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub document_id: String,
    pub case_id: String,
    pub source_ref: String,
    pub mime_type: Option<String>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Links a document id to its case and source before any text is extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub document_id: String,
    pub case_id: String,
    pub document_name: String,
    pub source_ref: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub document_id: String,
    pub job_id: String,
    pub page_number: u32,
    pub text: String,
    /// Signature/stamp description, or `"N/A"` for direct text ingestion.
    pub annotation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageClassification {
    pub document_id: String,
    pub job_id: String,
    pub page_number: u32,
    pub code: String,
    pub document_name: String,
    pub source_text: String,
    pub fusion_source: FusionSource,
    pub is_external: bool,
}

/// A page as it appears inside the reviewed content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    pub page_number: u32,
    pub text: String,
    pub annotation: String,
}

/// Document name → pages in page order.
pub type DocumentContent = BTreeMap<String, Vec<PageEntry>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDocument {
    pub document_id: String,
    pub case_id: String,
    pub content: DocumentContent,
    pub whole_text: String,
    pub status: FinalStatus,
    pub version: u32,
    pub last_editor: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub document_id: String,
    pub version: u32,
    pub content: DocumentContent,
    pub action: HistoryAction,
    pub actor: String,
    pub recorded_at: DateTime<Utc>,
}

/// Immutable snapshot published once a final document is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub case_id: String,
    pub document_id: String,
    pub product: ProductCategory,
    pub document_names: Vec<String>,
    pub content: DocumentContent,
    pub approved_version: u32,
    pub approved_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub case_id: Option<String>,
    pub document_id: String,
    pub action: AuditAction,
    pub message: String,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        case_id: Option<&str>,
        document_id: &str,
        action: AuditAction,
        message: impl Into<String>,
        source: &str,
    ) -> Self {
        Self {
            case_id: case_id.map(str::to_string),
            document_id: document_id.to_string(),
            action,
            message: message.into(),
            source: source.to_string(),
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub case_id: String,
    pub document_id: String,
    pub step: String,
    pub error: String,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_fusion_source_tags() {
        assert_eq!(FusionSource::TextVision.as_str(), "TEXT+VISION");
        assert_eq!(
            "WEIGHTED".parse::<FusionSource>().unwrap(),
            FusionSource::Weighted
        );
        assert_eq!(FusionSource::None.to_string(), "NONE");
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = "ARCHIVED".parse::<FinalStatus>().unwrap_err();
        assert_eq!(err.kind, "final document status");
        assert_eq!(err.value, "ARCHIVED");
    }

    #[test]
    fn test_tags_serialize_as_strings() {
        let json = serde_json::to_string(&HistoryAction::Approved).unwrap();
        assert_eq!(json, "\"APPROVED\"");
        let product: ProductCategory = serde_json::from_str("\"Trade Finance\"").unwrap();
        assert_eq!(product, ProductCategory::TradeFinance);
    }
}
