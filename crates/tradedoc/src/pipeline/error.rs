use std::fmt;

use thiserror::Error;

use crate::models::JobStatus;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document processing failed: {0}")]
    Processing(#[from] crate::error::ProcessError),

    #[error("Persistence failed: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Final document step failed: {0}")]
    Workflow(#[from] crate::error::WorkflowError),

    #[error("Job '{job_id}' could not move from {from} to {to}")]
    InvalidJobTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Pipeline step a failure is attributed to in the error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Start,
    Draft,
    TextAcquisition,
    Classification,
    FinalDocument,
    Summary,
    Complete,
}

impl PipelineStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Draft => "DRAFT",
            Self::TextAcquisition => "OCR",
            Self::Classification => "CLASSIFICATION",
            Self::FinalDocument => "FINAL_JSON",
            Self::Summary => "SUMMARY",
            Self::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
