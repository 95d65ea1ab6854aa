use std::path::{Path, PathBuf};

use crate::models::JobStatus;

/// A document run handed to the worker pool.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub document_id: String,
    pub case_id: String,
    pub source_path: PathBuf,
    /// MIME type of the source (e.g. "application/pdf", "text/plain").
    pub mime_type: Option<String>,
}

impl Job {
    /// Creates a job with a fresh id, detecting the MIME type from the path.
    pub fn new(document_id: &str, case_id: &str, source_path: PathBuf) -> Self {
        let mime_type = Self::detect_mime_type(&source_path);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            case_id: case_id.to_string(),
            source_path,
            mime_type,
        }
    }

    /// Returns `None` for unknown extensions.
    fn detect_mime_type(path: &Path) -> Option<String> {
        mime_guess::from_path(path).first().map(|m| m.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub document_id: String,
    pub case_id: String,
    pub status: JobStatus,
    pub pages: usize,
    /// Version of the final document the run produced.
    pub final_version: Option<u32>,
    pub error: Option<String>,
}

impl JobResult {
    pub fn success(job: &Job, pages: usize, final_version: u32) -> Self {
        Self {
            job_id: job.id.clone(),
            document_id: job.document_id.clone(),
            case_id: job.case_id.clone(),
            status: JobStatus::Completed,
            pages,
            final_version: Some(final_version),
            error: None,
        }
    }

    pub fn failure(job: &Job, error: String) -> Self {
        Self {
            job_id: job.id.clone(),
            document_id: job.document_id.clone(),
            case_id: job.case_id.clone(),
            status: JobStatus::Failed,
            pages: 0,
            final_version: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_new() {
        let job = Job::new("DOC-C1-001", "C1", PathBuf::from("/uploads/DOC-C1-001.pdf"));
        assert!(!job.id.is_empty());
        assert_eq!(job.document_id, "DOC-C1-001");
        assert_eq!(job.case_id, "C1");
        assert_eq!(job.mime_type, Some("application/pdf".to_string()));
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = Job::new("D1", "C1", PathBuf::from("a.txt"));
        let b = Job::new("D1", "C1", PathBuf::from("a.txt"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_job_mime_type_detection() {
        let job = Job::new("D1", "C1", PathBuf::from("scan.png"));
        assert_eq!(job.mime_type, Some("image/png".to_string()));

        let job = Job::new("D1", "C1", PathBuf::from("notes.txt"));
        assert_eq!(job.mime_type, Some("text/plain".to_string()));

        let job = Job::new("D1", "C1", PathBuf::from("test.xyz123"));
        assert!(job.mime_type.is_none());
    }

    #[test]
    fn test_job_result_success() {
        let job = Job::new("D1", "C1", PathBuf::from("/uploads/doc.pdf"));
        let result = JobResult::success(&job, 3, 0);

        assert!(result.is_success());
        assert_eq!(result.job_id, job.id);
        assert_eq!(result.pages, 3);
        assert_eq!(result.final_version, Some(0));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_job_result_failure() {
        let job = Job::new("D1", "C1", PathBuf::from("/uploads/doc.pdf"));
        let result = JobResult::failure(&job, "Test error".to_string());

        assert!(!result.is_success());
        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.final_version.is_none());
        assert_eq!(result.error, Some("Test error".to_string()));
    }
}
