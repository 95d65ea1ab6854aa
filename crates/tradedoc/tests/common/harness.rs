//! Test harness for isolated test execution.
//!
//! The `TestHarness` owns a temporary directory holding input documents and a
//! file-backed database, and wires services and pipelines over it.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use tradedoc::models::{JobRecord, JobStatus};
use tradedoc::processor::{NoopAnnotator, NoopOcr};
use tradedoc::summary::ProductSets;
use tradedoc::worker::{Job, JobResult};
use tradedoc::{
    Classifiers, Database, DocumentForm, DocumentService, FusionThresholds, Persistence, Pipeline,
    PipelineConfig, Taxonomy, TextClassifier, VisionClassifier,
};

/// Upper bound on how long a test waits for a worker result.
pub const RESULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub db: Arc<Database>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input_dir = temp_dir.path().join("input");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        let db = Database::open(&temp_dir.path().join("data").join("tradedoc.db"))
            .expect("Failed to open database");

        Self {
            temp_dir,
            input_dir,
            db: Arc::new(db),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    pub fn write_text_input(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn write_input(&self, filename: &str, bytes: &[u8]) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, bytes).expect("Failed to write input file");
        path
    }

    /// Taxonomy used across the integration tests.
    pub fn taxonomy() -> Taxonomy {
        Taxonomy::new(&Self::forms())
    }

    pub fn forms() -> Vec<DocumentForm> {
        vec![
            DocumentForm::new("INV", "Invoice"),
            DocumentForm::new("PL", "Packing List"),
            DocumentForm::new("BL", "Bill of Lading"),
            DocumentForm::new("KYC", "KYC"),
        ]
    }

    pub fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            taxonomy: Self::taxonomy(),
            thresholds: FusionThresholds::default(),
            products: ProductSets::default(),
        }
    }

    pub fn classifiers(
        text: Arc<dyn TextClassifier>,
        vision: Arc<dyn VisionClassifier>,
    ) -> Classifiers {
        Classifiers {
            text,
            vision,
            annotator: Arc::new(NoopAnnotator),
            ocr: Arc::new(NoopOcr),
        }
    }

    /// Service over the harness database.
    pub fn service(&self, classifiers: Classifiers, workers: usize, capacity: usize) -> DocumentService {
        self.service_with(self.db.clone(), classifiers, workers, capacity)
    }

    pub fn service_with(
        &self,
        persistence: Arc<dyn Persistence>,
        classifiers: Classifiers,
        workers: usize,
        capacity: usize,
    ) -> DocumentService {
        DocumentService::new(persistence, Self::pipeline_config(), classifiers, workers, capacity)
            .expect("Failed to start service")
    }

    pub fn pipeline(&self, persistence: Arc<dyn Persistence>, classifiers: Classifiers) -> Pipeline {
        Pipeline::new(Self::pipeline_config(), persistence, classifiers)
    }

    /// Records a QUEUED job the way the service does before handing it to a worker.
    pub fn queue_job(&self, document_id: &str, case_id: &str, source: PathBuf) -> Job {
        let job = Job::new(document_id, case_id, source);
        let now = Utc::now();
        let inserted = self
            .db
            .insert_job(&JobRecord {
                job_id: job.id.clone(),
                document_id: job.document_id.clone(),
                case_id: job.case_id.clone(),
                source_ref: job.source_path.display().to_string(),
                mime_type: job.mime_type.clone(),
                status: JobStatus::Queued,
                error: None,
                created_at: now,
                updated_at: now,
            })
            .expect("Failed to insert job");
        assert!(inserted, "document {} already has an active job", document_id);
        job
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for the next result, failing the test on timeout.
pub fn next_result(service: &DocumentService) -> JobResult {
    service
        .recv_result_timeout(RESULT_TIMEOUT)
        .expect("Timed out waiting for a job result")
}
