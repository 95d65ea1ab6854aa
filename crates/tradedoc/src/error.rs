use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradeDocError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] crate::classifier::ClassifierError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid document form '{code}': {reason}")]
    InvalidDocumentForm { code: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    #[error("OCR failed for page {page}: {reason}")]
    Ocr { page: u32, reason: String },

    #[error("Document has no pages: {0}")]
    NoPages(PathBuf),
}

/// Rejections raised by the review workflow. None of them mutate state.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid state for document '{document_id}': {reason}")]
    InvalidState { document_id: String, reason: String },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Concurrent modification of document '{0}' did not settle")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl WorkflowError {
    pub fn invalid_state(document_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            document_id: document_id.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Submission queue is full ({capacity} pending jobs)")]
    QueueFull { capacity: usize },
}

/// Errors surfaced by [`crate::service::DocumentService`].
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Classifier setup failed: {0}")]
    Classifier(#[from] crate::classifier::ClassifierError),

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, TradeDocError>;
