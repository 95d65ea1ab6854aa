pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod fusion;
pub mod lifecycle;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod summary;
pub mod taxonomy;
pub mod telemetry;
pub mod worker;

pub use classifier::{ChatClassifier, ChatClassifierConfig, TextClassifier, Verdict, VisionClassifier};
pub use config::{load_config, Config};
pub use db::Database;
pub use error::{
    ConfigError, ProcessError, Result, ServiceError, TradeDocError, WorkerError, WorkflowError,
};
pub use fusion::{fuse, FusionEngine, FusionThresholds};
pub use lifecycle::{ApprovalResult, FinalDocumentStore};
pub use persistence::{MutationOutcome, Persistence};
pub use pipeline::{Classifiers, Pipeline, PipelineConfig, PipelineContext};
pub use secrets::{resolve_secret, SecretError};
pub use service::DocumentService;
pub use summary::{detect_product, SummaryCompiler};
pub use taxonomy::{DocumentForm, Taxonomy};
pub use telemetry::{init_tracing, LogFormat};
