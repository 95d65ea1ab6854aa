//! Per-document processing: claim the job, acquire page text, classify each
//! page, write version 0 of the final document, complete the job.

pub mod config;
pub mod context;
pub mod error;
pub mod runner;

pub use config::{Classifiers, PipelineConfig};
pub use context::PipelineContext;
pub use error::{PipelineError, PipelineStep};
pub use runner::Pipeline;
