use crate::models::{FinalDocument, JobStatus, PageClassification, PageText};
use crate::worker::job::Job;

pub struct PipelineContext {
    // Input
    pub job: Job,

    // Where the job record stands; the failure path transitions from here
    pub status: JobStatus,

    // Text acquisition result, in page order
    pub pages: Vec<PageText>,
    pub whole_text: String,

    // Classification result, in page order
    pub classifications: Vec<PageClassification>,

    // Version 0 of the final document
    pub final_document: Option<FinalDocument>,

    // Set when the summary step published a summary during this run
    pub summary_published: bool,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            status: JobStatus::Queued,
            pages: Vec::new(),
            whole_text: String::new(),
            classifications: Vec::new(),
            final_document: None,
            summary_published: false,
        }
    }
}
