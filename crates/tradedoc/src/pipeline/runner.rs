use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn};

use crate::classifier::PageImageRef;
use crate::fusion::FusionEngine;
use crate::lifecycle::{assemble_content, FinalDocumentStore};
use crate::models::{
    AuditAction, AuditEntry, DraftRecord, ErrorLogEntry, JobStatus, PageClassification, PageText,
};
use crate::persistence::Persistence;
use crate::error::ProcessError;
use crate::processor::{
    self, ExtractorRegistry, PageAnnotator, PageOcr, ANNOTATION_FAILED, NOT_APPLICABLE,
};
use crate::sanitize;
use crate::summary::SummaryCompiler;
use crate::taxonomy::Taxonomy;
use crate::worker::job::JobResult;

use super::config::{Classifiers, PipelineConfig};
use super::context::PipelineContext;
use super::error::{PipelineError, PipelineStep};

const SYSTEM: &str = "SYSTEM";

pub struct Pipeline {
    persistence: Arc<dyn Persistence>,
    extractors: ExtractorRegistry,
    annotator: Arc<dyn PageAnnotator>,
    ocr: Arc<dyn PageOcr>,
    fusion: FusionEngine,
    taxonomy: Taxonomy,
    documents: FinalDocumentStore,
    summaries: Arc<SummaryCompiler>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, persistence: Arc<dyn Persistence>, classifiers: Classifiers) -> Self {
        let summaries = Arc::new(SummaryCompiler::new(Arc::clone(&persistence), config.products));
        let documents = FinalDocumentStore::new(Arc::clone(&persistence), Arc::clone(&summaries));
        let fusion = FusionEngine::new(classifiers.text, classifiers.vision, config.thresholds);

        Self {
            persistence,
            extractors: ExtractorRegistry::new(),
            annotator: classifiers.annotator,
            ocr: classifiers.ocr,
            fusion,
            taxonomy: config.taxonomy,
            documents,
            summaries,
        }
    }

    /// Run the full pipeline for one job. The first failing step ends the run.
    pub fn run(&self, mut ctx: PipelineContext) -> (JobResult, PipelineContext) {
        let filename = sanitize::redact_path(&ctx.job.source_path);
        let _pipeline_span = info_span!("pipeline",
            job_id = %ctx.job.id,
            document_id = %ctx.job.document_id,
            case_id = %ctx.job.case_id,
            filename = %filename,
        )
        .entered();

        // Step 1: Claim the job
        {
            let _step = info_span!("start").entered();
            if let Err(e) = self.step_start(&mut ctx) {
                return self.fail(ctx, PipelineStep::Start, e);
            }
        }

        // Step 2: Draft linkage
        {
            let _step = info_span!("draft").entered();
            if let Err(e) = self.step_draft(&ctx, &filename) {
                return self.fail(ctx, PipelineStep::Draft, e);
            }
        }

        // Step 3: Page text
        {
            let _step = info_span!("acquire_text").entered();
            if let Err(e) = self.step_acquire_text(&mut ctx) {
                return self.fail(ctx, PipelineStep::TextAcquisition, e);
            }
        }

        // Step 4: Classify pages
        {
            let _step = info_span!("classify").entered();
            if let Err(e) = self.step_classify(&mut ctx) {
                return self.fail(ctx, PipelineStep::Classification, e);
            }
        }

        // Step 5: Final document at version 0
        {
            let _step = info_span!("final_document").entered();
            if let Err(e) = self.step_final_document(&mut ctx) {
                return self.fail(ctx, PipelineStep::FinalDocument, e);
            }
        }

        // Step 6: Summary, only if the document is already approved
        {
            let _step = info_span!("summary").entered();
            if let Err(e) = self.step_summary(&mut ctx) {
                return self.fail(ctx, PipelineStep::Summary, e);
            }
        }

        // Step 7: Complete
        {
            let _step = info_span!("complete").entered();
            if let Err(e) = self.step_complete(&mut ctx) {
                return self.fail(ctx, PipelineStep::Complete, e);
            }
        }

        let version = ctx.final_document.as_ref().map(|d| d.version).unwrap_or(0);
        info!(pages = ctx.pages.len(), "Document processed successfully");
        (JobResult::success(&ctx.job, ctx.pages.len(), version), ctx)
    }

    fn step_start(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        self.transition(ctx, JobStatus::Processing, None)?;
        self.record(ctx, AuditAction::ProcessingStarted, "Document processing started", SYSTEM)
    }

    fn step_draft(&self, ctx: &PipelineContext, filename: &str) -> Result<(), PipelineError> {
        let draft = DraftRecord {
            document_id: ctx.job.document_id.clone(),
            case_id: ctx.job.case_id.clone(),
            document_name: filename.to_string(),
            source_ref: ctx.job.source_path.display().to_string(),
            created_at: Utc::now(),
        };
        if !self.persistence.insert_draft(&draft)? {
            debug!("Draft linkage already present");
        }
        Ok(())
    }

    fn step_acquire_text(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        self.record(ctx, AuditAction::OcrStarted, "OCR started", "OCR")?;

        let source = &ctx.job.source_path;
        let direct = processor::is_text_source(source);
        if direct {
            debug!("Text source, skipping page rendering");
        }

        let extracted = self.extractors.extract(source)?;
        let mut pages = Vec::with_capacity(extracted.len());
        for page in extracted {
            let (text, annotation) = if direct {
                (page.text, NOT_APPLICABLE.to_string())
            } else {
                let text = self.ocr_if_blank(source, page.page_number, page.text)?;
                (text, self.annotate(source, page.page_number))
            };
            pages.push(PageText {
                document_id: ctx.job.document_id.clone(),
                job_id: ctx.job.id.clone(),
                page_number: page.page_number,
                text,
                annotation,
            });
        }

        self.persistence.insert_page_texts(&pages)?;

        let joined = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        ctx.whole_text = if direct { joined } else { joined.trim().to_string() };
        ctx.pages = pages;

        let message = format!("OCR completed ({} pages)", ctx.pages.len());
        self.record(ctx, AuditAction::OcrCompleted, &message, "OCR")
    }

    /// Keeps extracted text when it has any content, otherwise transcribes
    /// the rendered page.
    fn ocr_if_blank(&self, source: &Path, page_number: u32, text: String) -> Result<String, ProcessError> {
        if !text.trim().is_empty() {
            return Ok(text);
        }
        debug!(page = page_number, "No extracted text, running OCR");
        self.ocr
            .transcribe(&PageImageRef::new(source, page_number))
            .map_err(|e| ProcessError::Ocr {
                page: page_number,
                reason: e.to_string(),
            })
    }

    fn annotate(&self, source: &Path, page_number: u32) -> String {
        match self.annotator.annotate(&PageImageRef::new(source, page_number)) {
            Ok(annotation) => annotation,
            Err(e) => {
                warn!(page = page_number, "Page annotation failed: {}", e);
                ANNOTATION_FAILED.to_string()
            }
        }
    }

    fn step_classify(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let rows: Vec<PageClassification> = ctx
            .pages
            .iter()
            .map(|page| {
                let image = PageImageRef::new(&ctx.job.source_path, page.page_number);
                let fused = self.fusion.classify(&page.text, &image, &self.taxonomy);
                PageClassification {
                    document_id: ctx.job.document_id.clone(),
                    job_id: ctx.job.id.clone(),
                    page_number: page.page_number,
                    code: fused.code,
                    document_name: fused.document_name,
                    source_text: page.text.clone(),
                    fusion_source: fused.source,
                    is_external: fused.is_external,
                }
            })
            .collect();

        self.persistence.insert_classifications(&rows)?;
        ctx.classifications = rows;

        self.record(
            ctx,
            AuditAction::ClassificationCompleted,
            "Classification completed",
            "CLASSIFICATION",
        )
    }

    fn step_final_document(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let content = assemble_content(&ctx.pages, &ctx.classifications);
        let document = self.documents.create(
            &ctx.job.document_id,
            &ctx.job.case_id,
            content,
            ctx.whole_text.clone(),
            SYSTEM,
        )?;
        ctx.final_document = Some(document);

        self.record(ctx, AuditAction::FinalJsonCreated, "Final JSON created", SYSTEM)
    }

    fn step_summary(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        ctx.summary_published = self.summaries.summarize(&ctx.job.document_id)?.is_some();
        Ok(())
    }

    /// The completion entry is written while the job is still PROCESSING, so
    /// a failed write fails the job instead of leaving COMPLETED unaudited.
    fn step_complete(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        self.record(
            ctx,
            AuditAction::ProcessingCompleted,
            "Document processed successfully",
            SYSTEM,
        )?;
        self.transition(ctx, JobStatus::Completed, None)
    }

    fn transition(&self, ctx: &mut PipelineContext, to: JobStatus, error: Option<&str>) -> Result<(), PipelineError> {
        let from = ctx.status;
        if !self.persistence.transition_job(&ctx.job.id, from, to, error)? {
            return Err(PipelineError::InvalidJobTransition {
                job_id: ctx.job.id.clone(),
                from,
                to,
            });
        }
        debug!(from = %from, to = %to, "Job status changed");
        ctx.status = to;
        Ok(())
    }

    fn record(&self, ctx: &PipelineContext, action: AuditAction, message: &str, source: &str) -> Result<(), PipelineError> {
        let entry = AuditEntry::new(
            Some(&ctx.job.case_id),
            &ctx.job.document_id,
            action,
            message,
            source,
        );
        self.persistence.append_audit(&entry)?;
        Ok(())
    }

    /// Error log, PROCESSING_FAILED audit entry, then FAILED. Each write is
    /// attempted even if an earlier one fails.
    fn fail(&self, mut ctx: PipelineContext, step: PipelineStep, err: PipelineError) -> (JobResult, PipelineContext) {
        let message = err.to_string();
        error!(step = %step, "Processing failed: {}", message);

        let entry = ErrorLogEntry {
            case_id: ctx.job.case_id.clone(),
            document_id: ctx.job.document_id.clone(),
            step: step.as_str().to_string(),
            error: message.clone(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.persistence.append_error_log(&entry) {
            error!("Failed to write error log: {}", e);
        }

        if let Err(e) = self.record(&ctx, AuditAction::ProcessingFailed, &message, SYSTEM) {
            error!("Failed to record failure: {}", e);
        }

        if ctx.status == JobStatus::Processing {
            if let Err(e) = self.transition(&mut ctx, JobStatus::Failed, Some(&message)) {
                error!("Failed to mark job as failed: {}", e);
            }
        } else {
            warn!(status = %ctx.status, "Job was never claimed, leaving its status unchanged");
        }

        (JobResult::failure(&ctx.job, message), ctx)
    }
}
