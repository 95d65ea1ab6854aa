//! Page text acquisition.
//!
//! Text sources are ingested directly as a single page. Everything else goes
//! through a [`PageExtractor`] that yields one entry per page, and each page
//! is then described by a [`PageAnnotator`] (signatures, stamps, seals).
//! Pages whose extracted text is blank are transcribed by a [`PageOcr`].

pub mod image;
pub mod pdf;
pub mod text;

use std::path::Path;

use crate::classifier::{ClassifierError, PageImageRef};
use crate::error::ProcessError;

/// Annotation recorded for pages that were never rendered.
pub const NOT_APPLICABLE: &str = "N/A";

/// Annotation recorded when the annotator failed for a page.
pub const ANNOTATION_FAILED: &str = "Annotation unavailable: page image could not be analyzed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Text,
    Image,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Text),
            "png" | "jpg" | "jpeg" | "tiff" | "tif" | "bmp" | "gif" | "webp" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Text of one page as extracted from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub page_number: u32,
    pub text: String,
}

pub trait PageExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>, ProcessError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

/// Describes visual marks on a page. Failures are never fatal to a run.
pub trait PageAnnotator: Send + Sync {
    fn annotate(&self, page: &PageImageRef) -> Result<String, ClassifierError>;
}

/// Transcribes the visible text of a rendered page.
pub trait PageOcr: Send + Sync {
    fn transcribe(&self, page: &PageImageRef) -> Result<String, ClassifierError>;
}

/// OCR used when no provider is configured. Pages keep their extracted text.
pub struct NoopOcr;

impl PageOcr for NoopOcr {
    fn transcribe(&self, _page: &PageImageRef) -> Result<String, ClassifierError> {
        Ok(String::new())
    }
}

/// Annotator used when no vision provider is configured.
pub struct NoopAnnotator;

impl PageAnnotator for NoopAnnotator {
    fn annotate(&self, _page: &PageImageRef) -> Result<String, ClassifierError> {
        Ok(NOT_APPLICABLE.to_string())
    }
}

pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn PageExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: vec![
                Box::new(text::TextExtractor::new()),
                Box::new(pdf::PdfExtractor::new()),
                Box::new(image::ImageExtractor::new()),
            ],
        }
    }

    pub fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>, ProcessError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))?;

        for extractor in &self.extractors {
            if extractor.supports(format) {
                let pages = extractor.extract(path)?;
                if pages.is_empty() {
                    return Err(ProcessError::NoPages(path.to_path_buf()));
                }
                return Ok(pages);
            }
        }

        Err(ProcessError::UnsupportedFormat(extension.to_string()))
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a source takes the direct text ingestion path.
pub fn is_text_source(path: &Path) -> bool {
    DocumentFormat::from_path(path) == Some(DocumentFormat::Text)
}
