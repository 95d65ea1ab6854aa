use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, ExtractedPage, PageExtractor};

/// Scanned images carry no embedded text. They become a single page with empty
/// text, which the pipeline fills in by OCR.
pub struct ImageExtractor;

impl ImageExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PageExtractor for ImageExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>, ProcessError> {
        let _span = tracing::info_span!("processor.image").entered();

        let metadata = std::fs::metadata(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        if metadata.len() == 0 {
            return Err(ProcessError::NoPages(path.to_path_buf()));
        }

        Ok(vec![ExtractedPage {
            page_number: 1,
            text: String::new(),
        }])
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Image)
    }
}
