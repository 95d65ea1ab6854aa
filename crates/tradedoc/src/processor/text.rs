use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, ExtractedPage, PageExtractor};

/// Pre-extracted text sources become a single page; invalid UTF-8 is replaced.
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, path: &Path) -> Result<String, ProcessError> {
        let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PageExtractor for TextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>, ProcessError> {
        let _span = tracing::info_span!("processor.text").entered();
        let text = self.read(path)?;
        Ok(vec![ExtractedPage {
            page_number: 1,
            text,
        }])
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}
