use std::path::Path;
use std::process::Command;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, ExtractedPage, PageExtractor};

/// Extracts embedded text page by page.
///
/// Pages whose embedded text is unusable (empty, font-encoding garbage) are
/// kept with empty text so the pipeline transcribes them by OCR.
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PageExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>, ProcessError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        let mut pages = Vec::new();
        for (page_number, _) in doc.get_pages() {
            let text = match doc.extract_text(&[page_number]) {
                Ok(text) if !is_unusable_text(&text) => text.trim().to_string(),
                Ok(_) => {
                    tracing::debug!("Page {} has no usable embedded text", page_number);
                    String::new()
                }
                Err(e) => {
                    tracing::warn!("Text extraction failed for page {}: {}", page_number, e);
                    String::new()
                }
            };
            pages.push(ExtractedPage { page_number, text });
        }

        Ok(pages)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

/// Pattern for Identity-H Unimplemented errors (common with CID fonts).
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Text shorter than this is accepted regardless of character composition.
const MIN_TOTAL_CHARS: usize = 50;

/// Minimum share of alphanumeric characters for longer text to be accepted.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

fn is_unusable_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}

/// Renders one PDF page to PNG bytes with `pdftoppm` (poppler-utils).
pub fn render_page_png(path: &Path, page_number: u32, dpi: u32) -> Result<Vec<u8>, ProcessError> {
    let render_err = |reason: String| ProcessError::Render {
        page: page_number,
        reason,
    };

    let source = path
        .to_str()
        .ok_or_else(|| render_err(format!("non UTF-8 path: {}", path.display())))?;
    let output_prefix = std::env::temp_dir().join(format!("tradedoc_page_{}", uuid::Uuid::new_v4()));
    let prefix = output_prefix
        .to_str()
        .ok_or_else(|| render_err("non UTF-8 temp directory".to_string()))?;

    let output = Command::new("pdftoppm")
        .args([
            "-png",
            "-r",
            &dpi.to_string(),
            "-f",
            &page_number.to_string(),
            "-l",
            &page_number.to_string(),
            source,
            prefix,
        ])
        .output()
        .map_err(|e| {
            render_err(format!(
                "failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(render_err(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    // pdftoppm pads the page suffix depending on the document's page count.
    let candidates = [
        format!("{}-{}.png", prefix, page_number),
        format!("{}-{:02}.png", prefix, page_number),
        format!("{}-{:03}.png", prefix, page_number),
    ];
    let image_path = candidates
        .iter()
        .find(|p| Path::new(p).exists())
        .ok_or_else(|| render_err("rendered page image not found".to_string()))?;

    let image_data = std::fs::read(image_path)
        .map_err(|e| render_err(format!("failed to read rendered image: {}", e)))?;
    let _ = std::fs::remove_file(image_path);

    Ok(image_data)
}


#[cfg(test)]
mod tests {
    use super::testing::build_pdf;
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_supports_pdf_format() {
        let extractor = PdfExtractor::new();
        assert!(extractor.supports(DocumentFormat::Pdf));
        assert!(!extractor.supports(DocumentFormat::Image));
        assert!(!extractor.supports(DocumentFormat::Text));
    }

    #[test]
    fn test_extract_one_entry_per_page() {
        let temp_file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(
            temp_file.path(),
            build_pdf(&["Commercial Invoice", "Packing List", "Bill of Lading"]),
        )
        .unwrap();

        let pages = PdfExtractor::new().extract(temp_file.path()).unwrap();
        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_corrupted_pdf_error() {
        let temp_file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(temp_file.path(), b"not a valid pdf content").unwrap();

        match PdfExtractor::new().extract(temp_file.path()) {
            Err(ProcessError::PdfProcessing(msg)) => {
                assert!(msg.contains("Failed to load PDF"), "got: {}", msg)
            }
            other => panic!("Expected PdfProcessing error, got {:?}", other),
        }
    }

    #[test]
    fn test_pdf_file_not_found_error() {
        match PdfExtractor::new().extract(Path::new("/nonexistent/file.pdf")) {
            Err(ProcessError::ReadDocument { path, .. }) => {
                assert_eq!(path, Path::new("/nonexistent/file.pdf"));
            }
            other => panic!("Expected ReadDocument error, got {:?}", other),
        }
    }

    #[test]
    fn test_unusable_text_detection() {
        assert!(is_unusable_text(""));
        assert!(is_unusable_text("  \n\t "));
        assert!(is_unusable_text(
            "?Identity-H Unimplemented?\n?Identity-H Unimplemented?"
        ));
        assert!(is_unusable_text(&"!".repeat(MIN_TOTAL_CHARS + 1)));

        assert!(!is_unusable_text("Invoice #123 ?Identity-H Unimplemented? Total: $500"));
        assert!(!is_unusable_text("!@#$%"));
        assert!(!is_unusable_text(&"!".repeat(MIN_TOTAL_CHARS)));
    }

    #[test]
    fn test_render_missing_file_fails() {
        let result = render_page_png(Path::new("/nonexistent/file.pdf"), 1, 72);
        assert!(matches!(result, Err(ProcessError::Render { page: 1, .. })));
    }
}
