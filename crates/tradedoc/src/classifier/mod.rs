//! Classifier port: text- and vision-based page classifiers.
//!
//! Implementations report failures as [`ClassifierError`]; only the fusion
//! engine collapses them to an UNKNOWN verdict.

pub mod chat;
pub mod prompts;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::UNKNOWN_CODE;
use crate::processor::{pdf, DocumentFormat};
use crate::taxonomy::Taxonomy;

pub use chat::{ChatClassifier, ChatClassifierConfig};

/// A classifier's answer for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub code: String,
    pub confidence: f64,
}

impl Verdict {
    /// Confidence is clamped to `[0, 1]`; NaN becomes 0.
    pub fn new(code: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            code: code.into(),
            confidence,
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_CODE, 0.0)
    }
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider returned an empty reply")]
    EmptyReply,

    #[error("Failed to parse classifier reply '{0}'")]
    Parse(String),

    #[error("Page image unavailable: {0}")]
    ImageUnavailable(String),
}

pub type ClassifierResult = Result<Verdict, ClassifierError>;

/// Points at one page of a source document for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImageRef {
    pub source: PathBuf,
    pub page_number: u32,
}

impl PageImageRef {
    pub fn new(source: impl Into<PathBuf>, page_number: u32) -> Self {
        Self {
            source: source.into(),
            page_number,
        }
    }
}

pub trait TextClassifier: Send + Sync {
    fn classify_text(&self, text: &str, taxonomy: &Taxonomy) -> ClassifierResult;
}

pub trait VisionClassifier: Send + Sync {
    fn classify_vision(&self, page: &PageImageRef, taxonomy: &Taxonomy) -> ClassifierResult;
}

/// Parses a `CODE|CONFIDENCE` reply.
///
/// A reply without a numeric confidence part gets `default_confidence`.
/// Code validity is not checked here.
pub fn parse_reply(raw: &str, default_confidence: f64) -> ClassifierResult {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or(ClassifierError::EmptyReply)?;

    let mut parts = line.splitn(2, '|');
    let code = parts
        .next()
        .map(|c| c.trim().trim_matches(|ch| ch == '`' || ch == '"' || ch == '\''))
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ClassifierError::Parse(line.to_string()))?;

    let confidence = parts
        .next()
        .and_then(|c| c.trim().parse::<f64>().ok())
        .unwrap_or(default_confidence);

    Ok(Verdict::new(code.to_uppercase(), confidence))
}

/// Loads the bytes of a page image together with their MIME type.
///
/// PDF pages are rendered at `dpi`; image files are read as-is and only have
/// page 1. Text sources have no image.
pub fn load_page_image(
    page: &PageImageRef,
    dpi: u32,
) -> Result<(String, Vec<u8>), ClassifierError> {
    match DocumentFormat::from_path(&page.source) {
        Some(DocumentFormat::Pdf) => pdf::render_page_png(&page.source, page.page_number, dpi)
            .map(|bytes| ("image/png".to_string(), bytes))
            .map_err(|e| ClassifierError::ImageUnavailable(e.to_string())),
        Some(DocumentFormat::Image) => {
            if page.page_number != 1 {
                return Err(ClassifierError::ImageUnavailable(format!(
                    "image sources have a single page, got page {}",
                    page.page_number
                )));
            }
            let bytes = std::fs::read(&page.source)
                .map_err(|e| ClassifierError::ImageUnavailable(e.to_string()))?;
            Ok((image_mime(&page.source), bytes))
        }
        _ => Err(ClassifierError::ImageUnavailable(format!(
            "no page image for {}",
            crate::sanitize::redact_path(&page.source)
        ))),
    }
}

fn image_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
