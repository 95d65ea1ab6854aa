//! Threshold-based fusion of the text and vision classifier verdicts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifierResult, PageImageRef, TextClassifier, Verdict, VisionClassifier};
use crate::models::{FusionSource, UNKNOWN_CODE};
use crate::taxonomy::Taxonomy;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionThresholds {
    /// Text confidence at or above which the text verdict is accepted alone.
    #[serde(default = "default_text_high")]
    pub text_high_confidence: f64,
    /// Vision confidence at or above which the vision verdict is accepted alone.
    #[serde(default = "default_vision_high")]
    pub vision_high_confidence: f64,
    /// Floor for the weighted fallback.
    #[serde(default = "default_min_accept")]
    pub min_accept_confidence: f64,
}

fn default_text_high() -> f64 {
    0.85
}

fn default_vision_high() -> f64 {
    0.75
}

fn default_min_accept() -> f64 {
    0.60
}

impl Default for FusionThresholds {
    fn default() -> Self {
        Self {
            text_high_confidence: default_text_high(),
            vision_high_confidence: default_vision_high(),
            min_accept_confidence: default_min_accept(),
        }
    }
}

impl FusionThresholds {
    /// Every threshold must lie in `[0, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        let named = [
            ("textHighConfidence", self.text_high_confidence),
            ("visionHighConfidence", self.vision_high_confidence),
            ("minAcceptConfidence", self.min_accept_confidence),
        ];
        for (name, value) in named {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("fusion.{} must be between 0 and 1, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Decides the final code for one page from two already-normalized verdicts.
///
/// Rules apply in strict priority order: agreement of two confident
/// classifiers, confident text, confident vision, then the more confident of
/// the two above the acceptance floor (text wins ties).
pub fn fuse(text: &Verdict, vision: &Verdict, thresholds: &FusionThresholds) -> (String, FusionSource) {
    let text_confident = text.confidence >= thresholds.text_high_confidence;
    let vision_confident = vision.confidence >= thresholds.vision_high_confidence;

    if text.code == vision.code && text_confident && vision_confident {
        (text.code.clone(), FusionSource::TextVision)
    } else if text_confident {
        (text.code.clone(), FusionSource::Text)
    } else if vision_confident {
        (vision.code.clone(), FusionSource::Vision)
    } else if text.confidence.max(vision.confidence) >= thresholds.min_accept_confidence {
        let code = if text.confidence >= vision.confidence {
            &text.code
        } else {
            &vision.code
        };
        (code.clone(), FusionSource::Weighted)
    } else {
        (UNKNOWN_CODE.to_string(), FusionSource::None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusedClassification {
    pub code: String,
    pub document_name: String,
    pub source: FusionSource,
    /// Set when only the vision classifier vouched for the page.
    pub is_external: bool,
    pub text: Verdict,
    pub vision: Verdict,
}

pub struct FusionEngine {
    text: Arc<dyn TextClassifier>,
    vision: Arc<dyn VisionClassifier>,
    thresholds: FusionThresholds,
}

impl FusionEngine {
    pub fn new(
        text: Arc<dyn TextClassifier>,
        vision: Arc<dyn VisionClassifier>,
        thresholds: FusionThresholds,
    ) -> Self {
        Self {
            text,
            vision,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &FusionThresholds {
        &self.thresholds
    }

    /// Classifies one page. Never fails: classifier errors count as UNKNOWN at 0.0.
    pub fn classify(&self, page_text: &str, page: &PageImageRef, taxonomy: &Taxonomy) -> FusedClassification {
        let text = if page_text.trim().is_empty() {
            Verdict::unknown()
        } else {
            settle("text", page.page_number, self.text.classify_text(page_text, taxonomy), taxonomy)
        };
        let vision = settle(
            "vision",
            page.page_number,
            self.vision.classify_vision(page, taxonomy),
            taxonomy,
        );

        let (code, source) = fuse(&text, &vision, &self.thresholds);

        tracing::info!(
            page = page.page_number,
            text_code = %text.code,
            text_confidence = text.confidence,
            vision_code = %vision.code,
            vision_confidence = vision.confidence,
            code = %code,
            source = %source,
            "Page classified"
        );

        FusedClassification {
            document_name: taxonomy.name_for(&code).to_string(),
            is_external: source == FusionSource::Vision,
            code,
            source,
            text,
            vision,
        }
    }
}

/// Collapses a classifier outcome into a verdict inside the taxonomy.
fn settle(kind: &str, page_number: u32, outcome: ClassifierResult, taxonomy: &Taxonomy) -> Verdict {
    match outcome {
        Ok(verdict) => Verdict::new(taxonomy.resolve(&verdict.code), verdict.confidence),
        Err(e) => {
            tracing::warn!(page = page_number, "{} classifier failed: {}", kind, e);
            Verdict::unknown()
        }
    }
}
