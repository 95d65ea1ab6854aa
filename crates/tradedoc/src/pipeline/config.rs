use std::sync::Arc;

use crate::classifier::{ChatClassifier, TextClassifier, VisionClassifier};
use crate::config::Config;
use crate::fusion::FusionThresholds;
use crate::processor::{PageAnnotator, PageOcr};
use crate::summary::ProductSets;
use crate::taxonomy::Taxonomy;

pub struct PipelineConfig {
    pub taxonomy: Taxonomy,
    pub thresholds: FusionThresholds,
    pub products: ProductSets,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            taxonomy: Taxonomy::new(&config.document_forms),
            thresholds: config.fusion,
            products: config.products.clone(),
        }
    }
}

/// Providers the pipeline calls per page.
#[derive(Clone)]
pub struct Classifiers {
    pub text: Arc<dyn TextClassifier>,
    pub vision: Arc<dyn VisionClassifier>,
    pub annotator: Arc<dyn PageAnnotator>,
    pub ocr: Arc<dyn PageOcr>,
}

impl Classifiers {
    /// One chat provider serving every role.
    pub fn from_chat(chat: Arc<ChatClassifier>) -> Self {
        Self {
            text: chat.clone(),
            vision: chat.clone(),
            annotator: chat.clone(),
            ocr: chat,
        }
    }
}
