//! One-time summaries of approved final documents.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::models::{DocumentSummary, FinalDocument, FinalStatus, ProductCategory, UNKNOWN_NAME};
use crate::persistence::Persistence;

/// Reference sets of document names per product line. Matching ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSets {
    #[serde(default = "default_trade_finance")]
    pub trade_finance: Vec<String>,
    #[serde(default = "default_insurance")]
    pub insurance: Vec<String>,
    #[serde(default = "default_onboarding")]
    pub onboarding: Vec<String>,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_trade_finance() -> Vec<String> {
    to_strings(&[
        "letter_of_credit",
        "bill_of_lading",
        "bill_of_exchange",
        "invoice",
        "packing_list",
        "certificate_of_origin",
        "air_waybill",
        "sea_way_bill",
    ])
}

fn default_insurance() -> Vec<String> {
    to_strings(&[
        "pol",
        "policy",
        "ins_policy",
        "ins_cert",
        "claim",
        "claim_form",
        "endorsement",
    ])
}

fn default_onboarding() -> Vec<String> {
    to_strings(&["kyc", "application", "consent", "undertaking"])
}

impl Default for ProductSets {
    fn default() -> Self {
        Self {
            trade_finance: default_trade_finance(),
            insurance: default_insurance(),
            onboarding: default_onboarding(),
        }
    }
}

/// First product line whose reference set shares a name with `names`, checked
/// in the order trade finance, insurance, onboarding.
pub fn detect_product<'a, I>(names: I, sets: &ProductSets) -> ProductCategory
where
    I: IntoIterator<Item = &'a str>,
{
    let names: BTreeSet<String> = names.into_iter().map(str::to_lowercase).collect();
    let intersects = |set: &[String]| set.iter().any(|s| names.contains(&s.to_lowercase()));

    if intersects(&sets.trade_finance) {
        ProductCategory::TradeFinance
    } else if intersects(&sets.insurance) {
        ProductCategory::Insurance
    } else if intersects(&sets.onboarding) {
        ProductCategory::Onboarding
    } else {
        ProductCategory::Unknown
    }
}

/// Sorted distinct document names of a final document, without `unknown`.
pub fn document_names(document: &FinalDocument) -> Vec<String> {
    document
        .content
        .keys()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty() && name != UNKNOWN_NAME)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct SummaryCompiler {
    persistence: Arc<dyn Persistence>,
    products: ProductSets,
}

impl SummaryCompiler {
    pub fn new(persistence: Arc<dyn Persistence>, products: ProductSets) -> Self {
        Self {
            persistence,
            products,
        }
    }

    /// Derives the summary of `document` as approved by `approver`. Pure.
    pub fn compile(&self, document: &FinalDocument, approver: &str) -> DocumentSummary {
        let names = document_names(document);
        DocumentSummary {
            case_id: document.case_id.clone(),
            document_id: document.document_id.clone(),
            product: detect_product(names.iter().map(String::as_str), &self.products),
            document_names: names,
            content: document.content.clone(),
            approved_version: document.version,
            approved_by: approver.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Publishes the summary of an approved document if it has none yet.
    ///
    /// Returns `Ok(None)` when a summary already exists or the document is
    /// still a draft. Safe to call any number of times.
    pub fn summarize(&self, document_id: &str) -> Result<Option<DocumentSummary>, WorkflowError> {
        if self.persistence.get_summary(document_id)?.is_some() {
            tracing::debug!(document_id, "Summary already exists");
            return Ok(None);
        }

        let document = self
            .persistence
            .get_final_document(document_id)?
            .ok_or_else(|| WorkflowError::NotFound(document_id.to_string()))?;
        if document.status != FinalStatus::Approved {
            tracing::debug!(document_id, "Document not approved yet, no summary");
            return Ok(None);
        }

        let approver = document.last_editor.as_deref().unwrap_or("SYSTEM");
        let summary = self.compile(&document, approver);
        if self.persistence.insert_summary(&summary)? {
            tracing::info!(document_id, product = %summary.product, "Summary published");
            Ok(Some(summary))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentContent, PageEntry};

    fn detect(names: &[&str]) -> ProductCategory {
        detect_product(names.iter().copied(), &ProductSets::default())
    }

    #[test]
    fn test_detect_product_priority() {
        assert_eq!(detect(&["invoice", "kyc"]), ProductCategory::TradeFinance);
        assert_eq!(detect(&["claim_form", "kyc"]), ProductCategory::Insurance);
        assert_eq!(detect(&["KYC"]), ProductCategory::Onboarding);
        assert_eq!(detect(&["weight_list"]), ProductCategory::Unknown);
        assert_eq!(detect(&[]), ProductCategory::Unknown);
    }

    #[test]
    fn test_detect_product_ignores_case() {
        assert_eq!(detect(&["Bill_Of_Lading"]), ProductCategory::TradeFinance);
        let sets = ProductSets {
            insurance: vec!["INS_POLICY".to_string()],
            ..Default::default()
        };
        assert_eq!(
            detect_product(["ins_policy"], &sets),
            ProductCategory::Insurance
        );
    }

    #[test]
    fn test_product_sets_deserialize_with_defaults() {
        let sets: ProductSets = serde_json::from_str(r#"{ "onboarding": ["aml_form"] }"#).unwrap();
        assert_eq!(sets.onboarding, vec!["aml_form"]);
        assert_eq!(sets.trade_finance, default_trade_finance());
    }

    #[test]
    fn test_document_names_skip_unknown() {
        let mut content = DocumentContent::new();
        let page = PageEntry {
            page_number: 1,
            text: String::new(),
            annotation: "N/A".to_string(),
        };
        for name in ["packing_list", "unknown", "bill_of_lading"] {
            content.insert(name.to_string(), vec![page.clone()]);
        }
        let document = FinalDocument {
            document_id: "D1".to_string(),
            case_id: "C1".to_string(),
            content,
            whole_text: String::new(),
            status: FinalStatus::Approved,
            version: 2,
            last_editor: Some("alice".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(document_names(&document), vec!["bill_of_lading", "packing_list"]);
    }
}
