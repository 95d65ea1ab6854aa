//! The authoritative set of document codes pages may be classified into.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::models::{UNKNOWN_CODE, UNKNOWN_NAME};

/// One entry of the document-form master list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentForm {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub receiver: Option<String>,
}

impl DocumentForm {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            sender: None,
            receiver: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Taxonomy {
    /// Normalized code → normalized document name.
    names: BTreeMap<String, String>,
    descriptions: String,
}

impl Taxonomy {
    pub fn new(forms: &[DocumentForm]) -> Self {
        let mut names = BTreeMap::new();
        let mut descriptions = String::new();

        for form in forms {
            let code = normalize_code(&form.code);
            if code.is_empty() {
                continue;
            }

            let _ = write!(descriptions, "{}: {}", code, form.name.trim());
            if let (Some(sender), Some(receiver)) = (&form.sender, &form.receiver) {
                let _ = write!(descriptions, " ({} → {})", sender, receiver);
            }
            descriptions.push('\n');

            names.insert(code, normalize_name(&form.name));
        }

        Self {
            names,
            descriptions: descriptions.trim_end().to_string(),
        }
    }

    /// Whether `code` is a taxonomy code or the UNKNOWN sentinel.
    pub fn is_valid(&self, code: &str) -> bool {
        code == UNKNOWN_CODE || self.names.contains_key(code)
    }

    /// Normalizes a raw classifier code, mapping anything outside the set to UNKNOWN.
    pub fn resolve(&self, raw: &str) -> String {
        let code = normalize_code(raw);
        if self.is_valid(&code) {
            code
        } else {
            UNKNOWN_CODE.to_string()
        }
    }

    pub fn name_for(&self, code: &str) -> &str {
        self.names
            .get(code)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_NAME)
    }

    /// All valid codes including UNKNOWN, sorted.
    pub fn candidate_codes(&self) -> Vec<String> {
        let mut codes: BTreeSet<String> = self.names.keys().cloned().collect();
        codes.insert(UNKNOWN_CODE.to_string());
        codes.into_iter().collect()
    }

    /// One `CODE: Name (sender → receiver)` line per form, for prompts.
    pub fn descriptions(&self) -> &str {
        &self.descriptions
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// `"Bill of Lading"` → `"bill_of_lading"`.
pub fn normalize_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
