use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::classifier::ChatClassifierConfig;
use crate::fusion::FusionThresholds;
use crate::secrets::{self, SecretError};
use crate::summary::ProductSets;
use crate::taxonomy::DocumentForm;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    /// Defaults to `~/.tradedoc/data/tradedoc.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Pending jobs accepted before `submit` blocks. Defaults to twice the worker count.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    #[serde(default)]
    pub fusion: FusionThresholds,
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub document_forms: Vec<DocumentForm>,
    #[serde(default)]
    pub products: ProductSets,
    #[serde(default = "default_dpi")]
    pub pdf_render_dpi: u32,
    /// Jobs left QUEUED or PROCESSING for longer than this are recovered at
    /// startup. Raise it when several processes share one database.
    #[serde(default)]
    pub interrupted_job_grace_secs: u64,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_dpi() -> u32 {
    200
}

impl Config {
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or(self.worker_count * 2)
            .max(1)
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        match self.database_path.as_deref() {
            Some(path) if !path.is_empty() => Some(PathBuf::from(secrets::expand_home(path))),
            _ => crate::db::default_database_path(),
        }
    }
}

/// OpenAI-compatible chat-completions provider used for both classifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// File holding the API key. Takes precedence over `apiKeyEnv`.
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    60
}

impl ClassifierConfig {
    pub fn api_key(&self) -> Result<Option<SecretString>, SecretError> {
        secrets::resolve_secret(self.api_key_file.as_deref(), self.api_key_env.as_deref())
    }

    pub fn to_chat_config(&self, render_dpi: u32) -> Result<ChatClassifierConfig, SecretError> {
        Ok(ChatClassifierConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: self.api_key()?,
            timeout_secs: self.timeout_secs,
            render_dpi,
        })
    }
}
