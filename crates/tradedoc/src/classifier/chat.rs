//! Classifier backed by an OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use super::prompts;
use super::{
    load_page_image, parse_reply, ClassifierError, ClassifierResult, PageImageRef,
    TextClassifier, VisionClassifier,
};
use crate::processor::{PageAnnotator, PageOcr};
use crate::taxonomy::Taxonomy;

/// Page text beyond this many characters is not sent to the provider.
pub const MAX_TEXT_CHARS: usize = 12_000;

/// Confidence assumed when a text reply carries only a code.
pub const DEFAULT_TEXT_CONFIDENCE: f64 = 0.85;

/// Confidence assumed when a vision reply carries only a code.
pub const DEFAULT_VISION_CONFIDENCE: f64 = 0.70;

const CLASSIFY_MAX_TOKENS: u32 = 20;
const ANNOTATE_MAX_TOKENS: u32 = 300;
const TRANSCRIBE_MAX_TOKENS: u32 = 4_000;

#[derive(Debug)]
pub struct ChatClassifierConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    pub render_dpi: u32,
}

pub struct ChatClassifier {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    api_key: Option<SecretString>,
    render_dpi: u32,
}

impl ChatClassifier {
    pub fn new(config: ChatClassifierConfig) -> Result<Self, ClassifierError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.model,
            api_key: config.api_key,
            render_dpi: config.render_dpi,
        })
    }

    fn request_body(&self, content: Value, max_tokens: u32) -> Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": max_tokens,
            "temperature": 0.0,
        })
    }

    fn complete(&self, body: &Value) -> Result<String, ClassifierError> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().map_err(|e| {
            tracing::debug!("Chat completion request failed: {}", e);
            ClassifierError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: crate::sanitize::preview(&body, 200),
            });
        }

        let json: Value = response.json()?;
        extract_reply(&json)
    }

    fn image_content(&self, page: &PageImageRef, prompt: String) -> Result<Value, ClassifierError> {
        let (mime, bytes) = load_page_image(page, self.render_dpi)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);

        Ok(json!([
            { "type": "text", "text": prompt },
            {
                "type": "image_url",
                "image_url": { "url": format!("data:{};base64,{}", mime, encoded) }
            }
        ]))
    }
}

impl TextClassifier for ChatClassifier {
    fn classify_text(&self, text: &str, taxonomy: &Taxonomy) -> ClassifierResult {
        let _span = tracing::debug_span!("classifier.text", model = %self.model).entered();

        let prompt =
            prompts::render_text_prompt(taxonomy.descriptions(), truncate_chars(text, MAX_TEXT_CHARS));
        let body = self.request_body(Value::String(prompt), CLASSIFY_MAX_TOKENS);
        let reply = self.complete(&body)?;

        tracing::debug!(reply = %reply, "Text classifier replied");
        parse_reply(&reply, DEFAULT_TEXT_CONFIDENCE)
    }
}

impl VisionClassifier for ChatClassifier {
    fn classify_vision(&self, page: &PageImageRef, taxonomy: &Taxonomy) -> ClassifierResult {
        let _span = tracing::debug_span!(
            "classifier.vision",
            model = %self.model,
            page = page.page_number
        )
        .entered();

        let prompt = prompts::render_vision_prompt(&taxonomy.candidate_codes());
        let content = self.image_content(page, prompt)?;
        let reply = self.complete(&self.request_body(content, CLASSIFY_MAX_TOKENS))?;

        tracing::debug!(reply = %reply, "Vision classifier replied");
        parse_reply(&reply, DEFAULT_VISION_CONFIDENCE)
    }
}

impl PageAnnotator for ChatClassifier {
    fn annotate(&self, page: &PageImageRef) -> Result<String, ClassifierError> {
        let _span = tracing::debug_span!("classifier.annotate", page = page.page_number).entered();

        let content = self.image_content(page, prompts::PAGE_ANNOTATION.to_string())?;
        self.complete(&self.request_body(content, ANNOTATE_MAX_TOKENS))
    }
}

impl PageOcr for ChatClassifier {
    fn transcribe(&self, page: &PageImageRef) -> Result<String, ClassifierError> {
        let _span = tracing::debug_span!("classifier.ocr", page = page.page_number).entered();

        let content = self.image_content(page, prompts::PAGE_TRANSCRIPTION.to_string())?;
        match self.complete(&self.request_body(content, TRANSCRIBE_MAX_TOKENS)) {
            Ok(reply) => Ok(transcription_text(reply)),
            Err(ClassifierError::EmptyReply) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}

fn transcription_text(reply: String) -> String {
    if reply.trim() == prompts::NO_TEXT_MARKER {
        String::new()
    } else {
        reply
    }
}

/// Pulls `choices[0].message.content` out of a chat-completions response.
fn extract_reply(json: &Value) -> Result<String, ClassifierError> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if content.is_empty() {
        return Err(ClassifierError::EmptyReply);
    }
    Ok(content.to_string())
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
