//! Comprehension question generation.
//!
//! Drives text → question-list generation against a generative model and
//! records every batch in the document's chat history so follow-up rounds
//! can build on what was already asked.
//!
//! Two entry points:
//! - [`generate_initial`] prompts with a bounded prefix of the document
//!   text (truncation, not summarization, to bound prompt cost).
//! - [`generate_followup`] replays the full chat history (ascending,
//!   role-labeled) ahead of a shorter document prefix, making each round
//!   context-sensitive. Prompt size grows with history; capping history
//!   length is an operational concern for callers, not solved here.
//!
//! The model's reply is parsed by [`parse_questions`]: one question per
//! line, blank lines discarded. Downstream storage depends on this exact
//! contract, so it lives in one well-tested function.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::models::{ChatRole, Document, Question};
use crate::store::KnowledgeStore;

/// Trait for question-generation backends: prompt in, raw model text out.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-pro"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Split raw model output into discrete question strings.
///
/// One question per line; lines are trimmed and empty lines discarded.
pub fn parse_questions(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// First `max_chars` characters of `s`, on a char boundary.
fn char_prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Build the initial-generation prompt from a bounded document prefix.
pub fn build_initial_prompt(config: &GenerationConfig, text: &str) -> String {
    format!(
        "Based on the following text, generate {} questions to test the reader's understanding:\n\n{}",
        config.num_questions,
        char_prefix(text, config.initial_context_chars)
    )
}

/// Build the follow-up prompt: role-labeled history, then a document prefix.
pub fn build_followup_prompt(
    config: &GenerationConfig,
    history: &[crate::models::ChatEntry],
    text: &str,
) -> String {
    let mut prompt = format!(
        "Based on the following chat history and document content, generate {} new questions to further test the reader's understanding:\n\n",
        config.num_questions
    );
    for entry in history {
        prompt.push_str(entry.role.label());
        prompt.push_str(": ");
        prompt.push_str(&entry.content);
        prompt.push('\n');
    }
    prompt.push_str("\nDocument content: ");
    prompt.push_str(char_prefix(text, config.followup_context_chars));
    prompt
}

/// Generate the first question batch for a freshly ingested document.
///
/// Parsed questions are persisted to the question collection, appended to
/// chat history as one `system` entry, and returned.
pub async fn generate_initial(
    store: &dyn KnowledgeStore,
    provider: &dyn GenerationProvider,
    config: &GenerationConfig,
    document: &Document,
) -> Result<Vec<Question>> {
    let prompt = build_initial_prompt(config, &document.raw_text);
    let raw = provider.generate(&prompt).await?;
    persist_batch(store, &document.id, &raw).await
}

/// Generate a follow-up batch using accumulated chat history as context.
pub async fn generate_followup(
    store: &dyn KnowledgeStore,
    provider: &dyn GenerationProvider,
    config: &GenerationConfig,
    document_id: &str,
) -> Result<Vec<Question>> {
    let document = store.get_document(document_id).await?;
    let history = store.list_chat(document_id).await?;

    let prompt = build_followup_prompt(config, &history, &document.raw_text);
    let raw = provider.generate(&prompt).await?;
    persist_batch(store, document_id, &raw).await
}

/// Parse a model reply, persist the questions, and log the batch to chat
/// history as a single `system` entry.
async fn persist_batch(
    store: &dyn KnowledgeStore,
    document_id: &str,
    raw: &str,
) -> Result<Vec<Question>> {
    let texts = parse_questions(raw);
    if texts.is_empty() {
        return Err(Error::GenerationFailed(
            "model returned no questions".to_string(),
        ));
    }
    debug!(document_id, count = texts.len(), "generated question batch");

    let questions = store.insert_questions(document_id, &texts).await?;
    store
        .append_chat(
            document_id,
            ChatRole::System,
            &texts.join("\n"),
            chrono::Utc::now().timestamp(),
        )
        .await?;

    Ok(questions)
}

// ============ Disabled Provider ============

/// A no-op generation provider that always returns errors.
pub struct DisabledGenerator;

#[async_trait]
impl GenerationProvider for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::GenerationFailed(
            "generation provider is disabled".to_string(),
        ))
    }
}

// ============ Gemini Provider ============

/// Question generation via the Google Gemini API.
///
/// Calls `POST /v1beta/models/{model}:generateContent`. Requires the
/// `GEMINI_API_KEY` environment variable to be set. Transient failures
/// (429, 5xx, network) retry with exponential backoff; other client
/// errors fail immediately.
pub struct GeminiProvider {
    model: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

impl GeminiProvider {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            Error::GenerationFailed("generation.model required for Gemini provider".to_string())
        })?;

        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            Error::GenerationFailed("GEMINI_API_KEY environment variable not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::GenerationFailed(e.to_string()))?;

        Ok(Self {
            model,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );

        let body = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });

        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(&url).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::GenerationFailed(e.to_string()))?;
                        return parse_gemini_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::GenerationFailed(format!(
                            "Gemini API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::GenerationFailed(format!(
                        "Gemini API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::GenerationFailed(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::GenerationFailed("generation failed after retries".to_string())
        }))
    }
}

/// Extract the first candidate's text from a `generateContent` response.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::GenerationFailed("invalid Gemini response: missing candidate text".to_string())
        })
}

/// Create the appropriate [`GenerationProvider`] based on configuration.
pub fn create_provider(config: &GenerationConfig) -> Result<Box<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "gemini" => Ok(Box::new(GeminiProvider::new(config)?)),
        other => Err(Error::GenerationFailed(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatEntry;

    #[test]
    fn parse_discards_blank_lines() {
        let raw = "What is X?\n\n  What is Y?  \n\nWhat is Z?\n";
        assert_eq!(
            parse_questions(raw),
            vec!["What is X?", "What is Y?", "What is Z?"]
        );
    }

    #[test]
    fn parse_empty_output_yields_nothing() {
        assert!(parse_questions("").is_empty());
        assert!(parse_questions("\n\n   \n").is_empty());
    }

    #[test]
    fn initial_prompt_truncates_long_documents() {
        let config = GenerationConfig {
            initial_context_chars: 10,
            ..Default::default()
        };
        let prompt = build_initial_prompt(&config, &"x".repeat(100));
        assert!(prompt.ends_with(&"x".repeat(10)));
        assert!(!prompt.contains(&"x".repeat(11)));
    }

    #[test]
    fn char_prefix_respects_multibyte_boundaries() {
        assert_eq!(char_prefix("héllo", 2), "hé");
        assert_eq!(char_prefix("ab", 10), "ab");
    }

    #[test]
    fn followup_prompt_labels_history_roles() {
        let config = GenerationConfig::default();
        let history = vec![
            ChatEntry {
                document_id: "d1".to_string(),
                role: ChatRole::System,
                content: "Q1?".to_string(),
                timestamp: 1,
            },
            ChatEntry {
                document_id: "d1".to_string(),
                role: ChatRole::User,
                content: "A1".to_string(),
                timestamp: 2,
            },
        ];
        let prompt = build_followup_prompt(&config, &history, "Doc body");
        assert!(prompt.contains("System: Q1?\n"));
        assert!(prompt.contains("User: A1\n"));
        assert!(prompt.contains("Document content: Doc body"));
        // History precedes the document content.
        assert!(prompt.find("System: Q1?").unwrap() < prompt.find("Document content:").unwrap());
    }

    #[test]
    fn gemini_response_parsing() {
        let json = serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "Q1?\nQ2?"}]}}
            ]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "Q1?\nQ2?");
        assert!(parse_gemini_response(&serde_json::json!({})).is_err());
    }
}
