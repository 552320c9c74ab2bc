//! Core data models for the comprehension workflow.
//!
//! These types represent the documents, embeddings, questions, responses,
//! evaluations, and chat history entries that flow through the ingestion
//! and scoring pipeline. Timestamps are Unix seconds; ids are UUID v4
//! strings. `Document.raw_text` is immutable after creation and `id` is
//! the join key for every derived artifact.

use serde::{Deserialize, Serialize};

/// An uploaded document: extracted text plus the object-storage location
/// of the original file.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub storage_uri: String,
    pub owner_id: Option<String>,
    pub raw_text: String,
    pub created_at: i64,
}

/// Document-level embedding. Exactly one record exists per document at any
/// time; writes go through an upsert keyed on `document_id`.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub document_id: String,
    pub vector: Vec<f32>,
    pub source_text: String,
    pub updated_at: i64,
}

/// A generated comprehension question. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub reference_answer: Option<String>,
}

/// A learner's submitted answer, typed or transcribed. `question_id` is
/// absent for free-form answers. Append-only.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub document_id: String,
    pub question_id: Option<String>,
    pub user_id: String,
    pub text: String,
    pub created_at: i64,
}

/// Similarity-based score for one response. Append-only; `score` is an
/// integer in `[0, 100]`.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub id: String,
    pub response_id: String,
    pub score: i64,
    pub feedback: Option<String>,
    pub created_at: i64,
}

/// Who produced a chat history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Generated question batches.
    System,
    /// Learner submissions.
    User,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
        }
    }

    /// Human-readable label used when replaying history into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::System => "System",
            ChatRole::User => "User",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(ChatRole::System),
            "user" => Some(ChatRole::User),
            _ => None,
        }
    }
}

/// One entry of a document's conversational log. Entries are read back in
/// ascending-timestamp order and replayed as context for follow-up
/// question generation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatEntry {
    pub document_id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_role_round_trip() {
        for role in [ChatRole::System, ChatRole::User] {
            assert_eq!(ChatRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(ChatRole::parse("assistant"), None);
    }
}
