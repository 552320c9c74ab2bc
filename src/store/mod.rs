//! Knowledge store abstraction.
//!
//! The [`KnowledgeStore`] trait defines every persistence operation the
//! comprehension workflow needs, keyed by document identity, enabling
//! pluggable backends (SQLite for the service, in-memory for tests).
//!
//! Semantics the implementations must uphold:
//! - `upsert_embedding` is idempotent: at most one embedding record exists
//!   per document, and the latest write wins.
//! - `list_chat` returns entries in ascending-timestamp order, ties broken
//!   by insertion order; entries are never reordered or deduplicated.
//! - Missing keys surface as `Error::NotFound`; backend failures surface as
//!   `Error::StoreUnavailable` and are never swallowed.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChatEntry, ChatRole, Document, EmbeddingRecord, Question, UserResponse};

/// Abstract persistence backend for the comprehension workflow.
///
/// All operations are atomic at single-document granularity; there are no
/// cross-document transactions.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Create a document and return its id. `raw_text` is immutable after
    /// this call.
    async fn create_document(
        &self,
        title: &str,
        storage_uri: &str,
        owner_id: Option<&str>,
        text: &str,
    ) -> Result<String>;

    /// Retrieve a document by id.
    async fn get_document(&self, id: &str) -> Result<Document>;

    /// List all documents, most recent first.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// Insert or replace the document-level embedding. Last writer wins.
    async fn upsert_embedding(
        &self,
        document_id: &str,
        vector: &[f32],
        source_text: &str,
    ) -> Result<()>;

    /// Retrieve the stored embedding for a document.
    async fn get_embedding(&self, document_id: &str) -> Result<EmbeddingRecord>;

    /// Persist a batch of generated questions for a document.
    async fn insert_questions(&self, document_id: &str, texts: &[String]) -> Result<Vec<Question>>;

    /// List all questions for a document, oldest first.
    async fn list_questions(&self, document_id: &str) -> Result<Vec<Question>>;

    /// Append one chat history entry.
    async fn append_chat(
        &self,
        document_id: &str,
        role: ChatRole,
        content: &str,
        timestamp: i64,
    ) -> Result<()>;

    /// Read the full chat history for a document, ascending by timestamp.
    async fn list_chat(&self, document_id: &str) -> Result<Vec<ChatEntry>>;

    /// Record a learner response. Fails with `NotFound` if the document
    /// does not exist. Returns the response id.
    async fn record_response(
        &self,
        document_id: &str,
        question_id: Option<&str>,
        user_id: &str,
        text: &str,
    ) -> Result<String>;

    /// Retrieve a recorded response by id.
    async fn get_response(&self, id: &str) -> Result<UserResponse>;

    /// Record an evaluation for a response. Fails with `NotFound` if the
    /// response does not exist. Returns the evaluation id.
    async fn record_evaluation(
        &self,
        response_id: &str,
        score: i64,
        feedback: Option<&str>,
    ) -> Result<String>;
}
