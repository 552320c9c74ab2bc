//! Comprehension workflow controller.
//!
//! [`Workflow`] wires the collaborators together: extract, store, embed,
//! generate, score, transcribe. Every dependency is injected at
//! construction, so the HTTP server and the CLI share one code path and
//! tests can substitute in-memory backends for all of them.
//!
//! Pipeline shape for ingestion:
//!
//! ```text
//! pdf bytes ─▶ extract ─▶ upload ─▶ create document
//!                                        │
//!                          embed ─▶ upsert embedding
//!                                        │
//!                       generate ─▶ persist questions + chat entry
//! ```
//!
//! The embedding upsert is idempotent, so a failed ingestion can be
//! re-driven for the same document without corrupting state.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::embedding::{embed_document, EmbeddingProvider};
use crate::error::Result;
use crate::extract;
use crate::models::{ChatRole, Question};
use crate::question_gen::{self, GenerationProvider};
use crate::score::understanding_score;
use crate::storage::{upload_key, ObjectStorage};
use crate::store::KnowledgeStore;
use crate::transcribe::Transcriber;

/// Result of ingesting one document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestOutcome {
    pub document_id: String,
    pub storage_uri: String,
    pub questions: Vec<Question>,
}

/// Result of scoring one answer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnswerOutcome {
    pub response_id: String,
    pub evaluation_id: String,
    pub score: i64,
}

/// Result of scoring a spoken answer; carries the transcript so callers
/// can show the learner what was actually scored.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AudioAnswerOutcome {
    pub transcript: String,
    #[serde(flatten)]
    pub answer: AnswerOutcome,
}

/// Orchestrates the document comprehension pipeline.
pub struct Workflow {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    storage: Arc<dyn ObjectStorage>,
    transcriber: Arc<dyn Transcriber>,
    config: Config,
}

impl Workflow {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        storage: Arc<dyn ObjectStorage>,
        transcriber: Arc<dyn Transcriber>,
        config: Config,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            storage,
            transcriber,
            config,
        }
    }

    pub fn store(&self) -> &dyn KnowledgeStore {
        self.store.as_ref()
    }

    /// Ingest an uploaded PDF: extract, upload, persist, embed, and
    /// generate the first question batch.
    pub async fn ingest(
        &self,
        file_name: &str,
        bytes: &[u8],
        content_type: &str,
        owner_id: Option<&str>,
    ) -> Result<IngestOutcome> {
        // Extraction runs first: a file we cannot read should never
        // occupy storage or the document table.
        let text = extract::extract_text(bytes, content_type)?;

        let key = upload_key(&self.config.storage.upload_prefix, file_name);
        let storage_uri = self.storage.put(&key, bytes, content_type).await?;

        let document_id = self
            .store
            .create_document(file_name, &storage_uri, owner_id, &text)
            .await?;
        info!(document_id, storage_uri, "document ingested");

        let vector = embed_document(
            self.embedder.as_ref(),
            &text,
            self.config.chunking.max_chars,
            self.config.embedding.max_concurrency,
        )
        .await?;
        self.store
            .upsert_embedding(&document_id, &vector, &text)
            .await?;

        let document = self.store.get_document(&document_id).await?;
        let questions = question_gen::generate_initial(
            self.store.as_ref(),
            self.generator.as_ref(),
            &self.config.generation,
            &document,
        )
        .await?;

        Ok(IngestOutcome {
            document_id,
            storage_uri,
            questions,
        })
    }

    /// Score a typed answer against the document embedding.
    ///
    /// Appends the answer to chat history, embeds it, scores it against
    /// the stored document vector, and records both the response and its
    /// evaluation.
    pub async fn answer(
        &self,
        document_id: &str,
        question_id: Option<&str>,
        user_id: &str,
        text: &str,
    ) -> Result<AnswerOutcome> {
        // Existence check up front so a bad id fails before any writes.
        let reference = self.store.get_embedding(document_id).await?;

        self.store
            .append_chat(
                document_id,
                ChatRole::User,
                text,
                chrono::Utc::now().timestamp(),
            )
            .await?;

        let candidate = embed_document(
            self.embedder.as_ref(),
            text,
            self.config.chunking.max_chars,
            self.config.embedding.max_concurrency,
        )
        .await?;

        let score = understanding_score(&reference.vector, &candidate)?;

        let response_id = self
            .store
            .record_response(document_id, question_id, user_id, text)
            .await?;
        let evaluation_id = self
            .store
            .record_evaluation(&response_id, score, None)
            .await?;
        info!(document_id, response_id, score, "answer evaluated");

        Ok(AnswerOutcome {
            response_id,
            evaluation_id,
            score,
        })
    }

    /// Transcribe a spoken answer, then score the transcript.
    pub async fn audio_answer(
        &self,
        document_id: &str,
        question_id: Option<&str>,
        user_id: &str,
        audio: &[u8],
        media_type: &str,
    ) -> Result<AudioAnswerOutcome> {
        let transcript = self.transcriber.transcribe(audio, media_type).await?;
        let answer = self
            .answer(document_id, question_id, user_id, &transcript)
            .await?;
        Ok(AudioAnswerOutcome { transcript, answer })
    }

    /// Generate a follow-up question batch for an existing document.
    pub async fn more_questions(&self, document_id: &str) -> Result<Vec<Question>> {
        question_gen::generate_followup(
            self.store.as_ref(),
            self.generator.as_ref(),
            &self.config.generation,
            document_id,
        )
        .await
    }
}
