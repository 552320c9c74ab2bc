//! End-to-end workflow tests against the in-memory store and scripted
//! providers. No network, no disk.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use recall_harness::config::{
    ChunkingConfig, Config, DbConfig, EmbeddingConfig, GenerationConfig, ServerConfig,
    StorageConfig, TranscriptionConfig,
};
use recall_harness::embedding::EmbeddingProvider;
use recall_harness::error::{Error, Result};
use recall_harness::extract::MIME_PDF;
use recall_harness::models::ChatRole;
use recall_harness::question_gen::GenerationProvider;
use recall_harness::storage::MemoryStorage;
use recall_harness::store::memory::MemoryStore;
use recall_harness::store::KnowledgeStore;
use recall_harness::transcribe::Transcriber;
use recall_harness::workflow::Workflow;

/// Deterministic embedder: known phrases map to fixed vectors, anything
/// else gets a constant fallback.
struct ScriptedEmbedder;

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(match text {
            "a faithful summary" => vec![1.0, 0.0],
            "something unrelated" => vec![0.0, 1.0],
            _ => vec![0.6, 0.8],
        })
    }
}

/// Generator that returns a fixed batch and records every prompt it sees.
struct ScriptedGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

struct ScriptedTranscriber {
    transcript: String,
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _audio: &[u8], _media_type: &str) -> Result<String> {
        Ok(self.transcript.clone())
    }
}

fn test_config() -> Config {
    Config {
        db: DbConfig {
            path: PathBuf::from(":memory:"),
        },
        chunking: ChunkingConfig::default(),
        embedding: EmbeddingConfig::default(),
        generation: GenerationConfig::default(),
        storage: StorageConfig::default(),
        transcription: TranscriptionConfig::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    }
}

struct Harness {
    workflow: Workflow,
    store: Arc<MemoryStore>,
    generator: Arc<ScriptedGenerator>,
}

fn harness_with(generator_reply: &str, transcript: &str) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new(generator_reply));

    let workflow = Workflow::new(
        store.clone(),
        Arc::new(ScriptedEmbedder),
        generator.clone(),
        Arc::new(MemoryStorage::new()),
        Arc::new(ScriptedTranscriber {
            transcript: transcript.to_string(),
        }),
        test_config(),
    );

    Harness {
        workflow,
        store,
        generator,
    }
}

/// Seed a document with a stored reference embedding, bypassing PDF
/// extraction.
async fn seed_document(store: &MemoryStore) -> String {
    let id = store
        .create_document("notes.pdf", "mem://uploads/notes.pdf", Some("alice"), "Doc body text.")
        .await
        .unwrap();
    store.upsert_embedding(&id, &[1.0, 0.0], "Doc body text.").await.unwrap();
    id
}

#[tokio::test]
async fn answer_scores_matching_text_at_100() {
    let h = harness_with("Q1?", "");
    let doc_id = seed_document(&h.store).await;

    let outcome = h
        .workflow
        .answer(&doc_id, None, "alice", "a faithful summary")
        .await
        .unwrap();

    assert_eq!(outcome.score, 100);

    let response = h.store.get_response(&outcome.response_id).await.unwrap();
    assert_eq!(response.document_id, doc_id);
    assert_eq!(response.user_id, "alice");
    assert_eq!(response.text, "a faithful summary");

    let evaluations = h.store.evaluations();
    assert_eq!(evaluations.len(), 1);
    assert_eq!(evaluations[0].id, outcome.evaluation_id);
    assert_eq!(evaluations[0].score, 100);

    // The answer lands in chat history as a user entry.
    let chat = h.store.list_chat(&doc_id).await.unwrap();
    assert_eq!(chat.len(), 1);
    assert_eq!(chat[0].role, ChatRole::User);
    assert_eq!(chat[0].content, "a faithful summary");
}

#[tokio::test]
async fn answer_scores_orthogonal_text_at_0() {
    let h = harness_with("Q1?", "");
    let doc_id = seed_document(&h.store).await;

    let outcome = h
        .workflow
        .answer(&doc_id, None, "alice", "something unrelated")
        .await
        .unwrap();

    assert_eq!(outcome.score, 0);
}

#[tokio::test]
async fn answer_records_question_link() {
    let h = harness_with("Q1?", "");
    let doc_id = seed_document(&h.store).await;
    let questions = h
        .store
        .insert_questions(&doc_id, &["What is the doc about?".to_string()])
        .await
        .unwrap();

    let outcome = h
        .workflow
        .answer(&doc_id, Some(&questions[0].id), "alice", "a faithful summary")
        .await
        .unwrap();

    let response = h.store.get_response(&outcome.response_id).await.unwrap();
    assert_eq!(response.question_id.as_deref(), Some(questions[0].id.as_str()));
}

#[tokio::test]
async fn answer_to_unknown_document_fails_before_writing() {
    let h = harness_with("Q1?", "");

    let err = h
        .workflow
        .answer("no-such-doc", None, "alice", "anything")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // Nothing was appended to chat history.
    let chat = h.store.list_chat("no-such-doc").await.unwrap();
    assert!(chat.is_empty());
}

#[tokio::test]
async fn audio_answer_scores_the_transcript() {
    let h = harness_with("Q1?", "a faithful summary");
    let doc_id = seed_document(&h.store).await;

    let outcome = h
        .workflow
        .audio_answer(&doc_id, None, "bob", b"fake-wav-bytes", "audio/wav")
        .await
        .unwrap();

    assert_eq!(outcome.transcript, "a faithful summary");
    assert_eq!(outcome.answer.score, 100);

    let response = h
        .store
        .get_response(&outcome.answer.response_id)
        .await
        .unwrap();
    assert_eq!(response.text, "a faithful summary");
}

#[tokio::test]
async fn more_questions_replays_history_and_persists_batch() {
    let h = harness_with("New Q1?\nNew Q2?", "");
    let doc_id = seed_document(&h.store).await;

    h.store
        .append_chat(&doc_id, ChatRole::System, "Old Q1?", 10)
        .await
        .unwrap();
    h.store
        .append_chat(&doc_id, ChatRole::User, "my earlier answer", 20)
        .await
        .unwrap();

    let questions = h.workflow.more_questions(&doc_id).await.unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0].text, "New Q1?");
    assert_eq!(questions[1].text, "New Q2?");

    // The prompt replays history in order, role-labeled, before the
    // document text.
    let prompts = h.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("System: Old Q1?"));
    assert!(prompts[0].contains("User: my earlier answer"));
    assert!(prompts[0].contains("Document content: Doc body text."));

    // Prior entries are retained and the batch lands as one system entry.
    let chat = h.store.list_chat(&doc_id).await.unwrap();
    assert_eq!(chat.len(), 3);
    assert_eq!(chat[2].role, ChatRole::System);
    assert_eq!(chat[2].content, "New Q1?\nNew Q2?");

    let stored = h.store.list_questions(&doc_id).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn more_questions_for_unknown_document_is_not_found() {
    let h = harness_with("Q?", "");
    let err = h.workflow.more_questions("no-such-doc").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn empty_generator_output_is_generation_failed() {
    let h = harness_with("\n  \n", "");
    let doc_id = seed_document(&h.store).await;

    let err = h.workflow.more_questions(&doc_id).await.unwrap_err();
    assert!(matches!(err, Error::GenerationFailed(_)));

    // Nothing was persisted for the failed batch.
    assert!(h.store.list_questions(&doc_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn ingest_rejects_unreadable_pdf_before_any_writes() {
    let h = harness_with("Q1?", "");

    let err = h
        .workflow
        .ingest("junk.pdf", b"not a pdf", MIME_PDF, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExtractionFailed(_)));

    assert!(h.store.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn ingest_rejects_non_pdf_content_type() {
    let h = harness_with("Q1?", "");

    let err = h
        .workflow
        .ingest("notes.txt", b"plain text", "text/plain", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExtractionFailed(_)));
}
