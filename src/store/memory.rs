//! In-memory [`KnowledgeStore`] implementation for testing.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Chat ordering relies on a stable sort by timestamp over insertion order,
//! matching the SQLite backend's `(timestamp, rowid)` ordering.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{ChatEntry, ChatRole, Document, EmbeddingRecord, Evaluation, Question, UserResponse};

use super::KnowledgeStore;

#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Document>>,
    embeddings: RwLock<HashMap<String, EmbeddingRecord>>,
    questions: RwLock<Vec<Question>>,
    chat: RwLock<Vec<ChatEntry>>,
    responses: RwLock<HashMap<String, UserResponse>>,
    evaluations: RwLock<Vec<Evaluation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: all evaluations recorded so far, in insertion order.
    pub fn evaluations(&self) -> Vec<Evaluation> {
        self.evaluations.read().unwrap().clone()
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn create_document(
        &self,
        title: &str,
        storage_uri: &str,
        owner_id: Option<&str>,
        text: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let doc = Document {
            id: id.clone(),
            title: title.to_string(),
            storage_uri: storage_uri.to_string(),
            owner_id: owner_id.map(str::to_string),
            raw_text: text.to_string(),
            created_at: now_ts(),
        };
        self.documents.write().unwrap().insert(id.clone(), doc);
        Ok(id)
    }

    async fn get_document(&self, id: &str) -> Result<Document> {
        self.documents
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self.documents.read().unwrap().values().cloned().collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(docs)
    }

    async fn upsert_embedding(
        &self,
        document_id: &str,
        vector: &[f32],
        source_text: &str,
    ) -> Result<()> {
        let record = EmbeddingRecord {
            document_id: document_id.to_string(),
            vector: vector.to_vec(),
            source_text: source_text.to_string(),
            updated_at: now_ts(),
        };
        self.embeddings
            .write()
            .unwrap()
            .insert(document_id.to_string(), record);
        Ok(())
    }

    async fn get_embedding(&self, document_id: &str) -> Result<EmbeddingRecord> {
        self.embeddings
            .read()
            .unwrap()
            .get(document_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("embedding for document {}", document_id)))
    }

    async fn insert_questions(&self, document_id: &str, texts: &[String]) -> Result<Vec<Question>> {
        let new: Vec<Question> = texts
            .iter()
            .map(|text| Question {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                text: text.clone(),
                reference_answer: None,
            })
            .collect();
        self.questions.write().unwrap().extend(new.iter().cloned());
        Ok(new)
    }

    async fn list_questions(&self, document_id: &str) -> Result<Vec<Question>> {
        Ok(self
            .questions
            .read()
            .unwrap()
            .iter()
            .filter(|q| q.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn append_chat(
        &self,
        document_id: &str,
        role: ChatRole,
        content: &str,
        timestamp: i64,
    ) -> Result<()> {
        self.chat.write().unwrap().push(ChatEntry {
            document_id: document_id.to_string(),
            role,
            content: content.to_string(),
            timestamp,
        });
        Ok(())
    }

    async fn list_chat(&self, document_id: &str) -> Result<Vec<ChatEntry>> {
        let mut entries: Vec<ChatEntry> = self
            .chat
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn record_response(
        &self,
        document_id: &str,
        question_id: Option<&str>,
        user_id: &str,
        text: &str,
    ) -> Result<String> {
        if !self.documents.read().unwrap().contains_key(document_id) {
            return Err(Error::NotFound(format!("document {}", document_id)));
        }

        let id = Uuid::new_v4().to_string();
        let response = UserResponse {
            id: id.clone(),
            document_id: document_id.to_string(),
            question_id: question_id.map(str::to_string),
            user_id: user_id.to_string(),
            text: text.to_string(),
            created_at: now_ts(),
        };
        self.responses.write().unwrap().insert(id.clone(), response);
        Ok(id)
    }

    async fn get_response(&self, id: &str) -> Result<UserResponse> {
        self.responses
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("response {}", id)))
    }

    async fn record_evaluation(
        &self,
        response_id: &str,
        score: i64,
        feedback: Option<&str>,
    ) -> Result<String> {
        if !self.responses.read().unwrap().contains_key(response_id) {
            return Err(Error::NotFound(format!("response {}", response_id)));
        }

        let id = Uuid::new_v4().to_string();
        self.evaluations.write().unwrap().push(Evaluation {
            id: id.clone(),
            response_id: response_id.to_string(),
            score,
            feedback: feedback.map(str::to_string),
            created_at: now_ts(),
        });
        Ok(id)
    }
}
