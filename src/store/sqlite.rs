//! SQLite-backed [`KnowledgeStore`] implementation.
//!
//! Stores all collections in one SQLite database (WAL mode) through an
//! `sqlx` pool. Embedding vectors are stored as little-endian `f32` BLOBs.
//! Chat ordering uses `(timestamp, rowid)` so that equal timestamps keep
//! insertion order.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::{ChatEntry, ChatRole, Document, EmbeddingRecord, Question, UserResponse};

use super::KnowledgeStore;

/// SQLite store over a shared connection pool.
///
/// Constructed once at service start (see [`crate::db::connect`]) and passed
/// by reference to the components that need it — never ambient global state.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn document_exists(&self, id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        title: row.get("title"),
        storage_uri: row.get("storage_uri"),
        owner_id: row.get("owner_id"),
        raw_text: row.get("raw_text"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn create_document(
        &self,
        title: &str,
        storage_uri: &str,
        owner_id: Option<&str>,
        text: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO documents (id, title, storage_uri, owner_id, raw_text, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(title)
        .bind(storage_uri)
        .bind(owner_id)
        .bind(text)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_document(&self, id: &str) -> Result<Document> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;

        Ok(row_to_document(&row))
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents ORDER BY created_at DESC, id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn upsert_embedding(
        &self,
        document_id: &str,
        vector: &[f32],
        source_text: &str,
    ) -> Result<()> {
        let blob = vec_to_blob(vector);

        sqlx::query(
            r#"
            INSERT INTO embeddings (document_id, vector, source_text, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                vector = excluded.vector,
                source_text = excluded.source_text,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(document_id)
        .bind(&blob)
        .bind(source_text)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_embedding(&self, document_id: &str) -> Result<EmbeddingRecord> {
        let row = sqlx::query("SELECT * FROM embeddings WHERE document_id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("embedding for document {}", document_id)))?;

        let blob: Vec<u8> = row.get("vector");

        Ok(EmbeddingRecord {
            document_id: row.get("document_id"),
            vector: blob_to_vec(&blob),
            source_text: row.get("source_text"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn insert_questions(&self, document_id: &str, texts: &[String]) -> Result<Vec<Question>> {
        let mut tx = self.pool.begin().await?;
        let mut questions = Vec::with_capacity(texts.len());

        for text in texts {
            let question = Question {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                text: text.clone(),
                reference_answer: None,
            };

            sqlx::query(
                "INSERT INTO questions (id, document_id, text, reference_answer) VALUES (?, ?, ?, ?)",
            )
            .bind(&question.id)
            .bind(&question.document_id)
            .bind(&question.text)
            .bind(&question.reference_answer)
            .execute(&mut *tx)
            .await?;

            questions.push(question);
        }

        tx.commit().await?;
        Ok(questions)
    }

    async fn list_questions(&self, document_id: &str) -> Result<Vec<Question>> {
        let rows = sqlx::query("SELECT * FROM questions WHERE document_id = ? ORDER BY rowid")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| Question {
                id: row.get("id"),
                document_id: row.get("document_id"),
                text: row.get("text"),
                reference_answer: row.get("reference_answer"),
            })
            .collect())
    }

    async fn append_chat(
        &self,
        document_id: &str,
        role: ChatRole,
        content: &str,
        timestamp: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_history (document_id, role, content, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(document_id)
        .bind(role.as_str())
        .bind(content)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_chat(&self, document_id: &str) -> Result<Vec<ChatEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM chat_history WHERE document_id = ? ORDER BY timestamp ASC, id ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let role_str: String = row.get("role");
            let role = ChatRole::parse(&role_str).ok_or_else(|| {
                Error::StoreUnavailable(format!("corrupt chat role: {}", role_str))
            })?;
            entries.push(ChatEntry {
                document_id: row.get("document_id"),
                role,
                content: row.get("content"),
                timestamp: row.get("timestamp"),
            });
        }

        Ok(entries)
    }

    async fn record_response(
        &self,
        document_id: &str,
        question_id: Option<&str>,
        user_id: &str,
        text: &str,
    ) -> Result<String> {
        if !self.document_exists(document_id).await? {
            return Err(Error::NotFound(format!("document {}", document_id)));
        }

        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO responses (id, document_id, question_id, user_id, text, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(document_id)
        .bind(question_id)
        .bind(user_id)
        .bind(text)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_response(&self, id: &str) -> Result<UserResponse> {
        let row = sqlx::query("SELECT * FROM responses WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("response {}", id)))?;

        Ok(UserResponse {
            id: row.get("id"),
            document_id: row.get("document_id"),
            question_id: row.get("question_id"),
            user_id: row.get("user_id"),
            text: row.get("text"),
            created_at: row.get("created_at"),
        })
    }

    async fn record_evaluation(
        &self,
        response_id: &str,
        score: i64,
        feedback: Option<&str>,
    ) -> Result<String> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM responses WHERE id = ?")
            .bind(response_id)
            .fetch_one(&self.pool)
            .await?;
        if count == 0 {
            return Err(Error::NotFound(format!("response {}", response_id)));
        }

        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO evaluations (id, response_id, score, feedback, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(response_id)
        .bind(score)
        .bind(feedback)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }
}
