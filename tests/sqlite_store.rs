//! SQLite knowledge store integration tests against a temporary database.

use tempfile::TempDir;

use recall_harness::db;
use recall_harness::error::Error;
use recall_harness::migrate;
use recall_harness::models::ChatRole;
use recall_harness::store::sqlite::SqliteStore;
use recall_harness::store::KnowledgeStore;

async fn open_store(tmp: &TempDir) -> SqliteStore {
    let pool = db::connect(&tmp.path().join("recall.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    SqliteStore::new(pool)
}

#[tokio::test]
async fn document_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let id = store
        .create_document("paper.pdf", "s3://bucket/uploads/x-paper.pdf", Some("alice"), "Body.")
        .await
        .unwrap();

    let doc = store.get_document(&id).await.unwrap();
    assert_eq!(doc.title, "paper.pdf");
    assert_eq!(doc.storage_uri, "s3://bucket/uploads/x-paper.pdf");
    assert_eq!(doc.owner_id.as_deref(), Some("alice"));
    assert_eq!(doc.raw_text, "Body.");

    let other = store
        .create_document("second.pdf", "s3://bucket/uploads/y-second.pdf", None, "Other.")
        .await
        .unwrap();

    let listed = store.list_documents().await.unwrap();
    assert_eq!(listed.len(), 2);
    let ids: Vec<&str> = listed.iter().map(|d| d.id.as_str()).collect();
    assert!(ids.contains(&id.as_str()));
    assert!(ids.contains(&other.as_str()));
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let err = store.get_document("nope").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn embedding_upsert_keeps_one_record_per_document() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let id = store
        .create_document("d.pdf", "mem://d", None, "text")
        .await
        .unwrap();

    store.upsert_embedding(&id, &[1.0, 2.0, 3.0], "text v1").await.unwrap();
    store.upsert_embedding(&id, &[4.0, 5.0, 6.0], "text v2").await.unwrap();

    let record = store.get_embedding(&id).await.unwrap();
    assert_eq!(record.vector, vec![4.0, 5.0, 6.0]);
    assert_eq!(record.source_text, "text v2");
}

#[tokio::test]
async fn missing_embedding_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let id = store
        .create_document("d.pdf", "mem://d", None, "text")
        .await
        .unwrap();

    let err = store.get_embedding(&id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn question_batches_preserve_order() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let id = store
        .create_document("d.pdf", "mem://d", None, "text")
        .await
        .unwrap();

    let first = store
        .insert_questions(&id, &["Q1?".to_string(), "Q2?".to_string()])
        .await
        .unwrap();
    assert_eq!(first.len(), 2);

    store.insert_questions(&id, &["Q3?".to_string()]).await.unwrap();

    let listed = store.list_questions(&id).await.unwrap();
    let texts: Vec<&str> = listed.iter().map(|q| q.text.as_str()).collect();
    assert_eq!(texts, vec!["Q1?", "Q2?", "Q3?"]);
}

#[tokio::test]
async fn chat_history_orders_by_timestamp_with_insertion_tiebreak() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let id = store
        .create_document("d.pdf", "mem://d", None, "text")
        .await
        .unwrap();

    store.append_chat(&id, ChatRole::User, "late", 30).await.unwrap();
    store.append_chat(&id, ChatRole::System, "early", 10).await.unwrap();
    // Two entries share a timestamp; insertion order must hold.
    store.append_chat(&id, ChatRole::System, "tie-first", 20).await.unwrap();
    store.append_chat(&id, ChatRole::User, "tie-second", 20).await.unwrap();

    let chat = store.list_chat(&id).await.unwrap();
    let contents: Vec<&str> = chat.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(contents, vec!["early", "tie-first", "tie-second", "late"]);
}

#[tokio::test]
async fn chat_histories_are_isolated_per_document() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let a = store.create_document("a.pdf", "mem://a", None, "a").await.unwrap();
    let b = store.create_document("b.pdf", "mem://b", None, "b").await.unwrap();

    store.append_chat(&a, ChatRole::System, "for a", 1).await.unwrap();
    store.append_chat(&b, ChatRole::System, "for b", 1).await.unwrap();

    let chat_a = store.list_chat(&a).await.unwrap();
    assert_eq!(chat_a.len(), 1);
    assert_eq!(chat_a[0].content, "for a");
}

#[tokio::test]
async fn response_and_evaluation_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let doc_id = store
        .create_document("d.pdf", "mem://d", None, "text")
        .await
        .unwrap();
    let questions = store
        .insert_questions(&doc_id, &["Q1?".to_string()])
        .await
        .unwrap();

    let response_id = store
        .record_response(&doc_id, Some(&questions[0].id), "alice", "my answer")
        .await
        .unwrap();

    let response = store.get_response(&response_id).await.unwrap();
    assert_eq!(response.document_id, doc_id);
    assert_eq!(response.question_id.as_deref(), Some(questions[0].id.as_str()));
    assert_eq!(response.user_id, "alice");
    assert_eq!(response.text, "my answer");

    let evaluation_id = store
        .record_evaluation(&response_id, 73, Some("close"))
        .await
        .unwrap();
    assert!(!evaluation_id.is_empty());
}

#[tokio::test]
async fn response_for_unknown_document_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let err = store
        .record_response("nope", None, "alice", "text")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn evaluation_for_unknown_response_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let err = store.record_evaluation("nope", 50, None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect(&tmp.path().join("recall.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    let store = SqliteStore::new(pool);
    store
        .create_document("d.pdf", "mem://d", None, "text")
        .await
        .unwrap();
}
