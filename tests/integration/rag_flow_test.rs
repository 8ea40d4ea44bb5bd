//! RAG Flow Integration Tests
//!
//! End-to-end tests for the ingest/query/delete flow, running entirely on
//! the local provider stack: the hashing embedder and the stub chat model.
//! No network access is required and answers are deterministic.

use tempfile::TempDir;

use docqa::models::EmbeddingStatus;
use docqa::storage::repository::{ChunkRepository, SqliteRepository};
use docqa::{Database, EngineConfig, RagEngine, REFUSAL_SENTENCE};

// ============================================================================
// Helper Functions
// ============================================================================

/// Local-stack engine config with a small embedding dimension.
fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.embedding.primary.dimension = Some(64);
    config.embedding.cache_enabled = false;
    config
}

/// Engine over an in-memory database and a temporary index directory.
///
/// The database handle is returned alongside the engine so tests can
/// inspect the stored rows; the in-memory pool holds a single connection,
/// so clones observe the engine's writes.
async fn test_engine() -> (RagEngine, Database, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = Database::new_in_memory().unwrap();
    let engine = RagEngine::with_database(test_config(), db.clone(), dir.path().join("index"))
        .await
        .unwrap();
    (engine, db, dir)
}

// ============================================================================
// Ingest and Query
// ============================================================================

#[tokio::test]
async fn test_ingest_then_query_answers_from_document() {
    let (engine, _db, _dir) = test_engine().await;

    let report = engine
        .ingest("doc-1", "user-1", "The sky is blue. Grass is green.")
        .await
        .unwrap();
    assert_eq!(report.document_id, "doc-1");
    assert!(report.is_complete());
    assert_eq!(report.chunk_count, report.embedded_count);

    let response = engine
        .query("user-1", "What color is the sky?")
        .await
        .unwrap();
    assert!(
        response.answer.contains("blue"),
        "expected answer about the sky, got: {}",
        response.answer
    );
}

#[tokio::test]
async fn test_query_without_documents_refuses() {
    let (engine, _db, _dir) = test_engine().await;

    let first = engine.query("user-1", "What is the capital of France?").await.unwrap();
    let second = engine.query("user-1", "What is the capital of France?").await.unwrap();

    assert_eq!(first.answer, REFUSAL_SENTENCE);
    // Refusal is deterministic across repeated queries.
    assert_eq!(first.answer, second.answer);
}

#[tokio::test]
async fn test_multi_chunk_document_retrieval() {
    let (engine, _db, _dir) = test_engine().await;

    // Long enough to force multiple overlapping chunks; the answer lives
    // near the end so it must be retrieved from a later chunk.
    let filler = "Many cities have beautiful parks and gardens. ".repeat(30);
    let text = format!("{}The secret word is zanzibar.", filler);

    let report = engine.ingest("doc-long", "user-1", &text).await.unwrap();
    assert!(
        report.chunk_count > 1,
        "expected multiple chunks, got {}",
        report.chunk_count
    );
    assert!(report.is_complete());

    let response = engine
        .query("user-1", "What is the secret word?")
        .await
        .unwrap();
    assert!(
        response.answer.contains("zanzibar"),
        "expected the secret word, got: {}",
        response.answer
    );
}

#[tokio::test]
async fn test_ingest_report_serializes_per_chunk_status() {
    let (engine, _db, _dir) = test_engine().await;

    let report = engine
        .ingest("doc-1", "user-1", "The sky is blue.")
        .await
        .unwrap();

    assert_eq!(report.chunks.len(), 1);
    assert_eq!(report.chunks[0].chunk_id, "doc-1:0");
    assert_eq!(report.chunks[0].status, EmbeddingStatus::Embedded);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["chunks"][0]["status"], "embedded");
    // Successful chunks carry no error field.
    assert!(json["chunks"][0].get("error").is_none());
}

// ============================================================================
// Re-ingestion
// ============================================================================

#[tokio::test]
async fn test_reingest_replaces_chunks_without_duplicates() {
    let (engine, db, _dir) = test_engine().await;

    engine
        .ingest("doc-1", "user-1", "The sky is blue. Grass is green.")
        .await
        .unwrap();
    let report = engine
        .ingest("doc-1", "user-1", "The sky is blue. Grass is green.")
        .await
        .unwrap();
    assert!(report.is_complete());

    let repo = SqliteRepository::new(db);
    let rows = repo.chunks_for_document("doc-1").unwrap();
    assert_eq!(rows.len(), report.chunk_count);
    for row in &rows {
        assert!(row.embedding.is_some(), "chunk {} lost its embedding", row.id);
    }

    // The document still answers after being replaced.
    let response = engine
        .query("user-1", "What color is the sky?")
        .await
        .unwrap();
    assert!(response.answer.contains("blue"));
}

#[tokio::test]
async fn test_reingest_with_new_content_changes_answers() {
    let (engine, _db, _dir) = test_engine().await;

    engine
        .ingest("doc-1", "user-1", "The secret word is apple.")
        .await
        .unwrap();
    engine
        .ingest("doc-1", "user-1", "The secret word is banana.")
        .await
        .unwrap();

    let response = engine
        .query("user-1", "What is the secret word?")
        .await
        .unwrap();
    assert!(
        response.answer.contains("banana"),
        "expected the replacement content, got: {}",
        response.answer
    );
    assert!(!response.answer.contains("apple"));
}

// ============================================================================
// Owner Isolation
// ============================================================================

#[tokio::test]
async fn test_owners_are_isolated() {
    let (engine, _db, _dir) = test_engine().await;

    engine
        .ingest("doc-1", "user-1", "The launch code is 7425.")
        .await
        .unwrap();

    // Another user sees no documents and gets no answer from them.
    let response = engine
        .query("user-2", "What is the launch code?")
        .await
        .unwrap();
    assert_eq!(response.answer, REFUSAL_SENTENCE);
    assert!(engine.list_documents("user-2").unwrap().is_empty());

    // Nor can they delete what they do not own.
    let err = engine.delete_document("user-2", "doc-1").await.unwrap_err();
    assert!(err.to_string().contains("doc-1"));

    // The owner is unaffected.
    let response = engine
        .query("user-1", "What is the launch code?")
        .await
        .unwrap();
    assert!(response.answer.contains("7425"));
    assert_eq!(engine.list_documents("user-1").unwrap().len(), 1);
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_delete_document_removes_its_answers() {
    let (engine, _db, _dir) = test_engine().await;

    engine
        .ingest("doc-sky", "user-1", "The sky is blue.")
        .await
        .unwrap();
    engine
        .ingest("doc-paris", "user-1", "Paris is the capital of France.")
        .await
        .unwrap();

    engine.delete_document("user-1", "doc-sky").await.unwrap();

    let docs = engine.list_documents("user-1").unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "doc-paris");

    // The deleted document's content is no longer retrievable.
    let response = engine
        .query("user-1", "What color is the sky?")
        .await
        .unwrap();
    assert!(
        !response.answer.contains("blue"),
        "deleted content leaked into: {}",
        response.answer
    );

    // The surviving document still answers.
    let response = engine
        .query("user-1", "What is the capital of France?")
        .await
        .unwrap();
    assert!(response.answer.contains("Paris"));
}

#[tokio::test]
async fn test_delete_all_documents_returns_to_refusal() {
    let (engine, _db, _dir) = test_engine().await;

    engine
        .ingest("doc-1", "user-1", "The sky is blue.")
        .await
        .unwrap();
    engine.delete_document("user-1", "doc-1").await.unwrap();

    let response = engine
        .query("user-1", "What color is the sky?")
        .await
        .unwrap();
    assert_eq!(response.answer, REFUSAL_SENTENCE);
}

// ============================================================================
// Restart and Persistence
// ============================================================================

#[tokio::test]
async fn test_engine_restart_reuses_persisted_index() {
    let dir = TempDir::new().unwrap();
    let db = Database::new_in_memory().unwrap();
    let index_dir = dir.path().join("index");

    let engine = RagEngine::with_database(test_config(), db.clone(), &index_dir)
        .await
        .unwrap();
    engine
        .ingest("doc-1", "user-1", "The sky is blue. Grass is green.")
        .await
        .unwrap();
    drop(engine);

    // A fresh engine over the same database and index directory loads the
    // persisted graph instead of rebuilding, and answers immediately.
    let engine = RagEngine::with_database(test_config(), db, &index_dir)
        .await
        .unwrap();
    let response = engine
        .query("user-1", "What color is the sky?")
        .await
        .unwrap();
    assert!(response.answer.contains("blue"));

    let docs = engine.list_documents("user-1").unwrap();
    assert_eq!(docs.len(), 1);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_local_stack_reports_healthy() {
    let (engine, _db, _dir) = test_engine().await;
    engine.health_check().await.unwrap();
}
