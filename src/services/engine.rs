//! RAG Engine
//!
//! Top-level orchestrator for the document question answering pipeline.
//! Owns the chunker, embedding manager, vector store, and synthesizer, and
//! exposes the entrypoints: `ingest`, `query`, `delete_document`, and
//! `list_documents`.
//!
//! All entrypoints take an already-authenticated owner identity as an
//! opaque string; the engine never derives identity itself.
//!
//! ## Design Decisions
//!
//! - Constructed from an explicit [`EngineConfig`]; no global state. The
//!   embedding manager and chat model are injectable for tests via
//!   [`RagEngine::with_components`].
//! - Re-ingesting a document is clear-then-rebuild: its old index entries
//!   are retired while their vector ids are still readable, then the chunk
//!   rows are replaced and the new set embedded.
//! - A chunk whose embedding fails keeps its row with a NULL embedding and
//!   is reported per chunk; the document-level call still succeeds, so a
//!   later re-ingest fills the gaps.
//! - Deletion retires index entries before rows go away and rebuilds the
//!   graph inline once the stale share passes the rebuild threshold.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::settings::EngineConfig;
use crate::models::{Chunk, ChunkStatus, Document, IngestReport, QueryResponse};
use crate::services::chunker::Chunker;
use crate::services::embedding::EmbeddingManager;
use crate::services::llm::{create_chat_model, ChatModel};
use crate::services::retrieval::{HnswIndex, VectorStore};
use crate::services::synthesizer::AnswerSynthesizer;
use crate::storage::database::Database;
use crate::storage::repository::{ChunkRepository, DocumentRepository, SqliteRepository};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths;

/// Document question answering engine.
pub struct RagEngine {
    config: EngineConfig,
    chunker: Box<dyn Chunker>,
    embeddings: Arc<EmbeddingManager>,
    chat: Arc<dyn ChatModel>,
    store: Arc<VectorStore>,
    synthesizer: AnswerSynthesizer,
    documents: Arc<dyn DocumentRepository>,
    chunks: Arc<dyn ChunkRepository>,
}

impl RagEngine {
    /// Create an engine with production storage under `~/.docqa/`.
    pub async fn new(config: EngineConfig) -> AppResult<Self> {
        let db = Database::new()?;
        let index_dir = paths::ensure_index_dir()?;
        Self::with_database(config, db, index_dir).await
    }

    /// Create an engine over an explicit database and index directory.
    pub async fn with_database(
        config: EngineConfig,
        db: Database,
        index_dir: impl AsRef<Path>,
    ) -> AppResult<Self> {
        config.validate().map_err(AppError::validation)?;

        let embeddings = Arc::new(EmbeddingManager::from_config(config.embedding.clone())?);
        let chat = create_chat_model(config.chat.clone());

        Self::with_components(config, db, index_dir, embeddings, chat).await
    }

    /// Create an engine with pre-built embedding and chat components.
    ///
    /// The embedding manager decides the index dimension; the rest of the
    /// pipeline is assembled from `config`.
    pub async fn with_components(
        config: EngineConfig,
        db: Database,
        index_dir: impl AsRef<Path>,
        embeddings: Arc<EmbeddingManager>,
        chat: Arc<dyn ChatModel>,
    ) -> AppResult<Self> {
        let repository = Arc::new(SqliteRepository::new(db));
        let documents: Arc<dyn DocumentRepository> = repository.clone();
        let chunks: Arc<dyn ChunkRepository> = repository;

        let chunker = config.chunker.build();

        let index = Arc::new(HnswIndex::with_config(
            index_dir,
            embeddings.dimension(),
            config.retrieval.index.clone(),
        ));
        let store = Arc::new(VectorStore::new(chunks.clone(), index));
        store.ensure_ready().await?;

        let synthesizer = AnswerSynthesizer::new(
            embeddings.clone(),
            store.clone(),
            chunks.clone(),
            chat.clone(),
            config.retrieval.top_k,
        );

        info!(
            embedder = %embeddings.display_name(),
            chat_model = chat.model(),
            dimension = embeddings.dimension(),
            "engine ready"
        );

        Ok(Self {
            config,
            chunker,
            embeddings,
            chat,
            store,
            synthesizer,
            documents,
            chunks,
        })
    }

    /// The configuration this engine was built from.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Entrypoints
    // -----------------------------------------------------------------------

    /// Ingest a document's text for an owner: chunk, store, embed, index.
    ///
    /// Creates the document row if absent. Re-ingesting an existing
    /// document replaces its chunks wholesale. Per-chunk embedding failures
    /// are recorded in the report and leave the chunk row with a NULL
    /// embedding; the call itself still succeeds.
    pub async fn ingest(
        &self,
        document_id: &str,
        owner_id: &str,
        raw_text: &str,
    ) -> AppResult<IngestReport> {
        if raw_text.trim().is_empty() {
            return Err(AppError::extraction_empty(format!(
                "document {} has no text to chunk",
                document_id
            )));
        }

        match self.documents.get_document(document_id)? {
            Some(existing) if existing.owner_id != owner_id => {
                return Err(AppError::not_found(format!("document {}", document_id)));
            }
            Some(_) => {}
            None => {
                let document = Document::with_id(document_id, owner_id);
                self.documents.upsert_document(&document)?;
            }
        }

        // Retire previous index entries while their vector ids are still
        // readable, then swap the chunk rows.
        let retired = self.store.retire_document(document_id).await?;
        if retired > 0 {
            debug!(document_id, retired, "retired previous index entries");
        }

        let texts = self.chunker.split(raw_text);
        let chunk_rows: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk::new(document_id, owner_id, i, text.as_str()))
            .collect();
        self.chunks.replace_chunks(document_id, &chunk_rows)?;

        let refs: Vec<&str> = chunk_rows.iter().map(|c| c.text.as_str()).collect();
        let statuses = match self.embeddings.embed_documents(&refs).await {
            Ok(vectors) => {
                let mut statuses = Vec::with_capacity(chunk_rows.len());
                for (chunk, vector) in chunk_rows.iter().zip(vectors.iter()) {
                    match self.store.upsert(&chunk.id, owner_id, vector).await {
                        Ok(_) => {
                            statuses.push(ChunkStatus::embedded(&chunk.id, chunk.sequence_no))
                        }
                        Err(err) => {
                            warn!(chunk_id = %chunk.id, error = %err, "chunk indexing failed");
                            statuses.push(ChunkStatus::failed(
                                &chunk.id,
                                chunk.sequence_no,
                                err.to_string(),
                            ));
                        }
                    }
                }
                statuses
            }
            Err(err) => {
                warn!(document_id, error = %err, "embedding failed for document");
                chunk_rows
                    .iter()
                    .map(|chunk| {
                        ChunkStatus::failed(&chunk.id, chunk.sequence_no, err.to_string())
                    })
                    .collect()
            }
        };

        // The graph is rebuildable from the chunk table; a failed dump only
        // costs startup time, so it does not fail the ingest.
        if let Err(err) = self.store.persist().await {
            warn!(error = %err, "failed to persist vector index");
        }

        let report = IngestReport::new(document_id, statuses);
        info!(
            document_id,
            owner_id,
            chunks = report.chunk_count,
            embedded = report.embedded_count,
            failed = report.failed_count,
            "document ingested"
        );
        Ok(report)
    }

    /// Answer a question from the owner's documents.
    pub async fn query(&self, owner_id: &str, question: &str) -> AppResult<QueryResponse> {
        info!(owner_id, question_chars = question.len(), "query received");
        let answer = self.synthesizer.answer(owner_id, question).await?;
        Ok(QueryResponse::new(answer))
    }

    /// Delete an owner's document, cascading to chunks and index entries.
    ///
    /// Deleting a missing document, or one belonging to another owner, is a
    /// not-found error.
    pub async fn delete_document(&self, owner_id: &str, document_id: &str) -> AppResult<()> {
        let document = self
            .documents
            .get_document(document_id)?
            .ok_or_else(|| AppError::not_found(format!("document {}", document_id)))?;
        if document.owner_id != owner_id {
            return Err(AppError::not_found(format!("document {}", document_id)));
        }

        let retired = self.store.retire_document(document_id).await?;
        self.documents.delete_document(document_id)?;

        if self.store.needs_rebuild().await {
            self.store.rebuild().await?;
            if let Err(err) = self.store.persist().await {
                warn!(error = %err, "failed to persist vector index after rebuild");
            }
        }

        info!(document_id, owner_id, retired, "document deleted");
        Ok(())
    }

    /// List the owner's documents, newest first.
    pub fn list_documents(&self, owner_id: &str) -> AppResult<Vec<Document>> {
        self.documents.list_documents(owner_id)
    }

    /// Check that the embedding and chat providers are reachable.
    pub async fn health_check(&self) -> AppResult<()> {
        self.embeddings.health_check().await?;
        self.chat.health_check().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
