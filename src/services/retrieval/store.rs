//! Vector Store
//!
//! Owner-scoped similarity search over chunk embeddings, backed by two
//! interchangeable strategies behind one struct:
//!
//! - **Exact**: brute-force cosine scan over the owner's embedded chunks.
//!   The reference implementation for correctness.
//! - **HNSW**: approximate graph search with an oversampled candidate list
//!   to survive owner post-filtering. Falls back to the exact scan whenever
//!   the filtered candidate set comes up short of `k`, so approximation can
//!   cost recall but never rows.
//!
//! ## Design Decisions
//!
//! - The SQLite chunk table is the source of truth. `upsert` writes the
//!   vector to the row first and only then registers it in the index, so a
//!   crash between the two steps loses index state (rebuildable), never
//!   data.
//! - Replaced vectors are soft-deleted: the old vector id goes into the
//!   index stale set and a fresh id is allocated for the new vector. Vector
//!   ids are never reused.
//! - Scores are cosine similarity in descending order. Equal scores tie
//!   break by vector id ascending, which is insertion order, keeping result
//!   order deterministic.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::services::retrieval::hnsw::{HnswIndex, IndexConfig};
use crate::storage::repository::ChunkRepository;
use crate::utils::error::{AppError, AppResult};
use crate::utils::vectors::cosine_similarity;

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Factor by which ANN candidate lists are oversampled before the owner
/// filter is applied.
const ANN_OVERSAMPLE_FACTOR: usize = 3;

// ---------------------------------------------------------------------------
// RetrievalConfig
// ---------------------------------------------------------------------------

/// Retrieval tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// ANN index parameters.
    #[serde(default)]
    pub index: IndexConfig,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            index: IndexConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.top_k == 0 {
            return Err("top_k must be at least 1".to_string());
        }
        self.index.validate()
    }
}

// ---------------------------------------------------------------------------
// SearchResult
// ---------------------------------------------------------------------------

/// A retrieved chunk reference with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Id of the matching chunk.
    pub chunk_id: String,
    /// Cosine similarity between the query vector and the chunk embedding.
    pub score: f32,
}

// ---------------------------------------------------------------------------
// VectorStore
// ---------------------------------------------------------------------------

/// Persistent, owner-scoped vector store over the chunk repository and the
/// HNSW index.
pub struct VectorStore {
    repository: Arc<dyn ChunkRepository>,
    index: Arc<HnswIndex>,
}

impl VectorStore {
    pub fn new(repository: Arc<dyn ChunkRepository>, index: Arc<HnswIndex>) -> Self {
        Self { repository, index }
    }

    /// Bring the ANN index online: reuse it if already initialized, load
    /// the persisted graph if present, otherwise build a fresh graph from
    /// the chunk table.
    pub async fn ensure_ready(&self) -> AppResult<()> {
        if self.index.is_ready().await {
            return Ok(());
        }
        if self.index.load_from_disk().await {
            return Ok(());
        }
        self.index.initialize().await;
        self.rebuild().await
    }

    /// Store a chunk's embedding and register it in the index.
    ///
    /// The chunk row must already exist and belong to `owner_id`; a chunk
    /// owned by someone else is reported as not found rather than revealed.
    /// Re-upserting an existing chunk id replaces its vector in place: the
    /// previous index entry is retired and a fresh vector id allocated.
    ///
    /// Returns the allocated vector id.
    pub async fn upsert(
        &self,
        chunk_id: &str,
        owner_id: &str,
        embedding: &[f32],
    ) -> AppResult<i64> {
        if embedding.len() != self.index.dimension() {
            return Err(AppError::validation(format!(
                "embedding dimension {} does not match index dimension {}",
                embedding.len(),
                self.index.dimension()
            )));
        }

        let row = self
            .repository
            .get_chunk(chunk_id)?
            .ok_or_else(|| AppError::not_found(format!("chunk {}", chunk_id)))?;
        if row.owner_id != owner_id {
            return Err(AppError::not_found(format!("chunk {}", chunk_id)));
        }

        if let Some(old_id) = row.vector_id {
            self.index.mark_stale(old_id as usize).await;
        }

        let vector_id = self.repository.store_embedding(chunk_id, embedding)?;
        self.index.insert(vector_id as usize, embedding).await;

        debug!(chunk_id, vector_id, "vector upserted");
        Ok(vector_id)
    }

    /// Top-k search over the owner's embedded chunks.
    ///
    /// The query vector must match the index dimension. Tries the ANN index
    /// first with an oversampled candidate list; when owner filtering leaves
    /// fewer than `k` candidates, falls back to the exact scan. Results are
    /// ordered by descending cosine similarity.
    pub async fn search(
        &self,
        owner_id: &str,
        query: &[f32],
        k: usize,
    ) -> AppResult<Vec<SearchResult>> {
        if query.len() != self.index.dimension() {
            return Err(AppError::validation(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.index.dimension()
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.index.search(query, k * ANN_OVERSAMPLE_FACTOR).await;

        let mut hits = Vec::new();
        for (vector_id, distance) in candidates {
            match self.repository.chunk_by_vector_id(vector_id as i64)? {
                Some(row) if row.owner_id == owner_id => {
                    hits.push(SearchResult {
                        chunk_id: row.id,
                        score: 1.0 - distance,
                    });
                }
                Some(_) => {}
                None => {
                    // Index entry with no backing row; retire it.
                    self.index.mark_stale(vector_id).await;
                }
            }
        }

        if hits.len() >= k {
            hits.truncate(k);
            return Ok(hits);
        }

        debug!(
            owner_id,
            ann_hits = hits.len(),
            k,
            "ANN candidates short of k, falling back to exact scan"
        );
        self.search_exact(owner_id, query, k)
    }

    /// Brute-force cosine scan over the owner's embedded chunks.
    ///
    /// Chunks with null embeddings are never candidates. The stable sort
    /// over rows already ordered by vector id gives equal scores a
    /// deterministic insertion-order tie break.
    pub fn search_exact(
        &self,
        owner_id: &str,
        query: &[f32],
        k: usize,
    ) -> AppResult<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = self.repository.embedded_chunks_for_owner(owner_id)?;
        let mut scored: Vec<SearchResult> = rows
            .into_iter()
            .filter_map(|row| {
                row.embedding.as_ref().map(|embedding| SearchResult {
                    chunk_id: row.id.clone(),
                    score: cosine_similarity(query, embedding),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Retire all index entries belonging to a document's chunks.
    ///
    /// Returns the number of vectors retired. Call before deleting the
    /// document rows so the vector ids can still be resolved.
    pub async fn retire_document(&self, document_id: &str) -> AppResult<usize> {
        let vector_ids = self.repository.vector_ids_for_document(document_id)?;
        let retired = vector_ids.len();
        for vector_id in vector_ids {
            self.index.mark_stale(vector_id as usize).await;
        }
        debug!(document_id, retired, "document vectors retired");
        Ok(retired)
    }

    /// Rebuild the ANN index from the chunk table.
    ///
    /// Drops the current graph (and its stale set) and re-inserts every
    /// embedded chunk under its persisted vector id.
    pub async fn rebuild(&self) -> AppResult<()> {
        let rows = self.repository.all_embedded_chunks()?;
        self.index.reset().await;

        let items: Vec<(usize, Vec<f32>)> = rows
            .into_iter()
            .filter_map(|row| match (row.vector_id, row.embedding) {
                (Some(vector_id), Some(embedding)) => Some((vector_id as usize, embedding)),
                _ => None,
            })
            .collect();

        info!(vectors = items.len(), "rebuilding ANN index from chunk table");
        self.index.batch_insert(&items).await;
        Ok(())
    }

    /// Whether the stale fraction warrants a rebuild.
    pub async fn needs_rebuild(&self) -> bool {
        self.index.needs_rebuild().await
    }

    /// Persist the ANN graph to disk.
    pub async fn persist(&self) -> AppResult<()> {
        self.index.save_to_disk().await
    }

    /// Embedding dimension the store expects.
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
