//! Recall Integration Tests
//!
//! Measures the approximate index against the brute-force cosine scan on a
//! fixed synthetic corpus, and round-trips the graph through its on-disk
//! dump. Vectors are generated deterministically so the corpus, and the
//! expected neighbors, are the same on every run.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tempfile::{tempdir, TempDir};

use docqa::models::{Chunk, Document};
use docqa::services::retrieval::{HnswIndex, SearchResult, VectorStore};
use docqa::storage::database::Database;
use docqa::storage::repository::{ChunkRepository, DocumentRepository, SqliteRepository};

const DIM: usize = 16;
const CORPUS_SIZE: usize = 60;
const K: usize = 5;

// ============================================================================
// Helper Functions
// ============================================================================

/// Deterministic pseudo-random unit vector for a seed.
fn unit_vector(dim: usize, seed: usize) -> Vec<f32> {
    let mut v = Vec::with_capacity(dim);
    for i in 0..dim {
        let val = ((seed * 31 + i * 17) % 997) as f32 / 997.0 + 0.001;
        v.push(val);
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in v.iter_mut() {
        *x /= norm;
    }
    v
}

/// Vector store seeded with `CORPUS_SIZE` embedded chunks for one owner.
///
/// Chunk `corpus:{i}` carries `unit_vector(DIM, i)`, so a query built from
/// the same seed has a known nearest neighbor.
async fn seeded_store() -> Result<(VectorStore, Arc<SqliteRepository>, TempDir)> {
    let dir = tempdir()?;
    let db = Database::new_in_memory()?;
    let repo = Arc::new(SqliteRepository::new(db));

    let doc = Document::with_id("corpus", "user-1");
    repo.upsert_document(&doc)?;
    let chunks: Vec<Chunk> = (0..CORPUS_SIZE)
        .map(|i| Chunk::new("corpus", "user-1", i, format!("chunk {}", i)))
        .collect();
    repo.replace_chunks("corpus", &chunks)?;

    let index = Arc::new(HnswIndex::new(dir.path().join("hnsw"), DIM));
    index.initialize().await;
    let store = VectorStore::new(repo.clone(), index);

    for i in 0..CORPUS_SIZE {
        store
            .upsert(&format!("corpus:{}", i), "user-1", &unit_vector(DIM, i))
            .await?;
    }

    Ok((store, repo, dir))
}

fn result_ids(results: &[SearchResult]) -> HashSet<String> {
    results.iter().map(|r| r.chunk_id.clone()).collect()
}

// ============================================================================
// Recall Against Brute Force
// ============================================================================

#[tokio::test]
async fn test_ann_overlaps_exact_search_at_k5() -> Result<()> {
    let (store, _repo, _dir) = seeded_store().await?;

    let query_count = 20;
    let mut matched = 0usize;
    for j in 0..query_count {
        let query = unit_vector(DIM, 400 + j);

        let ann = store.search("user-1", &query, K).await?;
        let exact = store.search_exact("user-1", &query, K)?;
        assert_eq!(ann.len(), K);
        assert_eq!(exact.len(), K);

        // Scores come back in descending order.
        for pair in ann.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        matched += result_ids(&ann).intersection(&result_ids(&exact)).count();
    }

    let recall = matched as f32 / (query_count * K) as f32;
    assert!(
        recall >= 0.9,
        "ANN recall {} fell below 0.9 ({} of {} neighbors matched)",
        recall,
        matched,
        query_count * K
    );
    Ok(())
}

#[tokio::test]
async fn test_exact_duplicate_query_finds_its_chunk() -> Result<()> {
    let (store, _repo, _dir) = seeded_store().await?;

    // The query equals chunk 7's vector, so it is the unambiguous top hit
    // for both search paths.
    let query = unit_vector(DIM, 7);

    let ann = store.search("user-1", &query, K).await?;
    assert_eq!(ann[0].chunk_id, "corpus:7");
    assert!(ann[0].score > 0.999);

    let exact = store.search_exact("user-1", &query, K)?;
    assert_eq!(exact[0].chunk_id, "corpus:7");
    Ok(())
}

// ============================================================================
// Graph Persistence
// ============================================================================

#[tokio::test]
async fn test_persisted_graph_round_trips() -> Result<()> {
    let (store, repo, dir) = seeded_store().await?;
    store.persist().await?;

    // A fresh index over the same directory loads the dumped graph instead
    // of rebuilding, and serves the same neighbors.
    let reloaded = Arc::new(HnswIndex::new(dir.path().join("hnsw"), DIM));
    let store = VectorStore::new(repo, reloaded.clone());
    store.ensure_ready().await?;
    assert!(reloaded.is_ready().await);

    let query = unit_vector(DIM, 7);
    let results = store.search("user-1", &query, K).await?;
    assert_eq!(results[0].chunk_id, "corpus:7");
    assert_eq!(results.len(), K);
    Ok(())
}
