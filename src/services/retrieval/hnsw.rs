//! HNSW Vector Index
//!
//! Wraps the `hnsw_rs` crate to provide O(log n) approximate nearest
//! neighbor search over chunk embeddings. The index is a derived cache:
//! the SQLite `chunks` table is the source of truth, and the HNSW sidecar
//! files can be deleted and rebuilt from it at any time.
//!
//! ## Thread Safety
//!
//! The inner `Hnsw` is wrapped in `Arc` and accessed via `RwLock` so that
//! readers (search) can proceed concurrently while writers (insert, rebuild)
//! hold exclusive access. CPU-bound HNSW operations are offloaded to
//! `tokio::task::spawn_blocking`.
//!
//! ## Persistence
//!
//! The index is persisted as two sidecar files:
//! - `<index_dir>/chunks.hnsw.graph`
//! - `<index_dir>/chunks.hnsw.data`
//!
//! ## Soft-Delete Pattern
//!
//! `hnsw_rs` does not support point deletion, so retired vector ids are
//! tracked in a `HashSet<usize>` and filtered from search results. When the
//! stale fraction exceeds 10%, `needs_rebuild` reports true and the owner
//! of the index is expected to rebuild it from the chunk table.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::utils::error::{AppError, AppResult};

/// Number of HNSW layers. Derived from capacity in the literature; fixed
/// here because it has no semantic effect on results.
const MAX_LAYER: usize = 16;

/// Stale fraction above which a rebuild is warranted.
const STALE_REBUILD_THRESHOLD: f64 = 0.10;

/// Basename used for the persisted HNSW files.
const HNSW_BASENAME: &str = "chunks";

// ---------------------------------------------------------------------------
// IndexConfig
// ---------------------------------------------------------------------------

/// HNSW build and search parameters.
///
/// These tune recall and speed but never change result semantics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexConfig {
    /// Maximum neighbor connections per node (the HNSW `M` parameter).
    #[serde(default = "default_m")]
    pub m: usize,
    /// Candidate list size during graph construction.
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,
    /// Candidate list size during search.
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
    /// Element count the graph is sized for. It can grow past this, at
    /// some cost to recall.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_m() -> usize {
    16
}

fn default_ef_construction() -> usize {
    64
}

fn default_ef_search() -> usize {
    64
}

fn default_capacity() -> usize {
    100_000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            m: default_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
            capacity: default_capacity(),
        }
    }
}

impl IndexConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.m == 0 {
            return Err("index m must be at least 1".to_string());
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err("index ef parameters must be at least 1".to_string());
        }
        if self.capacity == 0 {
            return Err("index capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HnswIndex
// ---------------------------------------------------------------------------

/// Thread-safe, async-friendly approximate nearest neighbor index with
/// disk persistence and soft-delete.
pub struct HnswIndex {
    /// Directory where HNSW sidecar files are stored.
    index_dir: PathBuf,
    /// Embedding vector dimension.
    dimension: usize,
    /// Build and search parameters.
    config: IndexConfig,
    /// The HNSW graph wrapped for concurrent access.
    /// `None` means the index has not been built yet.
    inner: RwLock<Option<Arc<HnswInner>>>,
    /// Vector ids marked as stale (soft-deleted).
    stale_ids: RwLock<HashSet<usize>>,
    /// Total number of vectors inserted (including stale ones).
    count: RwLock<usize>,
}

/// Newtype wrapper so the HNSW graph can be sent across threads.
///
/// The `'static` lifetime is safe here because:
/// - When created via `Hnsw::new()`, all data is owned.
/// - When loaded from disk, `hnsw_rs` reads data into owned memory.
/// - The `HnswIo` used for loading is leaked (via `Box::leak`) to satisfy
///   the borrow checker, as `hnsw_rs` returns `Hnsw<'a, ...>` borrowing
///   from the `HnswIo`.
struct HnswInner {
    hnsw: Hnsw<'static, f32, DistCosine>,
}

// SAFETY: hnsw_rs::Hnsw<'static, f32, DistCosine> uses Arc-based internal
// storage and is safe to share across threads.
unsafe impl Send for HnswInner {}
unsafe impl Sync for HnswInner {}

impl HnswIndex {
    /// Create a new, empty index with default parameters.
    pub fn new(index_dir: impl AsRef<Path>, dimension: usize) -> Self {
        Self::with_config(index_dir, dimension, IndexConfig::default())
    }

    /// Create a new, empty index with explicit parameters.
    pub fn with_config(index_dir: impl AsRef<Path>, dimension: usize, config: IndexConfig) -> Self {
        Self {
            index_dir: index_dir.as_ref().to_path_buf(),
            dimension,
            config,
            inner: RwLock::new(None),
            stale_ids: RwLock::new(HashSet::new()),
            count: RwLock::new(0),
        }
    }

    /// Initialize the index with an empty HNSW graph.
    pub async fn initialize(&self) {
        let hnsw = Hnsw::<f32, DistCosine>::new(
            self.config.m,
            self.config.capacity,
            MAX_LAYER,
            self.config.ef_construction,
            DistCosine,
        );
        let mut guard = self.inner.write().await;
        *guard = Some(Arc::new(HnswInner { hnsw }));
        let mut count = self.count.write().await;
        *count = 0;
        let mut stale = self.stale_ids.write().await;
        stale.clear();
    }

    /// Try to load the index from disk.
    ///
    /// Returns `true` if loaded successfully, `false` if the sidecar files
    /// do not exist or loading fails.
    ///
    /// Note: loading is done synchronously because `HnswIo` borrows data
    /// that must outlive the returned `Hnsw`. Loading is fast and happens
    /// only once at startup.
    pub async fn load_from_disk(&self) -> bool {
        let graph_file = self.index_dir.join(format!("{}.hnsw.graph", HNSW_BASENAME));
        let data_file = self.index_dir.join(format!("{}.hnsw.data", HNSW_BASENAME));

        if !graph_file.exists() || !data_file.exists() {
            debug!(
                dir = %self.index_dir.display(),
                "HNSW load_from_disk: files not found"
            );
            return false;
        }

        // hnsw_rs can panic on empty or truncated files instead of erroring.
        let graph_ok = std::fs::metadata(&graph_file)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        let data_ok = std::fs::metadata(&data_file)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !graph_ok || !data_ok {
            warn!(
                dir = %self.index_dir.display(),
                "HNSW load_from_disk: files exist but are empty or unreadable"
            );
            return false;
        }

        // Leak the HnswIo so the returned Hnsw can have a 'static lifetime.
        // This is a small fixed-size struct leaked once per load.
        let index_dir = self.index_dir.clone();

        let load_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let io = Box::leak(Box::new(HnswIo::new(&index_dir, HNSW_BASENAME)));
            let result: Result<Hnsw<'static, f32, DistCosine>, _> =
                io.load_hnsw_with_dist(DistCosine);
            result
        }));

        match load_result {
            Ok(Ok(hnsw)) => {
                let nb_point = hnsw.get_nb_point();
                let mut guard = self.inner.write().await;
                *guard = Some(Arc::new(HnswInner { hnsw }));
                let mut count = self.count.write().await;
                *count = nb_point;
                let mut stale = self.stale_ids.write().await;
                stale.clear();
                info!(
                    dir = %self.index_dir.display(),
                    points = nb_point,
                    "HNSW loaded from disk"
                );
                true
            }
            Ok(Err(e)) => {
                warn!(
                    dir = %self.index_dir.display(),
                    error = %e,
                    "HNSW load_from_disk failed"
                );
                false
            }
            Err(_panic) => {
                warn!(
                    dir = %self.index_dir.display(),
                    "HNSW load_from_disk panicked (corrupt index files), will rebuild"
                );
                // Remove corrupt files so the next attempt starts clean.
                let _ = std::fs::remove_file(&graph_file);
                let _ = std::fs::remove_file(&data_file);
                false
            }
        }
    }

    /// Save the index to disk, creating the index directory if needed.
    pub async fn save_to_disk(&self) -> AppResult<()> {
        let guard = self.inner.read().await;
        let inner = match guard.as_ref() {
            Some(inner) => Arc::clone(inner),
            None => return Err(AppError::retrieval("HNSW index not initialized")),
        };
        drop(guard);

        let index_dir = self.index_dir.clone();

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&index_dir)?;

            inner
                .hnsw
                .file_dump(&index_dir, HNSW_BASENAME)
                .map_err(|e| AppError::retrieval(format!("HNSW file_dump failed: {}", e)))?;

            Ok(())
        })
        .await
        .map_err(|e| AppError::internal(format!("index save task panicked: {}", e)))?
    }

    /// Insert a single vector under the given vector id.
    pub async fn insert(&self, id: usize, embedding: &[f32]) {
        let guard = self.inner.read().await;
        if let Some(inner) = guard.as_ref() {
            let data = embedding.to_vec();
            inner.hnsw.insert_slice((&data, id));
            drop(guard);
            let mut count = self.count.write().await;
            *count += 1;
        }
    }

    /// Insert multiple vectors.
    pub async fn batch_insert(&self, items: &[(usize, Vec<f32>)]) {
        if items.is_empty() {
            return;
        }
        let guard = self.inner.read().await;
        if let Some(inner) = guard.as_ref() {
            for (id, embedding) in items {
                inner.hnsw.insert_slice((embedding, *id));
            }
            drop(guard);
            let mut count = self.count.write().await;
            *count += items.len();
        }
    }

    /// Search for the `top_k` nearest neighbors of `query`.
    ///
    /// Returns `(vector_id, cosine_distance)` pairs sorted by distance
    /// ascending, then by vector id for equal distances. Stale ids are
    /// filtered out.
    pub async fn search(&self, query: &[f32], top_k: usize) -> Vec<(usize, f32)> {
        let guard = self.inner.read().await;
        let inner = match guard.as_ref() {
            Some(inner) => Arc::clone(inner),
            None => return Vec::new(),
        };
        drop(guard);

        let stale = self.stale_ids.read().await;
        let stale_snapshot: HashSet<usize> = stale.clone();
        drop(stale);

        let query_vec = query.to_vec();
        let ef_search = self.config.ef_search;

        let result: Result<Vec<(usize, f32)>, _> = tokio::task::spawn_blocking(move || {
            // Request extra results to compensate for stale id filtering.
            let ef = ef_search.max(top_k * 2);
            let request_k = top_k + stale_snapshot.len();
            let neighbours = inner.hnsw.search(&query_vec, request_k, ef);

            let mut results: Vec<(usize, f32)> = neighbours
                .into_iter()
                .filter(|n| !stale_snapshot.contains(&n.d_id))
                .map(|n| (n.d_id, n.distance))
                .collect();

            results.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            results.truncate(top_k);
            results
        })
        .await;

        result.unwrap_or_default()
    }

    /// Mark a vector id as stale (soft-delete).
    ///
    /// The id will be filtered from future search results.
    pub async fn mark_stale(&self, id: usize) {
        let mut stale = self.stale_ids.write().await;
        stale.insert(id);
    }

    /// Returns `true` once the index has been initialized or loaded.
    pub async fn is_ready(&self) -> bool {
        let guard = self.inner.read().await;
        guard.is_some()
    }

    /// Number of vectors in the index (including stale ones).
    pub async fn get_count(&self) -> usize {
        let count = self.count.read().await;
        *count
    }

    /// Number of stale ids.
    pub async fn get_stale_count(&self) -> usize {
        let stale = self.stale_ids.read().await;
        stale.len()
    }

    /// Returns true when the stale fraction exceeds the rebuild threshold.
    pub async fn needs_rebuild(&self) -> bool {
        let count = self.count.read().await;
        let stale = self.stale_ids.read().await;
        if *count == 0 {
            return false;
        }
        (stale.len() as f64 / *count as f64) > STALE_REBUILD_THRESHOLD
    }

    /// Reset the index to its empty state (for rebuild).
    pub async fn reset(&self) {
        self.initialize().await;
    }

    /// Directory holding the persisted sidecar files.
    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Embedding dimension this index was created for.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
