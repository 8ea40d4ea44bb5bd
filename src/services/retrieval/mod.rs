//! Retrieval
//!
//! Vector storage and similarity search over chunk embeddings:
//! - `hnsw`: approximate nearest neighbor index backed by `hnsw_rs`
//! - `store`: owner-scoped vector store with an exact-scan fallback

pub mod hnsw;
pub mod store;

pub use hnsw::{HnswIndex, IndexConfig};
pub use store::{RetrievalConfig, SearchResult, VectorStore, DEFAULT_TOP_K};
