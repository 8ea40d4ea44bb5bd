//! Services
//!
//! Business logic services for the engine: chunking, embedding, retrieval,
//! and answer synthesis, orchestrated by `RagEngine`.

pub mod chunker;
pub mod embedding;
pub mod engine;
pub mod llm;
pub mod retrieval;
pub mod synthesizer;

pub use chunker::{Chunker, ChunkerConfig, SlidingWindowChunker};
pub use embedding::{EmbeddingManager, EmbeddingManagerConfig};
pub use engine::RagEngine;
pub use retrieval::{HnswIndex, IndexConfig, RetrievalConfig, SearchResult, VectorStore};
pub use synthesizer::AnswerSynthesizer;
