//! DocQA - Document Question Answering Engine
//!
//! A retrieval-augmented generation pipeline over user documents:
//! - Documents are split into overlapping chunks and embedded into vectors
//! - Vectors are stored in SQLite and indexed for approximate search (HNSW)
//! - Questions retrieve the owner's most similar chunks and a chat model
//!   synthesizes the answer from that context
//!
//! All reads and writes are scoped to an already-authenticated owner
//! identity. The library installs no tracing subscriber and holds no
//! global state; construct a [`RagEngine`] from an [`EngineConfig`].
//!
//! ```ignore
//! use docqa::{EngineConfig, RagEngine};
//!
//! let engine = RagEngine::new(EngineConfig::default()).await?;
//! engine.ingest("doc-1", "user-1", "The sky is blue.").await?;
//! let response = engine.query("user-1", "What color is the sky?").await?;
//! println!("{}", response.answer);
//! ```

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export the engine surface
pub use models::settings::EngineConfig;
pub use models::{Chunk, ChunkStatus, Document, EmbeddingStatus, IngestReport, QueryResponse};
pub use services::engine::RagEngine;
pub use services::llm::REFUSAL_SENTENCE;
pub use storage::config::ConfigService;
pub use storage::database::Database;
pub use utils::error::{AppError, AppResult};
