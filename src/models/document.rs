//! Document Models
//!
//! Data structures for ingested documents and their chunks.

use serde::{Deserialize, Serialize};

/// An ingested document owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier
    pub id: String,
    /// Owner (authenticated user) identifier
    pub owner_id: String,
    /// Optional reference to the original content (file path, URL)
    pub content_ref: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

impl Document {
    /// Create a new document with a generated id
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), owner_id)
    }

    /// Create a document with a caller-supplied id
    pub fn with_id(id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            content_ref: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Attach a content reference (file path, URL)
    pub fn with_content_ref(mut self, content_ref: impl Into<String>) -> Self {
        self.content_ref = Some(content_ref.into());
        self
    }
}

/// A contiguous slice of a document's text, with its embedding when available.
///
/// Chunk ids are deterministic: `{document_id}:{sequence_no}`. Re-ingesting
/// the same document therefore produces the same chunk ids, which lets the
/// vector store overwrite stale entries instead of accumulating duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier (`{document_id}:{sequence_no}`)
    pub id: String,
    /// The document this chunk belongs to
    pub document_id: String,
    /// Owner (denormalized from the document for scoped retrieval)
    pub owner_id: String,
    /// Position of this chunk within the document, starting at 0
    pub sequence_no: usize,
    /// The chunk text
    pub text: String,
    /// Embedding vector; `None` when embedding failed or is pending
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Create a chunk with a deterministic id derived from document and position
    pub fn new(
        document_id: impl Into<String>,
        owner_id: impl Into<String>,
        sequence_no: usize,
        text: impl Into<String>,
    ) -> Self {
        let document_id = document_id.into();
        Self {
            id: format!("{}:{}", document_id, sequence_no),
            document_id,
            owner_id: owner_id.into(),
            sequence_no,
            text: text.into(),
            embedding: None,
        }
    }

    /// Attach an embedding vector
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Whether this chunk has a stored embedding
    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_creation() {
        let doc = Document::new("user-1");
        assert_eq!(doc.owner_id, "user-1");
        assert!(!doc.id.is_empty());
        assert!(doc.content_ref.is_none());
        assert!(!doc.created_at.is_empty());
    }

    #[test]
    fn test_document_with_id() {
        let doc = Document::with_id("doc-42", "user-1");
        assert_eq!(doc.id, "doc-42");
        assert_eq!(doc.owner_id, "user-1");
    }

    #[test]
    fn test_document_content_ref() {
        let doc = Document::new("user-1").with_content_ref("/tmp/report.txt");
        assert_eq!(doc.content_ref.as_deref(), Some("/tmp/report.txt"));
    }

    #[test]
    fn test_document_ids_are_unique() {
        let a = Document::new("user-1");
        let b = Document::new("user-1");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_chunk_deterministic_id() {
        let chunk = Chunk::new("doc-1", "user-1", 3, "some text");
        assert_eq!(chunk.id, "doc-1:3");
        assert_eq!(chunk.sequence_no, 3);
        assert!(!chunk.is_embedded());
    }

    #[test]
    fn test_chunk_with_embedding() {
        let chunk = Chunk::new("doc-1", "user-1", 0, "text").with_embedding(vec![0.1, 0.2]);
        assert!(chunk.is_embedded());
        assert_eq!(chunk.embedding.unwrap().len(), 2);
    }

    #[test]
    fn test_chunk_same_input_same_id() {
        let a = Chunk::new("doc-1", "user-1", 0, "text");
        let b = Chunk::new("doc-1", "user-1", 0, "different text");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_document_serialization() {
        let doc = Document::with_id("doc-1", "user-1");
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"id\":\"doc-1\""));

        let parsed: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.owner_id, "user-1");
    }
}
