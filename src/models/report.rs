//! Ingest and Query Reports
//!
//! Result shapes returned by the engine entrypoints: the per-chunk
//! embedding report from ingestion and the answer payload from queries.

use serde::{Deserialize, Serialize};

/// Embedding outcome for a single chunk during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    /// The chunk was embedded and indexed
    Embedded,
    /// Embedding failed; the chunk text is stored without a vector
    Failed,
}

/// Per-chunk status entry within an `IngestReport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkStatus {
    /// Chunk identifier (`{document_id}:{sequence_no}`)
    pub chunk_id: String,
    /// Position of the chunk within the document
    pub sequence_no: usize,
    /// Whether the chunk was embedded
    pub status: EmbeddingStatus,
    /// Error message when status is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChunkStatus {
    /// Record a successfully embedded chunk
    pub fn embedded(chunk_id: impl Into<String>, sequence_no: usize) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            sequence_no,
            status: EmbeddingStatus::Embedded,
            error: None,
        }
    }

    /// Record a chunk whose embedding failed
    pub fn failed(
        chunk_id: impl Into<String>,
        sequence_no: usize,
        error: impl Into<String>,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            sequence_no,
            status: EmbeddingStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Summary of a single document ingestion.
///
/// Ingestion stores every chunk's text even when its embedding fails, so
/// `chunk_count == embedded_count + failed_count` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// The ingested document's id
    pub document_id: String,
    /// Total number of chunks produced
    pub chunk_count: usize,
    /// Number of chunks embedded and indexed
    pub embedded_count: usize,
    /// Number of chunks stored without an embedding
    pub failed_count: usize,
    /// Per-chunk outcomes, ordered by sequence number
    pub chunks: Vec<ChunkStatus>,
}

impl IngestReport {
    /// Build a report from per-chunk statuses
    pub fn new(document_id: impl Into<String>, chunks: Vec<ChunkStatus>) -> Self {
        let embedded_count = chunks
            .iter()
            .filter(|c| c.status == EmbeddingStatus::Embedded)
            .count();
        let failed_count = chunks.len() - embedded_count;

        Self {
            document_id: document_id.into(),
            chunk_count: chunks.len(),
            embedded_count,
            failed_count,
            chunks,
        }
    }

    /// Whether every chunk was embedded
    pub fn is_complete(&self) -> bool {
        self.failed_count == 0
    }
}

/// Answer payload returned by a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The synthesized answer text
    pub answer: String,
}

impl QueryResponse {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let report = IngestReport::new(
            "doc-1",
            vec![
                ChunkStatus::embedded("doc-1:0", 0),
                ChunkStatus::failed("doc-1:1", 1, "rate limited"),
                ChunkStatus::embedded("doc-1:2", 2),
            ],
        );

        assert_eq!(report.chunk_count, 3);
        assert_eq!(report.embedded_count, 2);
        assert_eq!(report.failed_count, 1);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_report_complete() {
        let report = IngestReport::new(
            "doc-1",
            vec![
                ChunkStatus::embedded("doc-1:0", 0),
                ChunkStatus::embedded("doc-1:1", 1),
            ],
        );
        assert!(report.is_complete());
        assert_eq!(report.chunk_count, report.embedded_count + report.failed_count);
    }

    #[test]
    fn test_report_empty() {
        let report = IngestReport::new("doc-1", vec![]);
        assert_eq!(report.chunk_count, 0);
        assert!(report.is_complete());
    }

    #[test]
    fn test_chunk_status_serialization() {
        let ok = ChunkStatus::embedded("doc-1:0", 0);
        let json = serde_json::to_string(&ok).unwrap();
        assert!(json.contains("\"status\":\"embedded\""));
        assert!(!json.contains("error"));

        let bad = ChunkStatus::failed("doc-1:1", 1, "boom");
        let json = serde_json::to_string(&bad).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"error\":\"boom\""));
    }

    #[test]
    fn test_query_response_shape() {
        let resp = QueryResponse::new("The sky is blue.");
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, "{\"answer\":\"The sky is blue.\"}");
    }
}
