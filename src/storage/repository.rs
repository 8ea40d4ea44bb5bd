//! Document and Chunk Repositories
//!
//! Trait-based storage seam over the SQLite database. The engine and vector
//! store talk to `DocumentRepository` / `ChunkRepository` rather than SQL, so
//! tests can swap in alternative backends.
//!
//! Embeddings are stored inline on the chunk row as little-endian f32 BLOBs.
//! Indexed chunks additionally carry a `vector_id`: a monotonically increasing
//! counter allocated when the embedding is stored. Vector ids are never
//! reused; re-embedding a chunk allocates a fresh id so the ANN index can
//! retire the old one.

use rusqlite::params;

use crate::models::{Chunk, Document};
use crate::storage::database::Database;
use crate::utils::error::{AppError, AppResult};
use crate::utils::vectors::{bytes_to_embedding, embedding_to_bytes};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Raw chunk row from the database, including its vector id.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub id: String,
    pub document_id: String,
    pub owner_id: String,
    pub sequence_no: i64,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub vector_id: Option<i64>,
}

impl ChunkRow {
    /// Convert into the domain model, dropping storage-only fields.
    pub fn into_chunk(self) -> Chunk {
        Chunk {
            id: self.id,
            document_id: self.document_id,
            owner_id: self.owner_id,
            sequence_no: self.sequence_no as usize,
            text: self.text,
            embedding: self.embedding,
        }
    }
}

// ---------------------------------------------------------------------------
// Repository traits
// ---------------------------------------------------------------------------

/// Storage operations for documents.
pub trait DocumentRepository: Send + Sync {
    /// Insert a document, or update its owner and content ref if it exists.
    fn upsert_document(&self, document: &Document) -> AppResult<()>;

    /// Fetch a document by id.
    fn get_document(&self, id: &str) -> AppResult<Option<Document>>;

    /// List all documents belonging to an owner, most recent first.
    fn list_documents(&self, owner_id: &str) -> AppResult<Vec<Document>>;

    /// Delete a document and (via cascade) all of its chunks.
    ///
    /// Returns `true` if a document was deleted.
    fn delete_document(&self, id: &str) -> AppResult<bool>;
}

/// Storage operations for chunks and their embeddings.
pub trait ChunkRepository: Send + Sync {
    /// Replace all chunks of a document with a new set, atomically.
    ///
    /// Embeddings in the input are ignored; rows are created with NULL
    /// embeddings and populated later via `store_embedding`.
    fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> AppResult<()>;

    /// Store an embedding for a chunk and allocate a fresh vector id.
    ///
    /// Returns the newly allocated vector id. Fails with `NotFound` if the
    /// chunk does not exist.
    fn store_embedding(&self, chunk_id: &str, embedding: &[f32]) -> AppResult<i64>;

    /// Return the current vector id of a chunk, if it has been indexed.
    fn vector_id_of(&self, chunk_id: &str) -> AppResult<Option<i64>>;

    /// Fetch a single chunk row by id.
    fn get_chunk(&self, id: &str) -> AppResult<Option<ChunkRow>>;

    /// Fetch chunk rows by id, preserving the order of `ids`.
    /// Missing ids are skipped.
    fn get_chunks_by_ids(&self, ids: &[String]) -> AppResult<Vec<ChunkRow>>;

    /// All chunks of a document, ordered by sequence number.
    fn chunks_for_document(&self, document_id: &str) -> AppResult<Vec<ChunkRow>>;

    /// All embedded chunks of an owner, ordered by vector id ascending
    /// (insertion order).
    fn embedded_chunks_for_owner(&self, owner_id: &str) -> AppResult<Vec<ChunkRow>>;

    /// All embedded chunks across owners, ordered by vector id ascending.
    /// Used to rebuild the ANN index from persistent storage.
    fn all_embedded_chunks(&self) -> AppResult<Vec<ChunkRow>>;

    /// Resolve a vector id back to its chunk row.
    fn chunk_by_vector_id(&self, vector_id: i64) -> AppResult<Option<ChunkRow>>;

    /// Vector ids currently assigned to a document's chunks.
    fn vector_ids_for_document(&self, document_id: &str) -> AppResult<Vec<i64>>;
}

// ---------------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of both repository traits.
#[derive(Clone)]
pub struct SqliteRepository {
    db: Database,
}

impl SqliteRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRow> {
        let embedding: Option<Vec<u8>> = row.get(5)?;
        Ok(ChunkRow {
            id: row.get(0)?,
            document_id: row.get(1)?,
            owner_id: row.get(2)?,
            sequence_no: row.get(3)?,
            text: row.get(4)?,
            embedding: embedding.map(|b| bytes_to_embedding(&b)),
            vector_id: row.get(6)?,
        })
    }

    const CHUNK_COLUMNS: &'static str =
        "id, document_id, owner_id, sequence_no, content, embedding, vector_id";
}

impl DocumentRepository for SqliteRepository {
    fn upsert_document(&self, document: &Document) -> AppResult<()> {
        let conn = self.db.get_connection()?;
        conn.execute(
            "INSERT INTO documents (id, owner_id, content_ref, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET owner_id = ?2, content_ref = ?3",
            params![
                document.id,
                document.owner_id,
                document.content_ref,
                document.created_at
            ],
        )?;
        Ok(())
    }

    fn get_document(&self, id: &str) -> AppResult<Option<Document>> {
        let conn = self.db.get_connection()?;
        let result = conn.query_row(
            "SELECT id, owner_id, content_ref, created_at FROM documents WHERE id = ?1",
            params![id],
            |row| {
                Ok(Document {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    content_ref: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        );

        match result {
            Ok(doc) => Ok(Some(doc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    fn list_documents(&self, owner_id: &str) -> AppResult<Vec<Document>> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, content_ref, created_at FROM documents
             WHERE owner_id = ?1 ORDER BY created_at DESC, id",
        )?;
        let rows = stmt
            .query_map(params![owner_id], |row| {
                Ok(Document {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    content_ref: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    fn delete_document(&self, id: &str) -> AppResult<bool> {
        let conn = self.db.get_connection()?;
        let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

impl ChunkRepository for SqliteRepository {
    fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> AppResult<()> {
        let mut conn = self.db.get_connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::database(e.to_string()))?;

        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document_id],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (id, document_id, owner_id, sequence_no, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.id,
                    chunk.document_id,
                    chunk.owner_id,
                    chunk.sequence_no as i64,
                    chunk.text
                ])?;
            }
        }

        tx.commit().map_err(|e| AppError::database(e.to_string()))?;
        Ok(())
    }

    fn store_embedding(&self, chunk_id: &str, embedding: &[f32]) -> AppResult<i64> {
        let conn = self.db.get_connection()?;
        let bytes = embedding_to_bytes(embedding);

        // The MAX subquery reads pre-update state, so the new id is strictly
        // greater than every id ever allocated (deleted rows excepted, which
        // is fine: ids only need to be unique and increasing).
        let updated = conn.execute(
            "UPDATE chunks
             SET embedding = ?2,
                 embedding_dimension = ?3,
                 vector_id = (SELECT COALESCE(MAX(vector_id), 0) + 1 FROM chunks)
             WHERE id = ?1",
            params![chunk_id, bytes, embedding.len() as i64],
        )?;

        if updated == 0 {
            return Err(AppError::not_found(format!("chunk '{}'", chunk_id)));
        }

        let vector_id: i64 = conn.query_row(
            "SELECT vector_id FROM chunks WHERE id = ?1",
            params![chunk_id],
            |row| row.get(0),
        )?;
        Ok(vector_id)
    }

    fn vector_id_of(&self, chunk_id: &str) -> AppResult<Option<i64>> {
        let conn = self.db.get_connection()?;
        let result = conn.query_row(
            "SELECT vector_id FROM chunks WHERE id = ?1",
            params![chunk_id],
            |row| row.get::<_, Option<i64>>(0),
        );

        match result {
            Ok(vector_id) => Ok(vector_id),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    fn get_chunk(&self, id: &str) -> AppResult<Option<ChunkRow>> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {} FROM chunks WHERE id = ?1",
            Self::CHUNK_COLUMNS
        );
        let result = conn.query_row(&sql, params![id], Self::row_to_chunk);

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    fn get_chunks_by_ids(&self, ids: &[String]) -> AppResult<Vec<ChunkRow>> {
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = self.get_chunk(id)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn chunks_for_document(&self, document_id: &str) -> AppResult<Vec<ChunkRow>> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {} FROM chunks WHERE document_id = ?1 ORDER BY sequence_no",
            Self::CHUNK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![document_id], Self::row_to_chunk)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    fn embedded_chunks_for_owner(&self, owner_id: &str) -> AppResult<Vec<ChunkRow>> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {} FROM chunks
             WHERE owner_id = ?1 AND embedding IS NOT NULL
             ORDER BY vector_id",
            Self::CHUNK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![owner_id], Self::row_to_chunk)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    fn all_embedded_chunks(&self) -> AppResult<Vec<ChunkRow>> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {} FROM chunks WHERE embedding IS NOT NULL ORDER BY vector_id",
            Self::CHUNK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::row_to_chunk)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    fn chunk_by_vector_id(&self, vector_id: i64) -> AppResult<Option<ChunkRow>> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {} FROM chunks WHERE vector_id = ?1",
            Self::CHUNK_COLUMNS
        );
        let result = conn.query_row(&sql, params![vector_id], Self::row_to_chunk);

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    fn vector_ids_for_document(&self, document_id: &str) -> AppResult<Vec<i64>> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT vector_id FROM chunks
             WHERE document_id = ?1 AND vector_id IS NOT NULL",
        )?;
        let ids = stmt
            .query_map(params![document_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
