//! SQLite Database
//!
//! Embedded database for persistent storage using rusqlite with r2d2 connection pooling.
//!
//! Holds two tables: `documents` (one row per ingested document) and `chunks`
//! (one row per chunk, with its embedding stored as a little-endian f32 BLOB).
//! Chunks reference documents with cascade delete, so removing a document
//! removes its chunks in the same statement.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::database_path;

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a database from an existing connection pool.
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create an in-memory database for testing.
    ///
    /// Uses an in-memory SQLite database with the same schema as the
    /// production database. Useful for integration and unit tests.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Create a new database instance with connection pooling
    pub fn new() -> AppResult<Self> {
        let db_path = database_path()?;

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::open(&db_path)
    }

    /// Open (or create) a database at an explicit path
    pub fn open(path: &std::path::Path) -> AppResult<Self> {
        // Foreign keys are per-connection in SQLite, so enable them on every
        // pooled connection via the manager's init hook.
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON"));
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;

        // Create documents table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                content_ref TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        // Index for owner-scoped document listings
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id)",
            [],
        )?;

        // Create chunks table.
        // `embedding` is NULL when the provider failed for that chunk; the text
        // is still stored so a later re-ingest can recover.
        // `vector_id` is a monotonically increasing counter assigned when the
        // embedding is indexed; it doubles as the ANN index id and as the
        // deterministic tie-break for equal similarity scores.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                sequence_no INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB,
                embedding_dimension INTEGER NOT NULL DEFAULT 0,
                vector_id INTEGER,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(document_id, sequence_no),
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            )",
            [],
        )?;

        // Indexes for chunk queries
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chunks_owner ON chunks(owner_id)",
            [],
        )?;

        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_chunks_vector_id
             ON chunks(vector_id) WHERE vector_id IS NOT NULL",
            [],
        )?;

        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Get the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Check if the database is healthy
    pub fn is_healthy(&self) -> bool {
        if let Ok(conn) = self.pool.get() {
            conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    // Tests will use an in-memory database
    use super::*;

    #[test]
    fn test_database_health() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.is_healthy());
    }

    #[test]
    fn test_documents_table_exists() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.get_connection().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='documents'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "documents table should exist");
    }

    #[test]
    fn test_chunks_table_exists() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.get_connection().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='chunks'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "chunks table should exist");
    }

    #[test]
    fn test_chunk_unique_sequence_constraint() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.get_connection().unwrap();

        conn.execute(
            "INSERT INTO documents (id, owner_id) VALUES ('doc-1', 'user-1')",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO chunks (id, document_id, owner_id, sequence_no, content)
             VALUES ('doc-1:0', 'doc-1', 'user-1', 0, 'first')",
            [],
        )
        .unwrap();

        // Same (document_id, sequence_no) should be rejected
        let result = conn.execute(
            "INSERT INTO chunks (id, document_id, owner_id, sequence_no, content)
             VALUES ('dup', 'doc-1', 'user-1', 0, 'duplicate')",
            [],
        );
        assert!(
            result.is_err(),
            "Duplicate (document_id, sequence_no) should be rejected"
        );
    }

    #[test]
    fn test_cascade_delete_removes_chunks() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.get_connection().unwrap();

        conn.execute(
            "INSERT INTO documents (id, owner_id) VALUES ('doc-1', 'user-1')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO chunks (id, document_id, owner_id, sequence_no, content)
             VALUES ('doc-1:0', 'doc-1', 'user-1', 0, 'text')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM documents WHERE id = 'doc-1'", [])
            .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0, "chunks should be removed with their document");
    }

    #[test]
    fn test_vector_id_unique_when_present() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.get_connection().unwrap();

        conn.execute(
            "INSERT INTO documents (id, owner_id) VALUES ('doc-1', 'user-1')",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO chunks (id, document_id, owner_id, sequence_no, content, vector_id)
             VALUES ('doc-1:0', 'doc-1', 'user-1', 0, 'a', 1)",
            [],
        )
        .unwrap();

        // NULL vector_ids may repeat
        conn.execute(
            "INSERT INTO chunks (id, document_id, owner_id, sequence_no, content)
             VALUES ('doc-1:1', 'doc-1', 'user-1', 1, 'b')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO chunks (id, document_id, owner_id, sequence_no, content)
             VALUES ('doc-1:2', 'doc-1', 'user-1', 2, 'c')",
            [],
        )
        .unwrap();

        // Duplicate non-NULL vector_id is rejected
        let result = conn.execute(
            "INSERT INTO chunks (id, document_id, owner_id, sequence_no, content, vector_id)
             VALUES ('doc-1:3', 'doc-1', 'user-1', 3, 'd', 1)",
            [],
        );
        assert!(result.is_err(), "Duplicate vector_id should be rejected");
    }

    #[test]
    fn test_open_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let db = Database::open(&path).unwrap();
        assert!(db.is_healthy());
        assert!(path.exists());
    }
}
