//! SQLite vector store addressed by file path
//!
//! Records survive restarts. Vectors are stored as little-endian `f32` blobs and
//! searched by brute-force scan.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::VectorStore;
use crate::types::{Chunk, EmbeddedChunk, ScoredRecord, StoredRecord};

use super::{check_dimension, top_k};

const DIMENSION_KEY: &str = "dimension";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed vector store
#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVectorStore {
    /// Create or open the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| Error::store(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::store(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
        "#,
        )?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                source_id TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,
                vector BLOB NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_source_id ON records(source_id);

            CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )?;

        Ok(())
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            op(&mut guard)
        })
        .await
        .map_err(|e| Error::store(format!("Store task failed: {}", e)))?
    }

    /// Like `with_conn`, but gives up waiting for the connection at `deadline`
    /// and bounds SQLite lock waits by the time remaining
    async fn with_conn_until<T, F>(&self, deadline: Instant, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.try_lock_until(deadline).ok_or_else(missed_deadline)?;
            guard.busy_timeout(deadline.saturating_duration_since(Instant::now()))?;
            let result = op(&mut guard);
            guard.busy_timeout(BUSY_TIMEOUT)?;
            result
        })
        .await
        .map_err(|e| Error::store(format!("Store task failed: {}", e)))?
    }
}

fn missed_deadline() -> Error {
    tracing::error!("TIMEOUT: store add missed its deadline, write rolled back");
    Error::store("store add timed out; write rolled back")
}

fn stored_dimension(conn: &Connection) -> Result<Option<usize>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = ?1",
            params![DIMENSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|v| {
            v.parse::<usize>()
                .map_err(|e| Error::store(format!("Corrupt dimension entry '{}': {}", v, e)))
        })
        .transpose()
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Insert in one transaction; past `deadline` the transaction is dropped uncommitted
fn insert_all(
    conn: &mut Connection,
    records: &[StoredRecord],
    deadline: Option<Instant>,
) -> Result<()> {
    let tx = conn.transaction()?;

    let mut expected = stored_dimension(&tx)?;
    for record in records {
        if record.vector.is_empty() {
            return Err(Error::store("Cannot store an empty vector"));
        }
        check_dimension(expected, record.vector.len())?;
        expected = Some(record.vector.len());
    }

    if let Some(dim) = expected {
        tx.execute(
            "INSERT OR IGNORE INTO store_meta (key, value) VALUES (?1, ?2)",
            params![DIMENSION_KEY, dim.to_string()],
        )?;
    }

    {
        let mut stmt = tx.prepare(
            r#"INSERT INTO records (id, source_id, start_offset, text, metadata, vector, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        )?;
        let now = chrono::Utc::now().to_rfc3339();

        for record in records {
            let metadata = serde_json::to_string(&record.chunk.extra_metadata)
                .map_err(|e| Error::store(format!("Failed to encode metadata: {}", e)))?;
            stmt.execute(params![
                record.id.to_string(),
                record.chunk.source_id,
                record.chunk.start_offset as i64,
                record.chunk.text,
                metadata,
                encode_vector(&record.vector),
                now,
            ])?;
        }
    }

    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        return Err(missed_deadline());
    }

    tx.commit()?;
    Ok(())
}

fn load_all(conn: &Connection) -> Result<Vec<StoredRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, source_id, start_offset, text, metadata, vector FROM records ORDER BY seq",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Vec<u8>>(5)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, source_id, start_offset, text, metadata, vector) = row?;
        let id = Uuid::parse_str(&id)
            .map_err(|e| Error::store(format!("Corrupt record id '{}': {}", id, e)))?;
        let extra_metadata: BTreeMap<String, String> = serde_json::from_str(&metadata)
            .map_err(|e| Error::store(format!("Corrupt metadata for {}: {}", id, e)))?;

        records.push(StoredRecord {
            id,
            chunk: Chunk {
                text,
                start_offset: start_offset as usize,
                source_id,
                extra_metadata,
            },
            vector: decode_vector(&vector),
        });
    }
    Ok(records)
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add(&self, records: Vec<EmbeddedChunk>) -> Result<Vec<StoredRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let assigned: Vec<StoredRecord> = records.into_iter().map(StoredRecord::assign).collect();
        self.with_conn(move |conn| {
            insert_all(conn, &assigned, None)?;
            tracing::debug!("Stored {} records", assigned.len());
            Ok(assigned)
        })
        .await
    }

    async fn add_by(
        &self,
        records: Vec<EmbeddedChunk>,
        deadline: Instant,
    ) -> Result<Vec<StoredRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let assigned: Vec<StoredRecord> = records.into_iter().map(StoredRecord::assign).collect();
        self.with_conn_until(deadline, move |conn| {
            insert_all(conn, &assigned, Some(deadline))?;
            tracing::debug!("Stored {} records", assigned.len());
            Ok(assigned)
        })
        .await
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = query.to_vec();
        self.with_conn(move |conn| {
            if let Some(dim) = stored_dimension(conn)? {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
                if count > 0 {
                    check_dimension(Some(dim), query.len())?;
                }
            }
            let records = load_all(conn)?;
            Ok(top_k(records, &query, k))
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch("DELETE FROM records; DELETE FROM store_meta;")?;
            Ok(())
        })
        .await
    }

    async fn len(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedded(text: &str, offset: usize, vector: Vec<f32>) -> EmbeddedChunk {
        let mut chunk = Chunk::new(text, offset, "guide.txt");
        chunk.merge_metadata(&BTreeMap::from([(
            "filename".to_string(),
            "guide.txt".to_string(),
        )]));
        EmbeddedChunk::new(chunk, vector)
    }

    #[tokio::test]
    async fn test_add_search_roundtrips_chunk() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .add(vec![
                embedded("alpha", 0, vec![1.0, 0.0, 0.0]),
                embedded("beta", 5, vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[0.0, 0.9, 0.1], 2).await.unwrap();
        assert_eq!(results.len(), 2);

        let best = &results[0].record;
        assert_eq!(best.chunk.text, "beta");
        assert_eq!(best.chunk.start_offset, 5);
        assert_eq!(best.chunk.extra_metadata["filename"], "guide.txt");
        assert_eq!(best.vector, vec![0.0, 1.0, 0.0]);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rolls_back() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.add(vec![embedded("a", 0, vec![1.0, 0.0])]).await.unwrap();

        let err = store
            .add(vec![embedded("b", 0, vec![1.0, 0.0]), embedded("c", 0, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreFailure(_)));
        assert_eq!(store.len().await.unwrap(), 1);

        let err = store.search(&[1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, Error::StoreFailure(_)));
    }

    #[tokio::test]
    async fn test_clear_resets_dimension() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.add(vec![embedded("a", 0, vec![1.0, 0.0])]).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.is_empty().await.unwrap());
        store.add(vec![embedded("b", 0, vec![1.0, 0.0, 0.0])]).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.sqlite3");

        {
            let store = SqliteVectorStore::open(&path).unwrap();
            store.add(vec![embedded("kept", 0, vec![0.5, 0.5])]).await.unwrap();
        }

        let reopened = SqliteVectorStore::open(&path).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
        let results = reopened.search(&[0.5, 0.5], 1).await.unwrap();
        assert_eq!(results[0].record.chunk.text, "kept");
    }

    #[tokio::test]
    async fn test_late_write_is_rolled_back() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.add(vec![embedded("kept", 0, vec![1.0, 0.0])]).await.unwrap();

        let batch = (0..50)
            .map(|i| embedded("late", i * 10, vec![0.0, 1.0]))
            .collect();
        let err = store.add_by(batch, Instant::now()).await.unwrap_err();

        assert!(matches!(err, Error::StoreFailure(ref msg) if msg.contains("timed out")));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_write_within_deadline_commits() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let deadline = Instant::now() + Duration::from_secs(30);

        let stored = store
            .add_by(vec![embedded("a", 0, vec![1.0, 0.0])], deadline)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[test]
    fn test_vector_blob_encoding() {
        let vector = vec![1.5f32, -0.25, 0.0];
        assert_eq!(decode_vector(&encode_vector(&vector)), vector);
    }
}
