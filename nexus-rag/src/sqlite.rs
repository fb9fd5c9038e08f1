//! Persistent vector store backed by SQLite.
//!
//! This module is only available when the `sqlite` feature is enabled
//! (on by default).
//!
//! Every collection lives in one database file under the persist directory.
//! Embeddings are stored as little-endian `f32` BLOBs and search is an exact
//! cosine scan over the collection, which is adequate for the document
//! volumes a single-user knowledge base sees.
//!
//! rusqlite is synchronous, so every statement runs on tokio's blocking pool.
//! The calling task stays cancellable and a timeout around a store call can
//! fire even while SQLite is waiting on a lock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionInfo, VectorStore, cosine_similarity, rank};

const BACKEND: &str = "sqlite";

/// File name of the database inside the persist directory.
pub const DATABASE_FILE: &str = "vectors.sqlite3";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dimensions INTEGER NOT NULL,
    embedder TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    text TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    embedding BLOB NOT NULL,
    PRIMARY KEY (collection, id)
);
";

/// A [`VectorStore`] persisted in a SQLite database.
///
/// # Example
///
/// ```rust,ignore
/// use nexus_rag::{CollectionInfo, SqliteVectorStore};
///
/// let store = SqliteVectorStore::open("chroma_data")?;
/// let info = CollectionInfo::new(384, "ollama/all-minilm/384");
/// store.create_collection("darkg_docs", &info).await?;
/// ```
pub struct SqliteVectorStore {
    conn: Arc<Mutex<Connection>>,
}

fn unavailable(message: impl Into<String>) -> RagError {
    RagError::StoreUnavailable { backend: BACKEND.to_string(), message: message.into() }
}

fn sql(e: rusqlite::Error) -> RagError {
    unavailable(e.to_string())
}

impl SqliteVectorStore {
    /// Open (or create) the store under `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreUnavailable`] if the directory or database
    /// cannot be created or opened.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| unavailable(format!("cannot create {}: {e}", dir.display())))?;
        let path = dir.join(DATABASE_FILE);
        let conn = Connection::open(&path).map_err(sql)?;
        info!(path = %path.display(), "opened sqlite vector store");
        Self::init(conn)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreUnavailable`] if SQLite cannot be initialized.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(sql)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5)).map_err(sql)?;
        conn.execute_batch(SCHEMA).map_err(sql)?;
        // Databases written before collections recorded their embedder.
        if conn.prepare("SELECT embedder FROM collections LIMIT 0").is_err() {
            conn.execute_batch(
                "ALTER TABLE collections ADD COLUMN embedder TEXT NOT NULL DEFAULT ''",
            )
            .map_err(sql)?;
            info!("added embedder column to sqlite collections table");
        }
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard =
                conn.lock().map_err(|e| unavailable(format!("connection lock poisoned: {e}")))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| unavailable(format!("blocking task failed: {e}")))?
    }

    /// The dimensionality a collection was created with, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreUnavailable`] on database failure.
    pub async fn dimensions(&self, collection: &str) -> Result<Option<usize>> {
        Ok(self.describe_collection(collection).await?.map(|info| info.dimensions))
    }
}

fn collection_info(conn: &Connection, collection: &str) -> Result<Option<CollectionInfo>> {
    conn.query_row(
        "SELECT dimensions, embedder FROM collections WHERE name = ?1",
        params![collection],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )
    .optional()
    .map(|found| found.map(|(dims, embedder)| CollectionInfo::new(dims as usize, embedder)))
    .map_err(sql)
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect()
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_collection(&self, name: &str, info: &CollectionInfo) -> Result<()> {
        let name = name.to_string();
        let info = info.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO collections (name, dimensions, embedder)
                 VALUES (?1, ?2, ?3)",
                params![name, info.dimensions as i64, info.embedder],
            )
            .map_err(sql)?;
            Ok(())
        })
        .await
    }

    async fn describe_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let name = name.to_string();
        self.with_conn(move |conn| collection_info(conn, &name)).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        let removed = self
            .with_conn({
                let name = name.clone();
                move |conn| {
                    let tx = conn.transaction().map_err(sql)?;
                    let removed = tx
                        .execute("DELETE FROM records WHERE collection = ?1", params![name])
                        .map_err(sql)?;
                    tx.execute("DELETE FROM collections WHERE name = ?1", params![name])
                        .map_err(sql)?;
                    tx.commit().map_err(sql)?;
                    Ok(removed)
                }
            })
            .await?;
        debug!(collection = %name, removed, "dropped collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let collection = collection.to_string();
        let chunks = chunks.to_vec();
        self.with_conn(move |conn| {
            let dimensions = collection_info(conn, &collection)?
                .map(|info| info.dimensions)
                .ok_or_else(|| unavailable(format!("collection '{collection}' does not exist")))?;

            let tx = conn.transaction().map_err(sql)?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT OR REPLACE INTO records
                         (collection, id, document_id, text, metadata, embedding)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )
                    .map_err(sql)?;
                for chunk in &chunks {
                    if chunk.embedding.len() != dimensions {
                        return Err(unavailable(format!(
                            "chunk '{}' has {} dimensions, '{collection}' expects {dimensions}",
                            chunk.id,
                            chunk.embedding.len()
                        )));
                    }
                    let metadata = serde_json::to_string(&chunk.metadata)
                        .map_err(|e| unavailable(format!("cannot encode metadata: {e}")))?;
                    stmt.execute(params![
                        collection,
                        chunk.id,
                        chunk.document_id,
                        chunk.text,
                        metadata,
                        encode_embedding(&chunk.embedding),
                    ])
                    .map_err(sql)?;
                }
            }
            tx.commit().map_err(sql)?;
            Ok(())
        })
        .await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collection = collection.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM records WHERE collection = ?1",
                    params![collection],
                    |row| row.get(0),
                )
                .map_err(sql)?;
            Ok(count as usize)
        })
        .await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collection = collection.to_string();
        let query = embedding.to_vec();
        self.with_conn(move |conn| {
            if collection_info(conn, &collection)?.is_none() {
                return Err(unavailable(format!("collection '{collection}' does not exist")));
            }

            let mut stmt = conn
                .prepare(
                    "SELECT id, document_id, text, metadata, embedding
                     FROM records WHERE collection = ?1",
                )
                .map_err(sql)?;
            let rows = stmt
                .query_map(params![collection], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                    ))
                })
                .map_err(sql)?;

            let mut scored = Vec::new();
            for row in rows {
                let (id, document_id, text, metadata, blob) = row.map_err(sql)?;
                let metadata: HashMap<String, String> = serde_json::from_str(&metadata)
                    .map_err(|e| unavailable(format!("corrupt metadata for '{id}': {e}")))?;
                let chunk_embedding = decode_embedding(&blob);
                let score = cosine_similarity(&chunk_embedding, &query);
                scored.push(SearchResult {
                    chunk: Chunk { id, text, embedding: chunk_embedding, metadata, document_id },
                    score,
                });
            }

            Ok(rank(scored, top_k))
        })
        .await
    }

    fn backend(&self) -> &str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn info(dimensions: usize) -> CollectionInfo {
        CollectionInfo::new(dimensions, format!("hash-xxh64/{dimensions}/seed-0"))
    }

    fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), "file".to_string());
        Chunk {
            id: id.to_string(),
            text: format!("text of {id}"),
            embedding,
            metadata,
            document_id: "doc".to_string(),
        }
    }

    #[test]
    fn embedding_blob_preserves_values() {
        let v = vec![0.25, -1.5, 3.0e-7, f32::MAX];
        assert_eq!(decode_embedding(&encode_embedding(&v)), v);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.create_collection("c", &info(2)).await.unwrap();
        store.upsert("c", &[chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0])]).await.unwrap();
        store.upsert("c", &[chunk("a", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 2);

        let results = store.search("c", &[0.0, 1.0], 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[1].score - 1.0).abs() < 1e-6);
        assert_eq!(results[0].chunk.metadata.get("source").map(String::as_str), Some("file"));
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.create_collection("c", &info(2)).await.unwrap();
        store
            .upsert(
                "c",
                &[
                    chunk("far", vec![-1.0, 0.0]),
                    chunk("near", vec![1.0, 0.1]),
                    chunk("mid", vec![0.5, 0.5]),
                ],
            )
            .await
            .unwrap();
        let ids: Vec<String> = store
            .search("c", &[1.0, 0.0], 3)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.id)
            .collect();
        assert_eq!(ids, ["near", "mid", "far"]);
    }

    #[tokio::test]
    async fn delete_collection_removes_records() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.create_collection("c", &info(2)).await.unwrap();
        store.upsert("c", &[chunk("a", vec![1.0, 0.0])]).await.unwrap();
        store.delete_collection("c").await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 0);
        assert!(store.dimensions("c").await.unwrap().is_none());
        assert!(store.search("c", &[1.0, 0.0], 1).await.is_err());
        store.delete_collection("c").await.unwrap();
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_is_unavailable() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        let err = store.upsert("nope", &[chunk("a", vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::StoreUnavailable { .. }));
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimensions() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.create_collection("c", &info(3)).await.unwrap();
        assert!(store.upsert("c", &[chunk("a", vec![1.0, 0.0])]).await.is_err());
        assert_eq!(store.count("c").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteVectorStore::open(dir.path()).unwrap();
            store.create_collection("c", &info(2)).await.unwrap();
            store.upsert("c", &[chunk("a", vec![1.0, 0.0])]).await.unwrap();
        }
        let store = SqliteVectorStore::open(dir.path()).unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);
        assert_eq!(store.dimensions("c").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn embedder_identity_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteVectorStore::open(dir.path()).unwrap();
            store.create_collection("c", &info(2)).await.unwrap();
        }
        let store = SqliteVectorStore::open(dir.path()).unwrap();
        store.create_collection("c", &CollectionInfo::new(2, "ollama/other/2")).await.unwrap();
        assert_eq!(store.describe_collection("c").await.unwrap(), Some(info(2)));
        assert!(store.describe_collection("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn older_databases_gain_an_unknown_embedder() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE collections (name TEXT PRIMARY KEY, dimensions INTEGER NOT NULL);
             INSERT INTO collections (name, dimensions) VALUES ('c', 2);",
        )
        .unwrap();
        let store = SqliteVectorStore::init(conn).unwrap();
        assert_eq!(store.describe_collection("c").await.unwrap(), Some(CollectionInfo::new(2, "")));
    }

    #[tokio::test]
    async fn busy_connection_does_not_stall_the_runtime() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.create_collection("c", &info(2)).await.unwrap();

        let guard = store.conn.lock().unwrap();
        let waited = tokio::time::timeout(Duration::from_millis(100), store.count("c")).await;
        assert!(waited.is_err());
        drop(guard);

        assert_eq!(store.count("c").await.unwrap(), 0);
    }
}
