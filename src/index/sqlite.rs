//! SQLite-based vector index implementation.
//!
//! Similarity is computed in Rust over a namespace scan. This keeps the
//! storage layer dependency-free; datasets past a few hundred thousand
//! vectors would want sqlite-vec or a dedicated vector database.

use super::{cosine_similarity, IndexedMovie, QueryMatch, VectorIndex, VectorRecord};
use crate::error::{ReplikkError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS vectors (
    id TEXT NOT NULL,
    namespace TEXT NOT NULL,
    movie_title TEXT NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL,
    PRIMARY KEY (id, namespace)
);

CREATE INDEX IF NOT EXISTS idx_vectors_namespace ON vectors(namespace);
CREATE INDEX IF NOT EXISTS idx_vectors_movie ON vectors(namespace, movie_title);
"#;

/// SQLite-based vector index.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open or create the index at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReplikkError::Index(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert_batch(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize> {
        let conn = self.lock_conn()?;

        let tx = conn.unchecked_transaction()?;

        for record in records {
            let embedding_bytes = Self::embedding_to_bytes(&record.values);

            tx.execute(
                r#"
                INSERT OR REPLACE INTO vectors
                (id, namespace, movie_title, text, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    record.id,
                    namespace,
                    record.movie_title,
                    record.text,
                    embedding_bytes,
                    record.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        debug!("Batch upserted {} vectors", records.len());
        Ok(records.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn query(
        &self,
        namespace: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, movie_title, text, embedding FROM vectors WHERE namespace = ?1",
        )?;

        let rows = stmt.query_map(params![namespace], |row| {
            let id: String = row.get(0)?;
            let movie_title: String = row.get(1)?;
            let text: String = row.get(2)?;
            let embedding_bytes: Vec<u8> = row.get(3)?;
            Ok((id, movie_title, text, Self::bytes_to_embedding(&embedding_bytes)))
        })?;

        let mut matches: Vec<QueryMatch> = rows
            .filter_map(|r| r.ok())
            .map(|(id, movie_title, text, embedding)| QueryMatch {
                score: cosine_similarity(query_embedding, &embedding),
                id,
                movie_title,
                text,
            })
            .collect();

        // Sort by score descending
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        debug!("Found {} matches", matches.len());
        Ok(matches)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn existing_ids(&self, namespace: &str, ids: &[String]) -> Result<HashSet<String>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare("SELECT 1 FROM vectors WHERE namespace = ?1 AND id = ?2")?;

        let mut present = HashSet::new();
        for id in ids {
            if stmt.exists(params![namespace, id])? {
                present.insert(id.clone());
            }
        }

        Ok(present)
    }

    #[instrument(skip(self))]
    async fn delete_movie(&self, namespace: &str, movie_title: &str) -> Result<usize> {
        let conn = self.lock_conn()?;

        let deleted = conn.execute(
            "DELETE FROM vectors WHERE namespace = ?1 AND movie_title = ?2",
            params![namespace, movie_title],
        )?;

        info!("Deleted {} vectors for movie {}", deleted, movie_title);
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn list_movies(&self, namespace: &str) -> Result<Vec<IndexedMovie>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT movie_title, COUNT(*) as chunk_count, MAX(indexed_at) as indexed_at
            FROM vectors
            WHERE namespace = ?1
            GROUP BY movie_title
            ORDER BY indexed_at DESC
            "#,
        )?;

        let movies = stmt.query_map(params![namespace], |row| {
            let indexed_at_str: String = row.get(2)?;
            Ok(IndexedMovie {
                movie_title: row.get(0)?,
                chunk_count: row.get(1)?,
                indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        let result: Vec<IndexedMovie> = movies.filter_map(|m| m.ok()).collect();
        Ok(result)
    }

    async fn vector_count(&self, namespace: &str) -> Result<usize> {
        let conn = self.lock_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vectors WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, movie: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord::new(id.to_string(), values, format!("text for {}", id), movie.to_string())
    }

    #[tokio::test]
    async fn test_sqlite_index_upsert_query_delete() {
        let index = SqliteIndex::in_memory().unwrap();

        let records = vec![
            record("Heat_0", "Heat", vec![1.0, 0.0, 0.0]),
            record("Heat_1", "Heat", vec![0.0, 1.0, 0.0]),
        ];
        index.upsert_batch("movie_dialogues", &records).await.unwrap();

        let matches = index
            .query("movie_dialogues", &[1.0, 0.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "Heat_0");
        assert!((matches[0].score - 1.0).abs() < 0.001);

        let movies = index.list_movies("movie_dialogues").await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].chunk_count, 2);

        let deleted = index.delete_movie("movie_dialogues", "Heat").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(index.vector_count("movie_dialogues").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_index_namespace_isolation() {
        let index = SqliteIndex::in_memory().unwrap();

        index
            .upsert_batch("movie_dialogues", &[record("Heat_0", "Heat", vec![1.0, 0.0])])
            .await
            .unwrap();

        let matches = index.query("other", &[1.0, 0.0], 10).await.unwrap();
        assert!(matches.is_empty());
        assert_eq!(index.vector_count("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_index_existing_ids() {
        let index = SqliteIndex::in_memory().unwrap();

        index
            .upsert_batch("movie_dialogues", &[record("Heat_0", "Heat", vec![1.0, 0.0])])
            .await
            .unwrap();

        let candidates = vec!["Heat_0".to_string(), "Heat_1".to_string()];
        let present = index
            .existing_ids("movie_dialogues", &candidates)
            .await
            .unwrap();
        assert!(present.contains("Heat_0"));
        assert!(!present.contains("Heat_1"));
    }

    #[tokio::test]
    async fn test_sqlite_index_upsert_replaces() {
        let index = SqliteIndex::in_memory().unwrap();

        index
            .upsert_batch("movie_dialogues", &[record("Heat_0", "Heat", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert_batch("movie_dialogues", &[record("Heat_0", "Heat", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.vector_count("movie_dialogues").await.unwrap(), 1);
        let matches = index.query("movie_dialogues", &[0.0, 1.0], 1).await.unwrap();
        assert!((matches[0].score - 1.0).abs() < 0.001);
    }
}
