//! Vector index abstraction.
//!
//! Provides a trait-based interface for namespaced vector storage backends.

mod memory;
mod sqlite;

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

use crate::config::Settings;
use crate::error::{ReplikkError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A vector stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Chunk id, stable across re-ingestion.
    pub id: String,
    /// Embedding vector.
    pub values: Vec<f32>,
    /// Text content of the chunk.
    pub text: String,
    /// Movie the chunk came from.
    pub movie_title: String,
    /// When this record was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl VectorRecord {
    pub fn new(id: String, values: Vec<f32>, text: String, movie_title: String) -> Self {
        Self {
            id,
            values,
            text,
            movie_title,
            indexed_at: Utc::now(),
        }
    }
}

/// A query result with score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Chunk id of the match.
    pub id: String,
    /// Similarity score (higher is better).
    pub score: f32,
    /// Movie the matched chunk came from.
    pub movie_title: String,
    /// Text content of the matched chunk.
    pub text: String,
}

/// Summary information about an indexed movie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedMovie {
    pub movie_title: String,
    pub chunk_count: u32,
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector index implementations.
///
/// Every operation takes a namespace; records in different namespaces never
/// see each other.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Bulk upsert records, replacing any with the same id.
    async fn upsert_batch(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize>;

    /// Find the most similar records, best first.
    async fn query(
        &self,
        namespace: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>>;

    /// Which of the candidate ids are already indexed.
    async fn existing_ids(&self, namespace: &str, ids: &[String]) -> Result<HashSet<String>>;

    /// Delete all records for a movie. Returns the number removed.
    async fn delete_movie(&self, namespace: &str, movie_title: &str) -> Result<usize>;

    /// List all indexed movies.
    async fn list_movies(&self, namespace: &str) -> Result<Vec<IndexedMovie>>;

    /// Total record count in a namespace.
    async fn vector_count(&self, namespace: &str) -> Result<usize>;
}

/// Create the vector index configured in settings.
pub fn create_index(settings: &Settings) -> Result<Arc<dyn VectorIndex>> {
    match settings.index.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteIndex::new(&settings.index_path())?)),
        "memory" => Ok(Arc::new(MemoryIndex::new())),
        other => Err(ReplikkError::Config(format!(
            "Unknown index provider: {}",
            other
        ))),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
