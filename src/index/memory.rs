//! In-memory vector index implementation.
//!
//! Useful for testing and small datasets.

use super::{cosine_similarity, IndexedMovie, QueryMatch, VectorIndex, VectorRecord};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// In-memory vector index, namespace -> id -> record.
pub struct MemoryIndex {
    namespaces: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert_batch(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut namespaces = self.namespaces.write().unwrap();
        let store = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(
        &self,
        namespace: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let namespaces = self.namespaces.read().unwrap();
        let Some(store) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<QueryMatch> = store
            .values()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: cosine_similarity(query_embedding, &record.values),
                movie_title: record.movie_title.clone(),
                text: record.text.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn existing_ids(&self, namespace: &str, ids: &[String]) -> Result<HashSet<String>> {
        let namespaces = self.namespaces.read().unwrap();
        let Some(store) = namespaces.get(namespace) else {
            return Ok(HashSet::new());
        };

        Ok(ids
            .iter()
            .filter(|id| store.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn delete_movie(&self, namespace: &str, movie_title: &str) -> Result<usize> {
        let mut namespaces = self.namespaces.write().unwrap();
        let Some(store) = namespaces.get_mut(namespace) else {
            return Ok(0);
        };

        let initial_len = store.len();
        store.retain(|_, record| record.movie_title != movie_title);
        Ok(initial_len - store.len())
    }

    async fn list_movies(&self, namespace: &str) -> Result<Vec<IndexedMovie>> {
        let namespaces = self.namespaces.read().unwrap();
        let Some(store) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut movie_map: HashMap<String, IndexedMovie> = HashMap::new();
        for record in store.values() {
            let entry = movie_map
                .entry(record.movie_title.clone())
                .or_insert_with(|| IndexedMovie {
                    movie_title: record.movie_title.clone(),
                    chunk_count: 0,
                    indexed_at: record.indexed_at,
                });

            entry.chunk_count += 1;
            if record.indexed_at > entry.indexed_at {
                entry.indexed_at = record.indexed_at;
            }
        }

        let mut movies: Vec<IndexedMovie> = movie_map.into_values().collect();
        movies.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));

        Ok(movies)
    }

    async fn vector_count(&self, namespace: &str) -> Result<usize> {
        let namespaces = self.namespaces.read().unwrap();
        Ok(namespaces.get(namespace).map_or(0, |store| store.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, movie: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord::new(id.to_string(), values, format!("text for {}", id), movie.to_string())
    }

    #[tokio::test]
    async fn test_memory_index_query_ordering() {
        let index = MemoryIndex::new();

        let records = vec![
            record("Heat_0", "Heat", vec![1.0, 0.0, 0.0]),
            record("Heat_1", "Heat", vec![0.7, 0.7, 0.0]),
            record("Alien_0", "Alien", vec![0.0, 1.0, 0.0]),
        ];
        index.upsert_batch("movie_dialogues", &records).await.unwrap();

        let matches = index
            .query("movie_dialogues", &[1.0, 0.0, 0.0], 2)
            .await
            .unwrap();

        // Never more than top_k, scores non-increasing.
        assert_eq!(matches.len(), 2);
        assert!(matches[0].score >= matches[1].score);
        assert_eq!(matches[0].id, "Heat_0");
    }

    #[tokio::test]
    async fn test_memory_index_delete_movie() {
        let index = MemoryIndex::new();

        index
            .upsert_batch(
                "movie_dialogues",
                &[
                    record("Heat_0", "Heat", vec![1.0, 0.0]),
                    record("Alien_0", "Alien", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let deleted = index.delete_movie("movie_dialogues", "Heat").await.unwrap();
        assert_eq!(deleted, 1);

        let movies = index.list_movies("movie_dialogues").await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].movie_title, "Alien");
    }

    #[tokio::test]
    async fn test_memory_index_unknown_namespace() {
        let index = MemoryIndex::new();
        assert!(index.query("nope", &[1.0], 5).await.unwrap().is_empty());
        assert_eq!(index.vector_count("nope").await.unwrap(), 0);
    }
}
