//! Cached dialogue retrieval.
//!
//! The service front-ends the embedding and index layers with the TTL cache:
//! validate the query, serve a fresh cached result when one exists, otherwise
//! embed, query the index, and cache the outcome for the next caller.

use crate::cache::{search_context_key, ResponseCache};
use crate::embedding::Embedder;
use crate::error::{ReplikkError, Result};
use crate::index::{QueryMatch, VectorIndex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Where a retrieval result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    Cache,
    Live,
}

/// Outcome of a retrieval request: ordered matches plus their provenance.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub matches: Vec<QueryMatch>,
    pub source: RetrievalSource,
}

impl Retrieved {
    /// The best match, when there is one.
    pub fn top(&self) -> Option<&QueryMatch> {
        self.matches.first()
    }
}

/// Retrieval pipeline: cache -> embed -> index query.
pub struct RetrievalService {
    cache: Arc<ResponseCache>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    namespace: String,
    search_ttl: Duration,
}

impl RetrievalService {
    pub fn new(
        cache: Arc<ResponseCache>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        namespace: String,
        search_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            embedder,
            index,
            namespace,
            search_ttl,
        }
    }

    /// Retrieve the dialogue chunks closest to `query`.
    ///
    /// Empty queries are rejected before any embedding or index work. Results
    /// are cached under the exact query string, empty match sets included.
    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Retrieved> {
        if query.trim().is_empty() {
            return Err(ReplikkError::InvalidRequest(
                "search_query must not be empty".to_string(),
            ));
        }

        let key = search_context_key(query);
        if let Some(matches) = self.cache.get::<Vec<QueryMatch>>(&key) {
            debug!("Serving {} matches from cache", matches.len());
            return Ok(Retrieved {
                matches,
                source: RetrievalSource::Cache,
            });
        }

        let query_embedding = self.embedder.embed(query).await?;
        let matches = self
            .index
            .query(&self.namespace, &query_embedding, top_k)
            .await?;

        info!("Retrieved {} matches live", matches.len());

        // Cache write happens off the request path; failures are logged
        // inside put and never reach the caller.
        let cache = Arc::clone(&self.cache);
        let cached_matches = matches.clone();
        let ttl = self.search_ttl;
        tokio::spawn(async move {
            cache.put(&key, &cached_matches, ttl);
        });

        Ok(Retrieved {
            matches,
            source: RetrievalSource::Live,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexedMovie, MemoryIndex, VectorRecord};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct CountingIndex {
        inner: MemoryIndex,
        query_calls: AtomicUsize,
    }

    impl CountingIndex {
        fn new(inner: MemoryIndex) -> Self {
            Self {
                inner,
                query_calls: AtomicUsize::new(0),
            }
        }

        fn query_count(&self) -> usize {
            self.query_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VectorIndex for CountingIndex {
        async fn upsert_batch(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize> {
            self.inner.upsert_batch(namespace, records).await
        }

        async fn query(
            &self,
            namespace: &str,
            query_embedding: &[f32],
            top_k: usize,
        ) -> Result<Vec<QueryMatch>> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.query(namespace, query_embedding, top_k).await
        }

        async fn existing_ids(&self, namespace: &str, ids: &[String]) -> Result<HashSet<String>> {
            self.inner.existing_ids(namespace, ids).await
        }

        async fn delete_movie(&self, namespace: &str, movie_title: &str) -> Result<usize> {
            self.inner.delete_movie(namespace, movie_title).await
        }

        async fn list_movies(&self, namespace: &str) -> Result<Vec<IndexedMovie>> {
            self.inner.list_movies(namespace).await
        }

        async fn vector_count(&self, namespace: &str) -> Result<usize> {
            self.inner.vector_count(namespace).await
        }
    }

    async fn service_with_data() -> (
        RetrievalService,
        Arc<CountingEmbedder>,
        Arc<CountingIndex>,
        Arc<ResponseCache>,
    ) {
        let index = MemoryIndex::new();
        index
            .upsert_batch(
                "movie_dialogues",
                &[VectorRecord::new(
                    "Heat_0".to_string(),
                    vec![1.0, 0.0],
                    "I do what I do best".to_string(),
                    "Heat".to_string(),
                )],
            )
            .await
            .unwrap();

        let cache = Arc::new(ResponseCache::new());
        let embedder = Arc::new(CountingEmbedder::default());
        let counting_index = Arc::new(CountingIndex::new(index));

        let service = RetrievalService::new(
            Arc::clone(&cache),
            embedder.clone() as Arc<dyn Embedder>,
            counting_index.clone() as Arc<dyn VectorIndex>,
            "movie_dialogues".to_string(),
            Duration::from_secs(3600),
        );

        (service, embedder, counting_index, cache)
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_any_work() {
        let (service, embedder, index, _cache) = service_with_data().await;

        let result = service.search("", 5).await;
        assert!(matches!(result, Err(ReplikkError::InvalidRequest(_))));

        let result = service.search("   ", 5).await;
        assert!(matches!(result, Err(ReplikkError::InvalidRequest(_))));

        assert_eq!(embedder.call_count(), 0);
        assert_eq!(index.query_count(), 0);
    }

    #[tokio::test]
    async fn test_cold_cache_goes_live_and_caches() {
        let (service, embedder, index, cache) = service_with_data().await;

        let retrieved = service.search("I hate", 5).await.unwrap();
        assert_eq!(retrieved.source, RetrievalSource::Live);
        assert_eq!(retrieved.matches.len(), 1);
        assert_eq!(retrieved.matches[0].movie_title, "Heat");
        assert_eq!(embedder.call_count(), 1);
        assert_eq!(index.query_count(), 1);

        // Let the spawned cache write land.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let cached: Option<Vec<QueryMatch>> = cache.get(&search_context_key("I hate"));
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_repeat_query_served_from_cache() {
        let (service, embedder, index, _cache) = service_with_data().await;

        let first = service.search("I hate", 5).await.unwrap();
        assert_eq!(first.source, RetrievalSource::Live);

        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = service.search("I hate", 5).await.unwrap();
        assert_eq!(second.source, RetrievalSource::Cache);
        assert_eq!(second.matches.len(), first.matches.len());

        // No further embedding or index work for the repeat.
        assert_eq!(embedder.call_count(), 1);
        assert_eq!(index.query_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_match_set_is_cached() {
        let cache = Arc::new(ResponseCache::new());
        let embedder = Arc::new(CountingEmbedder::default());
        let index = Arc::new(CountingIndex::new(MemoryIndex::new()));

        let service = RetrievalService::new(
            Arc::clone(&cache),
            embedder.clone() as Arc<dyn Embedder>,
            index.clone() as Arc<dyn VectorIndex>,
            "movie_dialogues".to_string(),
            Duration::from_secs(3600),
        );

        let retrieved = service.search("anything", 5).await.unwrap();
        assert_eq!(retrieved.source, RetrievalSource::Live);
        assert!(retrieved.matches.is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = service.search("anything", 5).await.unwrap();
        assert_eq!(second.source, RetrievalSource::Cache);
        assert_eq!(embedder.call_count(), 1);
    }
}
