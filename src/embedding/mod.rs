//! Embedding generation.
//!
//! The primary backend calls a hosted inference endpoint; when it is
//! unreachable a local model takes over transparently. All backends return
//! L2-normalized vectors so similarity search can treat dot product and
//! cosine as the same thing.

mod fallback;
mod local;
mod remote;

pub use fallback::FallbackEmbedder;
pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;

use crate::config::{EmbeddingProvider, Settings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, one vector per input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Build the embedder configured in settings.
pub async fn create_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    match settings.embedding.provider {
        EmbeddingProvider::Remote => {
            let embedder = FallbackEmbedder::new(
                RemoteEmbedder::new(&settings.embedding),
                settings.model_cache_dir(),
                settings.embedding.dimensions as usize,
            );
            Ok(Arc::new(embedder))
        }
        EmbeddingProvider::Local => {
            let embedder = LocalEmbedder::load(
                settings.model_cache_dir(),
                settings.embedding.dimensions as usize,
            )
            .await?;
            Ok(Arc::new(embedder))
        }
    }
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_l2_unit_length() {
        let mut vector = vec![3.0, 4.0];
        normalize_l2(&mut vector);
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_l2_zero_vector_unchanged() {
        let mut vector = vec![0.0, 0.0, 0.0];
        normalize_l2(&mut vector);
        assert_eq!(vector, vec![0.0, 0.0, 0.0]);
    }
}
