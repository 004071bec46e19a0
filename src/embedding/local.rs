//! Local embedding model, used when the hosted endpoint is unavailable.

use super::{normalize_l2, Embedder};
use crate::error::{ReplikkError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

/// Embedder running BGE-large on this machine.
///
/// The model produces the same 1024-dimensional space as the hosted
/// endpoint, so vectors from either backend are interchangeable.
pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    dimensions: usize,
}

impl LocalEmbedder {
    /// Load the model, downloading it into `cache_dir` on first use.
    pub async fn load(cache_dir: PathBuf, dimensions: usize) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        info!("Loading local embedding model from {}", cache_dir.display());

        let model = tokio::task::spawn_blocking(move || {
            let options =
                TextInitOptions::new(EmbeddingModel::BGELargeENV15).with_cache_dir(cache_dir);
            TextEmbedding::try_new(options)
        })
        .await
        .map_err(|e| ReplikkError::Embedding(format!("Model load task failed: {}", e)))?
        .map_err(|e| {
            ReplikkError::Embedding(format!("Failed to load local embedding model: {}", e))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ReplikkError::Embedding("Empty embedding result".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts locally", texts.len());

        let model = Arc::clone(&self.model);
        let batch: Vec<String> = texts.to_vec();
        let mut embeddings = tokio::task::spawn_blocking(
            move || -> std::result::Result<Vec<Vec<f32>>, String> {
                let mut model = model
                    .lock()
                    .map_err(|_| "embedding model lock poisoned".to_string())?;
                model.embed(batch, None).map_err(|e| e.to_string())
            },
        )
        .await
        .map_err(|e| ReplikkError::Embedding(format!("Embedding task failed: {}", e)))?
        .map_err(ReplikkError::Embedding)?;

        for embedding in &mut embeddings {
            if embedding.len() != self.dimensions {
                return Err(ReplikkError::Embedding(format!(
                    "Local model produced {}-dimensional vector, expected {}",
                    embedding.len(),
                    self.dimensions
                )));
            }
            normalize_l2(embedding);
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
