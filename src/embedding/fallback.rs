//! Remote-first embedder with a transparent local fallback.

use super::{Embedder, LocalEmbedder, RemoteEmbedder};
use crate::error::{ReplikkError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::warn;

/// Tries the hosted endpoint first and falls back to the local model.
///
/// The local model is loaded lazily on the first remote failure and reused
/// afterwards. Callers only see an error when both backends fail.
pub struct FallbackEmbedder {
    remote: RemoteEmbedder,
    local: OnceCell<LocalEmbedder>,
    model_cache_dir: PathBuf,
    dimensions: usize,
}

impl FallbackEmbedder {
    pub fn new(remote: RemoteEmbedder, model_cache_dir: PathBuf, dimensions: usize) -> Self {
        Self {
            remote,
            local: OnceCell::new(),
            model_cache_dir,
            dimensions,
        }
    }

    async fn local(&self) -> Result<&LocalEmbedder> {
        self.local
            .get_or_try_init(|| LocalEmbedder::load(self.model_cache_dir.clone(), self.dimensions))
            .await
    }
}

#[async_trait]
impl Embedder for FallbackEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ReplikkError::Embedding("Empty embedding result".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let remote_err = match self.remote.embed_batch(texts).await {
            Ok(embeddings) => return Ok(embeddings),
            Err(e) => e,
        };

        warn!(
            "Remote embedding failed, falling back to local model: {}",
            remote_err
        );

        let local = match self.local().await {
            Ok(local) => local,
            Err(local_err) => {
                return Err(ReplikkError::EmbeddingUnavailable(format!(
                    "remote: {}; local: {}",
                    remote_err, local_err
                )));
            }
        };

        local.embed_batch(texts).await.map_err(|local_err| {
            ReplikkError::EmbeddingUnavailable(format!(
                "remote: {}; local: {}",
                remote_err, local_err
            ))
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
