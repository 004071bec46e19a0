//! Hosted inference endpoint embeddings implementation.

use super::{normalize_l2, Embedder};
use crate::config::EmbeddingSettings;
use crate::error::{ReplikkError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    inputs: &'a [String],
}

#[derive(Deserialize)]
struct EndpointError {
    error: String,
}

/// Embedder backed by a hosted feature-extraction endpoint.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl RemoteEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.resolve_api_key(),
            dimensions: settings.dimensions as usize,
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ReplikkError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ReplikkError::Embedding("No API key configured for embedding endpoint".to_string())
        })?;

        debug!("Requesting embeddings for {} texts", texts.len());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&EmbeddingRequest { inputs: texts })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReplikkError::UpstreamTimeout(format!("embedding endpoint: {}", e))
                } else {
                    ReplikkError::Embedding(format!("Endpoint request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<EndpointError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ReplikkError::Embedding(format!(
                "Endpoint returned {}: {}",
                status, message
            )));
        }

        let mut embeddings: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| ReplikkError::Embedding(format!("Malformed endpoint response: {}", e)))?;

        if embeddings.len() != texts.len() {
            return Err(ReplikkError::Embedding(format!(
                "Endpoint returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        for embedding in &mut embeddings {
            if embedding.len() != self.dimensions {
                return Err(ReplikkError::Embedding(format!(
                    "Endpoint returned {}-dimensional vector, expected {}",
                    embedding.len(),
                    self.dimensions
                )));
            }
            normalize_l2(embedding);
        }

        debug!("Received {} embeddings", embeddings.len());
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingSettings;

    #[test]
    fn test_embedder_creation() {
        let embedder = RemoteEmbedder::new(&EmbeddingSettings::default());
        assert_eq!(embedder.dimensions(), 1024);
    }

    #[tokio::test]
    async fn test_embed_batch_without_api_key() {
        let settings = EmbeddingSettings {
            api_key: None,
            ..Default::default()
        };
        std::env::remove_var("HF_API_KEY");

        let embedder = RemoteEmbedder::new(&settings);
        let result = embedder.embed_batch(&["hello".to_string()]).await;
        assert!(matches!(result, Err(ReplikkError::Embedding(_))));
    }
}
