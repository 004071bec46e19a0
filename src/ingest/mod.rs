//! Script ingestion pipeline: clean, chunk, dedup, embed, upsert.
//!
//! Chunks already present in the index are skipped before any embedding
//! work, so re-running ingestion over the same corpus embeds nothing new.
//! Batches fan out to a bounded worker pool with a fixed pause between
//! submissions; a batch that keeps failing is reported and its siblings
//! continue.

use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{ReplikkError, Result};
use crate::index::{VectorIndex, VectorRecord};
use crate::script::{DialogueChunk, OverlapChunker, ScriptCleaner, ScriptFile};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Pause between upsert attempts for a failing batch.
const RETRY_PAUSE: Duration = Duration::from_millis(250);

/// Outcome of ingesting one movie script.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub movie_title: String,
    pub chunks_total: usize,
    pub chunks_skipped: usize,
    pub chunks_indexed: usize,
    pub failed_batches: Vec<usize>,
}

/// Ingestion pipeline over an embedder and a vector index.
pub struct IngestPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    cleaner: ScriptCleaner,
    chunker: OverlapChunker,
    namespace: String,
    batch_size: usize,
    max_workers: usize,
    batch_delay: Duration,
    batch_attempts: usize,
}

impl IngestPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        settings: &Settings,
    ) -> Self {
        Self {
            embedder,
            index,
            cleaner: ScriptCleaner::new(),
            chunker: OverlapChunker::new(
                settings.chunking.chunk_size,
                settings.chunking.min_chunk_chars,
            ),
            namespace: settings.index.namespace.clone(),
            batch_size: settings.ingest.batch_size.max(1),
            max_workers: settings.ingest.max_workers.max(1),
            batch_delay: Duration::from_millis(settings.ingest.batch_delay_ms),
            batch_attempts: settings.ingest.batch_attempts.max(1),
        }
    }

    /// Ingest one movie script.
    pub async fn ingest_script(&self, script: &ScriptFile, force: bool) -> Result<IngestReport> {
        self.ingest_script_with_progress(script, force, |_, _| {})
            .await
    }

    /// Ingest one movie script, reporting batch completion through
    /// `on_batch(completed, total)`.
    #[instrument(skip(self, script, on_batch), fields(movie = %script.movie_title))]
    pub async fn ingest_script_with_progress(
        &self,
        script: &ScriptFile,
        force: bool,
        on_batch: impl Fn(usize, usize),
    ) -> Result<IngestReport> {
        if force {
            let removed = self
                .index
                .delete_movie(&self.namespace, &script.movie_title)
                .await?;
            if removed > 0 {
                info!("Removed {} existing vectors for re-ingestion", removed);
            }
        }

        let cleaned = self.cleaner.clean(&script.content);
        let chunks = self.chunker.chunk(&cleaned, &script.movie_title);
        let chunks_total = chunks.len();

        if chunks.is_empty() {
            info!("Script produced no chunks");
            return Ok(IngestReport {
                movie_title: script.movie_title.clone(),
                chunks_total,
                chunks_skipped: 0,
                chunks_indexed: 0,
                failed_batches: Vec::new(),
            });
        }

        // Skip chunks the index already holds so a re-run embeds nothing.
        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let existing = self.index.existing_ids(&self.namespace, &ids).await?;
        let candidates: Vec<DialogueChunk> = chunks
            .into_iter()
            .filter(|c| !existing.contains(&c.id))
            .collect();
        let chunks_skipped = chunks_total - candidates.len();

        if candidates.is_empty() {
            info!("All {} chunks already indexed", chunks_total);
            return Ok(IngestReport {
                movie_title: script.movie_title.clone(),
                chunks_total,
                chunks_skipped,
                chunks_indexed: 0,
                failed_batches: Vec::new(),
            });
        }

        let candidate_count = candidates.len();
        let batches: Vec<Vec<DialogueChunk>> = candidates
            .chunks(self.batch_size)
            .map(|b| b.to_vec())
            .collect();
        let total_batches = batches.len();

        info!(
            "Submitting {} chunks in {} batches ({} already indexed)",
            candidate_count, total_batches, chunks_skipped
        );

        let mut in_flight = FuturesUnordered::new();
        let mut chunks_indexed = 0;
        let mut failed_batches = Vec::new();
        let mut completed = 0;

        let mut handle_outcome =
            |batch_no: usize, result: Result<usize>, completed: &mut usize| {
                *completed += 1;
                on_batch(*completed, total_batches);
                match result {
                    Ok(count) => chunks_indexed += count,
                    Err(e) => {
                        error!("Batch {} failed permanently: {}", batch_no, e);
                        failed_batches.push(batch_no);
                    }
                }
            };

        for (batch_no, batch) in batches.into_iter().enumerate() {
            if batch_no > 0 {
                // Pacing between submissions, a courtesy to the upstream
                // services rather than a tuning knob.
                tokio::time::sleep(self.batch_delay).await;
            }

            while in_flight.len() >= self.max_workers {
                if let Some((no, result)) = in_flight.next().await {
                    handle_outcome(no, result, &mut completed);
                }
            }

            in_flight.push(self.submit_batch(batch_no, batch));
        }

        while let Some((no, result)) = in_flight.next().await {
            handle_outcome(no, result, &mut completed);
        }

        failed_batches.sort_unstable();

        Ok(IngestReport {
            movie_title: script.movie_title.clone(),
            chunks_total,
            chunks_skipped,
            chunks_indexed,
            failed_batches,
        })
    }

    async fn submit_batch(
        &self,
        batch_no: usize,
        chunks: Vec<DialogueChunk>,
    ) -> (usize, Result<usize>) {
        (batch_no, self.process_batch(batch_no, &chunks).await)
    }

    async fn process_batch(&self, batch_no: usize, chunks: &[DialogueChunk]) -> Result<usize> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(ReplikkError::Embedding(format!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| {
                VectorRecord::new(
                    chunk.id.clone(),
                    values,
                    chunk.text.clone(),
                    chunk.movie_title.clone(),
                )
            })
            .collect();

        let mut last_error = String::new();
        for attempt in 1..=self.batch_attempts {
            match self.index.upsert_batch(&self.namespace, &records).await {
                Ok(count) => return Ok(count),
                Err(e) => {
                    warn!(
                        "Upsert attempt {}/{} for batch {} failed: {}",
                        attempt, self.batch_attempts, batch_no, e
                    );
                    last_error = e.to_string();
                    if attempt < self.batch_attempts {
                        tokio::time::sleep(RETRY_PAUSE).await;
                    }
                }
            }
        }

        Err(ReplikkError::IndexWriteFailed {
            batch: batch_no,
            message: last_error,
        })
    }
}
