//! Search command implementation.

use crate::cache::ResponseCache;
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::error::Result;
use crate::index::create_index;
use crate::retrieval::RetrievalService;
use std::sync::Arc;
use std::time::Duration;

/// Run the search command.
pub async fn run_search(query: &str, top_k: usize, settings: Settings) -> Result<()> {
    let embedder = create_embedder(&settings).await?;
    let index = create_index(&settings)?;
    let cache = Arc::new(ResponseCache::new());

    let retrieval = RetrievalService::new(
        cache,
        embedder,
        index,
        settings.index.namespace.clone(),
        Duration::from_secs(settings.cache.search_ttl_seconds),
    );

    let spinner = Output::spinner("Searching...");
    let result = retrieval.search(query, top_k).await;
    spinner.finish_and_clear();

    match result {
        Ok(retrieved) => {
            if retrieved.matches.is_empty() {
                Output::warning("No dialogue found matching your query.");
            } else {
                Output::success(&format!("Found {} match(es)", retrieved.matches.len()));
                for m in &retrieved.matches {
                    Output::search_result(&m.movie_title, m.score, &m.text);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e);
        }
    }

    Ok(())
}
