//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;
use crate::index::create_index;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let index = create_index(&settings)?;
    let namespace = &settings.index.namespace;

    match index.list_movies(namespace).await {
        Ok(movies) => {
            if movies.is_empty() {
                Output::info("No movies indexed yet. Use 'replikk ingest <path>' to add scripts.");
            } else {
                Output::header(&format!("Indexed Movies ({})", movies.len()));
                println!();

                for movie in &movies {
                    Output::movie_info(
                        &movie.movie_title,
                        movie.chunk_count,
                        &movie.indexed_at.format("%Y-%m-%d").to_string(),
                    );
                }

                let total_chunks: u32 = movies.iter().map(|m| m.chunk_count).sum();
                println!();
                Output::kv("Total movies", &movies.len().to_string());
                Output::kv("Total chunks", &total_chunks.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list movies: {}", e));
            return Err(e);
        }
    }

    Ok(())
}
