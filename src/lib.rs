//! Replikk - Movie Dialogue Chat
//!
//! A retrieval-augmented chat service for movie dialogue. Index movie
//! scripts into a vector database, find which movie a line of dialogue
//! came from, and hold an in-character conversation with a character
//! from that movie.
//!
//! # Overview
//!
//! Replikk allows you to:
//! - Ingest movie scripts into a searchable vector index
//! - Match any line of dialogue to the movie it came from
//! - Chat with an AI character grounded in the matched scene
//! - Serve the whole pipeline over HTTP and WebSocket
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt management
//! - `script` - Script cleaning and chunking
//! - `embedding` - Embedding generation with local fallback
//! - `index` - Namespaced vector index abstraction
//! - `cache` - TTL response cache
//! - `retrieval` - Cache-first dialogue retrieval
//! - `session` - Per-connection context resolution
//! - `chat` - Response generation and chat transcripts
//! - `ingest` - Batch ingestion pipeline
//!
//! # Example
//!
//! ```rust,no_run
//! use replikk::config::Settings;
//! use replikk::embedding::create_embedder;
//! use replikk::index::create_index;
//! use replikk::ingest::IngestPipeline;
//! use replikk::script::ScriptFile;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let embedder = create_embedder(&settings).await?;
//!     let index = create_index(&settings)?;
//!
//!     let pipeline = IngestPipeline::new(embedder, index, &settings);
//!     let script = ScriptFile::from_path(std::path::Path::new("heat.txt"))?;
//!     let report = pipeline.ingest_script(&script, false).await?;
//!     println!("Indexed {} chunks", report.chunks_indexed);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod retrieval;
pub mod script;
pub mod session;

pub use error::{ReplikkError, Result};
