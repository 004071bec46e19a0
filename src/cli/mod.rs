//! CLI module for Replikk.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Replikk - Movie Dialogue Chat
///
/// Index movie scripts into a vector database, find the movie a line of
/// dialogue came from, and chat with a character from that movie.
#[derive(Parser, Debug)]
#[command(name = "replikk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index movie scripts into the vector database
    Ingest {
        /// Script file or directory of scripts (.json, .txt, .text)
        path: String,

        /// Delete any existing vectors for each movie and re-ingest
        #[arg(short, long)]
        force: bool,
    },

    /// Find the dialogue chunks closest to a query
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
    },

    /// Start an interactive chat session with a movie character
    Chat {
        /// Username for the chat transcript
        #[arg(short, long)]
        user: Option<String>,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Start the HTTP API and WebSocket chat server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// List indexed movies
    List,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
