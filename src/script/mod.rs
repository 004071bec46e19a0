//! Script text normalization and chunking.
//!
//! Raw movie scripts arrive with layout artifacts (page numbers, centered
//! character cues, scene headings run into dialogue). Cleaning rewrites them
//! into a compact form that embeds well; chunking slices the result into
//! overlapping windows with stable ids.

mod chunker;

pub use chunker::OverlapChunker;

use crate::error::{ReplikkError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A slice of normalized script text with a stable id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueChunk {
    /// Composite id, `{movie_title}_{index}` with a per-movie index.
    pub id: String,
    /// Text content of this chunk.
    pub text: String,
    /// Movie the chunk came from.
    pub movie_title: String,
}

/// A raw script file from the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptFile {
    pub movie_title: String,
    pub content: String,
}

impl ScriptFile {
    /// Load a script from disk.
    ///
    /// `.json` files carry `{movie_title, content}`; anything else is read
    /// as plain text with the file stem as the title.
    pub fn from_path(path: &Path) -> Result<Self> {
        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let content = std::fs::read_to_string(path)?;
            let script: ScriptFile = serde_json::from_str(&content)?;
            Ok(script)
        } else {
            let content = std::fs::read_to_string(path)?;
            let movie_title = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .ok_or_else(|| {
                    ReplikkError::Ingest(format!("No file name in path: {}", path.display()))
                })?;
            Ok(ScriptFile {
                movie_title,
                content,
            })
        }
    }
}

/// Normalizes raw script text with a fixed sequence of substitution rules.
///
/// Rule order matters: whitespace collapses before the punctuation fix so
/// the later rules operate on already-collapsed text.
pub struct ScriptCleaner {
    rules: Vec<(Regex, &'static str)>,
}

impl ScriptCleaner {
    pub fn new() -> Self {
        let patterns: [(&str, &'static str); 7] = [
            // Collapse blank-line runs
            (r"\r\n\s+\r\n", "\r\n\r\n"),
            // Collapse runs of spaces
            (r" +", " "),
            // Put character-name cues on their own line with a colon
            (r"\s+([A-Z]+)\s+", "\n${1}: "),
            // Remove whitespace before punctuation
            (r"\s+([.,!?])", "${1}"),
            // Standardize scene headings
            (r"\s+INT\.\s+", "\nINT. "),
            (r"\s+EXT\.\s+", "\nEXT. "),
            // Strip bare page-number lines
            (r"\n\s*\d+\.\s*\n", "\n"),
        ];

        let rules = patterns
            .iter()
            .map(|(pattern, replacement)| {
                (
                    Regex::new(pattern).expect("static cleaning pattern"),
                    *replacement,
                )
            })
            .collect();

        Self { rules }
    }

    /// Apply every rule in order and trim the result.
    pub fn clean(&self, raw: &str) -> String {
        let mut text = raw.to_string();
        for (rule, replacement) in &self.rules {
            text = rule.replace_all(&text, *replacement).into_owned();
        }
        text.trim().to_string()
    }
}

impl Default for ScriptCleaner {
    fn default() -> Self {
        Self::new()
    }
}
