//! Configuration module for Replikk.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{PersonaPrompts, Prompts};
pub use settings::{
    CacheSettings, ChatSettings, ChunkingSettings, EmbeddingProvider, EmbeddingSettings,
    GeneralSettings, IndexSettings, IngestSettings, PromptSettings, Settings,
};
