//! Configuration settings for Replikk.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub index: IndexSettings,
    pub ingest: IngestSettings,
    pub cache: CacheSettings,
    pub chat: ChatSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.replikk".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted inference endpoint with transparent local fallback (default).
    #[default]
    Remote,
    /// In-process model only, no network calls.
    Local,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote" | "endpoint" => Ok(EmbeddingProvider::Remote),
            "local" => Ok(EmbeddingProvider::Local),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Remote => write!(f, "remote"),
            EmbeddingProvider::Local => write!(f, "local"),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (remote, local).
    pub provider: EmbeddingProvider,
    /// Hosted inference endpoint URL (remote provider).
    pub endpoint: String,
    /// Embedding model identifier.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// API token for the hosted endpoint. Falls back to the HF_API_KEY
    /// environment variable when unset.
    pub api_key: Option<String>,
    /// Request timeout for the hosted endpoint, in seconds.
    pub timeout_seconds: u64,
    /// Cache directory for downloaded local model files.
    pub model_cache_dir: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Remote,
            endpoint: "https://api-inference.huggingface.co/models/BAAI/bge-large-en-v1.5"
                .to_string(),
            model: "BAAI/bge-large-en-v1.5".to_string(),
            dimensions: 1024,
            api_key: None,
            timeout_seconds: 30,
            model_cache_dir: "~/.replikk/models".to_string(),
        }
    }
}

impl EmbeddingSettings {
    /// Resolve the endpoint API token from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("HF_API_KEY").ok())
    }
}

/// Script chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Chunks shorter than this are dropped.
    pub min_chunk_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            min_chunk_chars: 50,
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Vector index provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Namespace that holds the dialogue corpus.
    pub namespace: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.replikk/index.db".to_string(),
            namespace: "movie_dialogues".to_string(),
        }
    }
}

/// Batch ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Maximum vectors per upsert request.
    pub batch_size: usize,
    /// Concurrent batch workers.
    pub max_workers: usize,
    /// Delay between batch submissions, in milliseconds. Rate-limit
    /// courtesy to the upstream services, not a tuning knob.
    pub batch_delay_ms: u64,
    /// Attempts per batch before its failure is surfaced.
    pub batch_attempts: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_workers: 8,
            batch_delay_ms: 500,
            batch_attempts: 3,
        }
    }
}

/// Retrieval cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL for cached search results, in seconds.
    pub search_ttl_seconds: u64,
    /// TTL for cached chat listings and transcripts, in seconds.
    pub listing_ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            search_ttl_seconds: 3600,
            listing_ttl_seconds: 300,
        }
    }
}

/// Chat and response generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// LLM model for in-character responses.
    pub model: String,
    /// Path to the SQLite chat transcript database.
    pub transcript_path: String,
    /// Number of recent turns kept in the generation context.
    pub history_turns: usize,
    /// Matches requested when resolving a session's movie context.
    pub search_top_k: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            transcript_path: "~/.replikk/chats.db".to_string(),
            history_turns: 10,
            search_top_k: 5,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ReplikkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("replikk")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite index path.
    pub fn index_path(&self) -> PathBuf {
        Self::expand_path(&self.index.sqlite_path)
    }

    /// Get the expanded chat transcript database path.
    pub fn transcript_path(&self) -> PathBuf {
        Self::expand_path(&self.chat.transcript_path)
    }

    /// Get the expanded local model cache directory.
    pub fn model_cache_dir(&self) -> PathBuf {
        Self::expand_path(&self.embedding.model_cache_dir)
    }
}
