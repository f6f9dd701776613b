use crate::error::MemoriaError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Dimension used by the hashing backend when `EMBEDDING_DIM` is unset
pub const DEFAULT_HASHING_DIM: usize = 384;

/// Which embedding provider to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama HTTP API
    Ollama,
    /// Offline feature hashing
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = MemoriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hashing" | "hash" => Ok(Self::Hashing),
            other => Err(MemoriaError::config(format!(
                "Unknown embedding backend '{}' (expected 'ollama' or 'hashing')",
                other
            ))),
        }
    }
}

/// Memoria application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Embedding provider backend
    pub embedding_backend: EmbeddingBackend,

    /// Embedding model identity
    pub embedding_model: String,

    /// Ollama API base URL
    pub ollama_base_url: String,

    /// Expected embedding dimension (informational; the provider decides)
    pub embedding_dim: Option<usize>,

    /// Default minimum similarity for search results
    pub similarity_threshold: f32,

    /// Default number of search results
    pub default_top_k: usize,

    /// Default number of related chunks
    pub related_top_k: usize,

    /// Window length used when grouping transcript segments into chunks
    pub chunk_duration_secs: f32,

    /// Retry budget for a single provider request
    pub embed_max_retries: u32,

    /// Directory holding the persisted index snapshot
    pub index_dir: PathBuf,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            embedding_backend: EmbeddingBackend::Ollama,
            embedding_model: "nomic-embed-text".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            embedding_dim: None,
            similarity_threshold: 0.7,
            default_top_k: 5,
            related_top_k: 3,
            chunk_duration_secs: 30.0,
            embed_max_retries: 3,
            index_dir: PathBuf::from("./db/search_index"),
            log_dir: PathBuf::from("./db/log"),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self, MemoriaError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        let config = Self::from_vars(|key| std::env::var(key).ok())?;
        config.validate()?;
        config.ensure_directories()?;

        Ok(config)
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, MemoriaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let embedding_backend = match lookup("EMBEDDING_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.embedding_backend,
        };

        Ok(Self {
            embedding_backend,
            embedding_model: lookup("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            ollama_base_url: lookup("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_base_url),
            embedding_dim: lookup("EMBEDDING_DIM").and_then(|s| s.trim().parse().ok()),
            similarity_threshold: parse_or(
                &lookup,
                "SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            ),
            default_top_k: parse_or(&lookup, "DEFAULT_TOP_K", defaults.default_top_k),
            related_top_k: parse_or(&lookup, "RELATED_TOP_K", defaults.related_top_k),
            chunk_duration_secs: parse_or(
                &lookup,
                "CHUNK_DURATION_SECS",
                defaults.chunk_duration_secs,
            ),
            embed_max_retries: parse_or(&lookup, "EMBED_MAX_RETRIES", defaults.embed_max_retries),
            index_dir: lookup("INDEX_DIR").map(PathBuf::from).unwrap_or(defaults.index_dir),
            log_dir: lookup("LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    /// Ensure required directories exist, create if not
    pub fn ensure_directories(&self) -> Result<(), MemoriaError> {
        if !self.log_dir.exists() {
            std::fs::create_dir_all(&self.log_dir).map_err(|e| {
                MemoriaError::config(format!(
                    "Failed to create directory {}: {}",
                    self.log_dir.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// Dimension the hashing backend should produce
    pub fn hashing_dim(&self) -> usize {
        self.embedding_dim.unwrap_or(DEFAULT_HASHING_DIM)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), MemoriaError> {
        if self.embedding_model.trim().is_empty() {
            return Err(MemoriaError::config("Embedding model name cannot be empty"));
        }

        if !self.ollama_base_url.starts_with("http://")
            && !self.ollama_base_url.starts_with("https://")
        {
            return Err(MemoriaError::config(
                "Ollama base URL must start with http:// or https://",
            ));
        }

        if !self.similarity_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.similarity_threshold)
        {
            return Err(MemoriaError::config(format!(
                "Similarity threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }

        if self.default_top_k == 0 || self.related_top_k == 0 {
            return Err(MemoriaError::config("top_k defaults must be positive"));
        }

        if !(self.chunk_duration_secs > 0.0) {
            return Err(MemoriaError::config("Chunk duration must be positive"));
        }

        if self.embedding_dim == Some(0) {
            return Err(MemoriaError::config("Embedding dimension cannot be 0"));
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
