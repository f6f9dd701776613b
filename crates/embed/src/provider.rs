use async_trait::async_trait;
use memoria_common::{AppConfig, EmbeddingBackend, MemoriaError, Result};
use std::sync::{Arc, OnceLock};

use crate::hashing::HashingEmbedder;
use crate::ollama::OllamaEmbedder;

/// Maps ordered text batches to fixed-dimension vectors
///
/// Implementations must return exactly one vector per input, in input order,
/// and keep one dimension for the lifetime of the provider. Failures surface
/// as [`MemoriaError::EmbeddingProvider`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identity recorded alongside persisted indexes
    fn model_name(&self) -> &str;

    /// Embed a batch of texts
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| MemoriaError::embedding_provider("Provider returned no vector"))
    }
}

/// Remembers the dimension discovered on the first successful batch
#[derive(Debug, Default)]
pub struct DimensionGuard {
    dimension: OnceLock<usize>,
}

impl DimensionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimension seen so far, if any batch succeeded
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Validate a provider batch against the input count and the learned dimension
    pub fn check(&self, inputs: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != inputs {
            return Err(MemoriaError::embedding_provider(format!(
                "Provider returned {} vectors for {} inputs",
                vectors.len(),
                inputs
            )));
        }

        let Some(first) = vectors.first() else {
            return Ok(());
        };
        if first.is_empty() {
            return Err(MemoriaError::embedding_provider("Provider returned an empty vector"));
        }

        let expected = self.dimension().unwrap_or(first.len());
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(MemoriaError::dimension_mismatch(expected, bad.len()));
        }

        let _ = self.dimension.set(expected);
        Ok(())
    }
}

/// Build the provider selected by `config.embedding_backend`
pub fn provider_from_config(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embedding_backend {
        EmbeddingBackend::Ollama => Arc::new(
            OllamaEmbedder::new(&config.ollama_base_url, &config.embedding_model)
                .with_max_retries(config.embed_max_retries),
        ),
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.hashing_dim())?),
    };
    Ok(provider)
}
