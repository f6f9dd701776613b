use async_trait::async_trait;
use memoria_common::{MemoriaError, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::provider::{DimensionGuard, EmbeddingProvider};
use crate::types::{EmbedRequest, EmbedResponse};

/// Ollama embedding provider
///
/// The HTTP client is created on first use; until then the provider is
/// "not yet loaded" and costs nothing to construct.
#[derive(Debug)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    max_retries: u32,
    timeout: Duration,
    client: OnceCell<Client>,
    guard: DimensionGuard,
}

impl OllamaEmbedder {
    /// Create new Ollama embedder
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_retries: 3,
            timeout: Duration::from_secs(300),
            client: OnceCell::new(),
            guard: DimensionGuard::new(),
        }
    }

    /// Attempts per request (minimum 1)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the HTTP client has been created
    pub fn is_loaded(&self) -> bool {
        self.client.initialized()
    }

    /// Dimension discovered from the first successful response
    pub fn dimension(&self) -> Option<usize> {
        self.guard.dimension()
    }

    async fn client(&self) -> Result<&Client> {
        let timeout = self.timeout;
        self.client
            .get_or_try_init(|| async move {
                Client::builder().timeout(timeout).build().map_err(|e| {
                    MemoriaError::embedding_provider(format!("Failed to create HTTP client: {}", e))
                })
            })
            .await
    }

    async fn embed_with_retry(&self, request: &EmbedRequest) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);

        debug!(
            "Generating embeddings - Model: {}, Batch size: {}",
            request.model,
            request.input.len()
        );

        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.try_embed(&url, request).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    if attempt < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt - 1));
                        warn!(
                            "Embedding request failed (attempt {}/{}): {}. Retrying in {:?}...",
                            attempt, self.max_retries, e, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| MemoriaError::embedding_provider("All retries failed")))
    }

    /// Single attempt against `/api/embed`
    async fn try_embed(&self, url: &str, request: &EmbedRequest) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client()
            .await?
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                MemoriaError::embedding_provider(format!("Failed to send embedding request: {}", e))
            })?
            .error_for_status()
            .map_err(|e| {
                MemoriaError::embedding_provider(format!("Ollama embedding API error: {}", e))
            })?;

        let result: EmbedResponse = response.json().await.map_err(|e| {
            MemoriaError::embedding_provider(format!("Failed to parse embedding response: {}", e))
        })?;

        Ok(result.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };
        let embeddings = self.embed_with_retry(&request).await?;
        self.guard.check(texts.len(), &embeddings)?;

        debug!("Received embeddings - Dimension: {:?}", self.guard.dimension());
        Ok(embeddings)
    }
}
