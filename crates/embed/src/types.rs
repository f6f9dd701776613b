use serde::{Deserialize, Serialize};

/// Ollama batch embedding request (`POST /api/embed`)
#[derive(Debug, Clone, Serialize)]
pub struct EmbedRequest {
    /// Model name (e.g., "nomic-embed-text")
    pub model: String,

    /// Texts to embed, in order
    pub input: Vec<String>,
}

/// Ollama batch embedding response
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedResponse {
    /// Model name echoed by the server
    #[serde(default)]
    pub model: String,

    /// One vector per input, same order
    pub embeddings: Vec<Vec<f32>>,
}
