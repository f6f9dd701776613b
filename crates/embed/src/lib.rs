//! Memoria embedding providers
//!
//! Maps ordered batches of text to fixed-dimension vectors. The search core
//! only sees the [`EmbeddingProvider`] trait.

mod hashing;
mod ollama;
mod provider;
mod types;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
pub use provider::{provider_from_config, DimensionGuard, EmbeddingProvider};
pub use types::{EmbedRequest, EmbedResponse};
