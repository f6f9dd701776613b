use serde::{Deserialize, Serialize};

use crate::store::Chunk;

/// Search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub length: usize,

    /// Cosine similarity in [-1, 1]
    pub similarity_score: f32,

    /// 1-based position in the returned list
    pub rank: usize,
}

impl SearchResult {
    pub fn new(chunk: &Chunk, similarity_score: f32, rank: usize) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            start_time: chunk.start_time,
            end_time: chunk.end_time,
            text: chunk.text.clone(),
            length: chunk.length,
            similarity_score,
            rank,
        }
    }
}

/// Index statistics
///
/// Serializes as `{"status": "no_index"}` or
/// `{"status": "ready", "total_chunks": .., ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexStatistics {
    NoIndex,
    Ready {
        total_chunks: usize,
        average_chunk_length: f64,
        index_size: usize,
        model_name: String,
    },
}

/// A loaded snapshot was embedded with a different model than the active provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMismatch {
    /// Model of the active embedding provider
    pub configured: String,

    /// Model recorded in the snapshot
    pub stored: String,
}

/// Outcome of a successful `load`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub chunks: usize,
    pub dimension: usize,
    pub model_name: String,

    /// Set when queries will be embedded by a different model than the index
    pub model_mismatch: Option<ModelMismatch>,
}
