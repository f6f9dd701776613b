/// Memoria error types
#[derive(Debug, thiserror::Error)]
pub enum MemoriaError {
    /// Embedding provider failed (model load, transport, inference)
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// Vector dimensions disagree
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Empty vector set passed to index build
    #[error("Empty input: an index needs at least one vector")]
    EmptyInput,

    /// Every chunk was blank after filtering
    #[error("No valid chunks: every chunk text is empty or whitespace")]
    NoValidChunks,

    /// Query issued before any index was built or loaded
    #[error("Index not built")]
    IndexNotBuilt,

    /// Chunk position outside the store
    #[error("Position {position} out of range (size {size})")]
    PositionOutOfRange { position: usize, size: usize },

    /// Persisted snapshot is inconsistent
    #[error("Corrupt index state: {0}")]
    CorruptState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MemoriaError {
    /// Create embedding provider error
    pub fn embedding_provider<S: Into<String>>(msg: S) -> Self {
        Self::EmbeddingProvider(msg.into())
    }

    /// Create dimension mismatch error
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Create corrupt state error
    pub fn corrupt_state<S: Into<String>>(msg: S) -> Self {
        Self::CorruptState(msg.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the caller can recover by changing input or call order.
    ///
    /// Provider failures, invariant violations and corrupt snapshots are not
    /// recoverable this way.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput
                | Self::NoValidChunks
                | Self::IndexNotBuilt
                | Self::PositionOutOfRange { .. }
                | Self::InvalidInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(MemoriaError::NoValidChunks.is_recoverable());
        assert!(MemoriaError::IndexNotBuilt.is_recoverable());
        assert!(MemoriaError::PositionOutOfRange { position: 3, size: 2 }.is_recoverable());
        assert!(!MemoriaError::embedding_provider("timeout").is_recoverable());
        assert!(!MemoriaError::dimension_mismatch(3, 4).is_recoverable());
        assert!(!MemoriaError::corrupt_state("count").is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = MemoriaError::dimension_mismatch(384, 768);
        assert_eq!(err.to_string(), "Dimension mismatch: expected 384, got 768");

        let err = MemoriaError::PositionOutOfRange { position: 5, size: 2 };
        assert_eq!(err.to_string(), "Position 5 out of range (size 2)");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MemoriaError = io.into();
        assert!(matches!(err, MemoriaError::Io(_)));
    }
}
