use memoria_common::{MemoriaError, Result};
use serde::{Deserialize, Serialize};

/// Chunk as supplied by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInput {
    /// Chunk text
    pub text: String,

    /// Start time in seconds
    #[serde(default, alias = "start_time")]
    pub start: f64,

    /// End time in seconds
    #[serde(default, alias = "end_time")]
    pub end: f64,
}

impl ChunkInput {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Text is non-empty after trimming
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    fn validate(&self, input_index: usize) -> Result<()> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(MemoriaError::invalid_input(format!(
                "Chunk {} has non-finite time bounds",
                input_index
            )));
        }
        if self.start < 0.0 || self.end < self.start {
            return Err(MemoriaError::invalid_input(format!(
                "Chunk {} has invalid time bounds [{}, {}]",
                input_index, self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Indexed chunk with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the store
    pub chunk_id: usize,

    /// Start time in seconds
    pub start_time: f64,

    /// End time in seconds
    pub end_time: f64,

    /// Chunk text as supplied
    pub text: String,

    /// Character count of `text`
    pub length: usize,
}

/// Check time bounds of every input chunk.
pub fn validate_inputs(inputs: &[ChunkInput]) -> Result<()> {
    inputs
        .iter()
        .enumerate()
        .try_for_each(|(i, input)| input.validate(i))
}

/// Ordered chunk metadata, parallel to the similarity index rows
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted chunks, checking ids and lengths
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self> {
        for (position, chunk) in chunks.iter().enumerate() {
            if chunk.chunk_id != position {
                return Err(MemoriaError::corrupt_state(format!(
                    "Chunk at position {} has chunk_id {}",
                    position, chunk.chunk_id
                )));
            }
            if chunk.length != chunk.text.chars().count() {
                return Err(MemoriaError::corrupt_state(format!(
                    "Chunk {} records length {} for {} characters",
                    position,
                    chunk.length,
                    chunk.text.chars().count()
                )));
            }
        }
        Ok(Self { chunks })
    }

    /// Append chunks with non-blank text, in order.
    ///
    /// Each appended chunk gets the next position as its `chunk_id`. Returns
    /// the number of chunks appended.
    pub fn append_batch<I>(&mut self, inputs: I) -> usize
    where
        I: IntoIterator<Item = ChunkInput>,
    {
        let before = self.chunks.len();
        for input in inputs.into_iter().filter(ChunkInput::has_text) {
            let chunk_id = self.chunks.len();
            self.chunks.push(Chunk {
                chunk_id,
                start_time: input.start,
                end_time: input.end,
                length: input.text.chars().count(),
                text: input.text,
            });
        }
        self.chunks.len() - before
    }

    pub fn get(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    pub fn size(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Mean character count, 0.0 for an empty store
    pub fn average_length(&self) -> f64 {
        if self.chunks.is_empty() {
            return 0.0;
        }
        let total: usize = self.chunks.iter().map(|c| c.length).sum();
        total as f64 / self.chunks.len() as f64
    }
}
