use memoria_common::{MemoriaError, Result};
use serde::{Deserialize, Serialize};

use crate::store::ChunkInput;

/// Timestamped transcript segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    /// Transcribed text
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Group consecutive segments into chunks spanning about `chunk_duration` seconds.
///
/// A segment opens a new chunk when it would stretch the current one past
/// `chunk_duration` and the current chunk already has text. Texts are joined
/// with single spaces and trimmed.
pub fn group_segments_by_time(
    segments: &[Segment],
    chunk_duration: f64,
) -> Result<Vec<ChunkInput>> {
    if !(chunk_duration > 0.0) {
        return Err(MemoriaError::invalid_input(format!(
            "Chunk duration must be positive, got {}",
            chunk_duration
        )));
    }

    let mut chunks = Vec::new();
    let mut current = ChunkInput::new(String::new(), 0.0, 0.0);

    for segment in segments {
        let overflows = segment.end - current.start > chunk_duration;
        if overflows && current.has_text() {
            let done = std::mem::replace(
                &mut current,
                ChunkInput::new(segment.text.clone(), segment.start, segment.end),
            );
            chunks.push(done);
            continue;
        }

        if !current.has_text() {
            current.start = segment.start;
        }
        current.end = segment.end;
        current.text.push(' ');
        current.text.push_str(&segment.text);
    }

    if current.has_text() {
        chunks.push(current);
    }

    for chunk in &mut chunks {
        chunk.text = chunk.text.trim().to_string();
    }

    Ok(chunks)
}
