//! Memoria semantic chunk index
//!
//! Embeds text chunks, keeps them in an exact flat inner-product index and
//! answers top-k, related-chunk and pairwise similarity queries.

pub mod engine;
pub mod index;
pub mod normalize;
pub mod preprocess;
pub mod segments;
pub mod storage;
pub mod store;
pub mod types;

pub use engine::SemanticSearchEngine;
pub use index::SimilarityIndex;
pub use normalize::{cosine_similarity, dot, l2_norm, l2_normalize};
pub use preprocess::preprocess_text;
pub use segments::{group_segments_by_time, Segment};
pub use storage::{load_snapshot, save_snapshot, IndexSnapshot, METADATA_FILE, VECTORS_FILE};
pub use store::{Chunk, ChunkInput, ChunkStore};
pub use types::{IndexStatistics, LoadReport, ModelMismatch, SearchResult};
