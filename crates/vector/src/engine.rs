use memoria_common::{AppConfig, MemoriaError, Result};
use memoria_embed::EmbeddingProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::index::SimilarityIndex;
use crate::normalize::{cosine_similarity, l2_normalize};
use crate::preprocess::preprocess_text;
use crate::storage::{load_snapshot, save_snapshot};
use crate::store::{validate_inputs, Chunk, ChunkInput, ChunkStore};
use crate::types::{IndexStatistics, LoadReport, ModelMismatch, SearchResult};

/// Index and metadata published together; never mutated after publish
#[derive(Debug)]
struct IndexState {
    index: SimilarityIndex,
    store: ChunkStore,
    model_name: String,
}

impl IndexState {
    fn chunk(&self, position: usize) -> Result<&Chunk> {
        self.store.get(position).ok_or(MemoriaError::PositionOutOfRange {
            position,
            size: self.store.size(),
        })
    }

    /// Map raw `(position, score)` hits to results above `threshold`, ranked from 1
    fn rank(
        &self,
        hits: Vec<(usize, f32)>,
        threshold: f32,
        exclude: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let mut results = Vec::with_capacity(hits.len());
        for (position, score) in hits {
            if score < threshold || exclude == Some(position) {
                continue;
            }
            let chunk = self.chunk(position)?;
            results.push(SearchResult::new(chunk, score, results.len() + 1));
        }
        Ok(results)
    }
}

/// Semantic search engine over one document's chunks
///
/// Writers (`build_index`, `load`) prepare a complete new state and swap it in
/// under the write lock; readers clone the published state and work on that,
/// so a query never sees a half-replaced index.
pub struct SemanticSearchEngine {
    state: RwLock<Option<Arc<IndexState>>>,
    provider: Arc<dyn EmbeddingProvider>,
    default_threshold: f32,
    default_top_k: usize,
    related_top_k: usize,
    expected_dim: Option<usize>,
    index_dir: PathBuf,
}

impl SemanticSearchEngine {
    /// Create new engine
    pub fn new(config: &AppConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            state: RwLock::new(None),
            provider,
            default_threshold: config.similarity_threshold,
            default_top_k: config.default_top_k,
            related_top_k: config.related_top_k,
            expected_dim: config.embedding_dim,
            index_dir: config.index_dir.clone(),
        }
    }

    /// Create an engine with default configuration
    pub fn with_provider(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(&AppConfig::default(), provider)
    }

    /// Model identity of the active provider
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn default_threshold(&self) -> f32 {
        self.default_threshold
    }

    /// Configured snapshot directory
    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Whether an index has been built or loaded
    pub async fn is_ready(&self) -> bool {
        self.state.read().await.is_some()
    }

    async fn snapshot(&self) -> Result<Arc<IndexState>> {
        self.state
            .read()
            .await
            .clone()
            .ok_or(MemoriaError::IndexNotBuilt)
    }

    async fn publish(&self, state: IndexState) {
        *self.state.write().await = Some(Arc::new(state));
    }

    /// Preprocess, embed in one provider call, and normalize
    async fn embed_normalized(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let prepared: Vec<String> = texts.iter().map(|t| preprocess_text(t)).collect();
        let mut vectors = self.provider.embed(&prepared).await?;
        if vectors.len() != prepared.len() {
            return Err(MemoriaError::embedding_provider(format!(
                "Provider returned {} vectors for {} texts",
                vectors.len(),
                prepared.len()
            )));
        }
        vectors.iter_mut().for_each(|v| l2_normalize(v));
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_normalized(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| MemoriaError::embedding_provider("Provider returned no vector"))
    }

    /// Build the index from `chunks`, replacing any previous index.
    ///
    /// Blank chunks are skipped. Returns the number of chunks indexed. On
    /// error the previous index stays published.
    pub async fn build_index(&self, chunks: &[ChunkInput]) -> Result<usize> {
        validate_inputs(chunks)?;

        let mut store = ChunkStore::new();
        store.append_batch(chunks.iter().cloned());
        if store.is_empty() {
            return Err(MemoriaError::NoValidChunks);
        }

        let texts: Vec<String> = store.chunks().iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_normalized(&texts).await?;

        let mut index = SimilarityIndex::new();
        index.build(&vectors)?;

        if let (Some(expected), Some(actual)) = (self.expected_dim, index.dimension()) {
            if expected != actual {
                warn!(
                    "Configured embedding dimension {} differs from provider dimension {}",
                    expected, actual
                );
            }
        }

        let count = store.size();
        self.publish(IndexState {
            index,
            store,
            model_name: self.provider.model_name().to_string(),
        })
        .await;

        Ok(count)
    }

    /// Top-k chunks for `query` scoring at least `threshold`
    /// (the configured default when `None`).
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let threshold = threshold.unwrap_or(self.default_threshold);
        if !threshold.is_finite() {
            return Err(MemoriaError::invalid_input(format!(
                "Threshold must be finite, got {}",
                threshold
            )));
        }

        let state = self.snapshot().await?;
        let query_vector = self.embed_query(query).await?;
        let hits = state.index.search(&query_vector, top_k)?;
        state.rank(hits, threshold, None)
    }

    /// `search` with the configured top-k and threshold
    pub async fn search_default(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.search(query, self.default_top_k, None).await
    }

    /// Cosine similarity of two texts, 0.0 if either embeds to a zero vector
    pub async fn pairwise_similarity(&self, text_a: &str, text_b: &str) -> Result<f32> {
        let texts = [preprocess_text(text_a), preprocess_text(text_b)];
        let vectors = self.provider.embed(&texts).await?;
        match vectors.as_slice() {
            [a, b] if a.len() == b.len() => Ok(cosine_similarity(a, b)),
            [a, b] => Err(MemoriaError::dimension_mismatch(a.len(), b.len())),
            other => Err(MemoriaError::embedding_provider(format!(
                "Provider returned {} vectors for 2 texts",
                other.len()
            ))),
        }
    }

    /// Chunks most similar to the chunk at `position`, excluding itself.
    ///
    /// The chunk's own text is the query and the configured threshold
    /// applies. Ranks are renumbered after the self-match is removed.
    pub async fn related(&self, position: usize, top_k: usize) -> Result<Vec<SearchResult>> {
        let state = self.snapshot().await?;
        let text = state.chunk(position)?.text.clone();

        let query_vector = self.embed_query(&text).await?;
        let hits = state.index.search(&query_vector, top_k.saturating_add(1))?;

        let mut related = state.rank(hits, self.default_threshold, Some(position))?;
        related.truncate(top_k);
        Ok(related)
    }

    /// `related` with the configured top-k
    pub async fn related_default(&self, position: usize) -> Result<Vec<SearchResult>> {
        self.related(position, self.related_top_k).await
    }

    /// Stored chunk at `position`
    pub async fn chunk(&self, position: usize) -> Result<Chunk> {
        let state = self.snapshot().await?;
        state.chunk(position).cloned()
    }

    /// Persist the current index under `dir`
    pub async fn save(&self, dir: &Path) -> Result<()> {
        let state = self.snapshot().await?;
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            save_snapshot(&dir, &state.index, &state.store, &state.model_name)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Snapshot writer panicked: {}", e))?
    }

    /// Replace the current index with the snapshot under `dir`.
    ///
    /// A model name differing from the active provider is reported in the
    /// returned [`LoadReport`], not treated as an error.
    pub async fn load(&self, dir: &Path) -> Result<LoadReport> {
        let dir = dir.to_path_buf();
        let snapshot = tokio::task::spawn_blocking(move || load_snapshot(&dir))
            .await
            .map_err(|e| anyhow::anyhow!("Snapshot reader panicked: {}", e))??;

        let configured = self.provider.model_name();
        let model_mismatch = (snapshot.model_name != configured).then(|| ModelMismatch {
            configured: configured.to_string(),
            stored: snapshot.model_name.clone(),
        });
        if let Some(mismatch) = &model_mismatch {
            warn!(
                "Loaded index was embedded with '{}' but queries use '{}'; \
                 re-embed for reliable scores",
                mismatch.stored,
                mismatch.configured
            );
        }

        let report = LoadReport {
            chunks: snapshot.store.size(),
            dimension: snapshot.index.dimension().unwrap_or(0),
            model_name: snapshot.model_name.clone(),
            model_mismatch,
        };

        self.publish(IndexState {
            index: snapshot.index,
            store: snapshot.store,
            model_name: snapshot.model_name,
        })
        .await;

        Ok(report)
    }

    /// Persist to the configured index directory
    pub async fn save_default(&self) -> Result<()> {
        self.save(&self.index_dir).await
    }

    /// Load from the configured index directory
    pub async fn load_default(&self) -> Result<LoadReport> {
        self.load(&self.index_dir).await
    }

    /// Index statistics; `NoIndex` before the first build or load
    pub async fn statistics(&self) -> IndexStatistics {
        match self.state.read().await.as_ref() {
            None => IndexStatistics::NoIndex,
            Some(state) => IndexStatistics::Ready {
                total_chunks: state.store.size(),
                average_chunk_length: state.store.average_length(),
                index_size: state.index.len(),
                model_name: state.model_name.clone(),
            },
        }
    }
}
