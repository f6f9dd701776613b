use async_trait::async_trait;
use memoria_common::{AppConfig, MemoriaError, Result};
use memoria_embed::{EmbeddingProvider, HashingEmbedder};
use memoria_vector::{
    group_segments_by_time, ChunkInput, IndexStatistics, Segment, SemanticSearchEngine,
    VECTORS_FILE,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Provider returning fixed vectors per text, with failure injection
struct ScriptedProvider {
    model: String,
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(model: &str, dimension: usize, entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            model: model.to_string(),
            dimension,
            vectors: entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect(),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MemoriaError::embedding_provider("model offline"));
        }
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dimension])
            })
            .collect())
    }
}

const LECTURE: [&str; 3] = [
    "AI is a field of computer science",
    "Machine learning improves with experience",
    "Deep learning uses neural networks",
];

fn lecture_chunks() -> Vec<ChunkInput> {
    LECTURE
        .iter()
        .enumerate()
        .map(|(i, text)| ChunkInput::new(*text, i as f64 * 30.0, (i + 1) as f64 * 30.0))
        .collect()
}

fn open_config() -> AppConfig {
    AppConfig {
        similarity_threshold: 0.0,
        ..AppConfig::default()
    }
}

fn hashing_engine(config: &AppConfig) -> SemanticSearchEngine {
    SemanticSearchEngine::new(config, Arc::new(HashingEmbedder::new(384).unwrap()))
}

#[tokio::test]
async fn test_lecture_scenario_top_hit() {
    let engine = hashing_engine(&AppConfig::default());
    engine.build_index(&lecture_chunks()).await.unwrap();

    let results = engine
        .search("What is artificial intelligence?", 2, Some(0.0))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk_id, 0);
    assert_eq!(results[0].rank, 1);
    assert_eq!(results[1].rank, 2);
    assert_eq!(results[0].start_time, 0.0);
    assert_eq!(results[0].end_time, 30.0);
    assert_eq!(results[0].length, LECTURE[0].chars().count());
    assert!(results[0].similarity_score > results[1].similarity_score);
}

#[tokio::test]
async fn test_default_threshold_filters_weak_matches() {
    let engine = hashing_engine(&AppConfig::default());
    engine.build_index(&lecture_chunks()).await.unwrap();

    assert_eq!(engine.default_threshold(), 0.7);
    let results = engine
        .search("What is artificial intelligence?", 3, None)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_threshold_one_without_duplicate_is_empty() {
    let engine = hashing_engine(&open_config());
    engine.build_index(&lecture_chunks()).await.unwrap();

    let results = engine
        .search("neural networks for vision", 3, Some(1.0))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_statistics_counts_non_blank_chunks() {
    let engine = hashing_engine(&open_config());
    assert_eq!(engine.statistics().await, IndexStatistics::NoIndex);

    let chunks = vec![
        ChunkInput::new("abcd", 0.0, 1.0),
        ChunkInput::new("   ", 1.0, 2.0),
        ChunkInput::new("", 2.0, 3.0),
        ChunkInput::new("ab", 3.0, 4.0),
    ];
    let indexed = engine.build_index(&chunks).await.unwrap();
    assert_eq!(indexed, 2);

    match engine.statistics().await {
        IndexStatistics::Ready {
            total_chunks,
            average_chunk_length,
            index_size,
            model_name,
        } => {
            assert_eq!(total_chunks, 2);
            assert_eq!(index_size, 2);
            assert_eq!(average_chunk_length, 3.0);
            assert_eq!(model_name, "hashing-384");
        }
        other => panic!("unexpected statistics: {:?}", other),
    }

    // Positions are sequential after filtering
    assert_eq!(engine.chunk(1).await.unwrap().text, "ab");
    assert_eq!(engine.chunk(1).await.unwrap().chunk_id, 1);
}

#[tokio::test]
async fn test_queries_before_build() {
    let engine = hashing_engine(&open_config());
    assert!(!engine.is_ready().await);
    assert!(matches!(
        engine.search("anything", 3, None).await,
        Err(MemoriaError::IndexNotBuilt)
    ));
    assert!(matches!(
        engine.related(0, 3).await,
        Err(MemoriaError::IndexNotBuilt)
    ));
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        engine.save(dir.path()).await,
        Err(MemoriaError::IndexNotBuilt)
    ));
}

#[tokio::test]
async fn test_no_valid_chunks_keeps_previous_state() {
    let engine = hashing_engine(&open_config());
    assert!(matches!(
        engine.build_index(&[]).await,
        Err(MemoriaError::NoValidChunks)
    ));

    engine.build_index(&lecture_chunks()).await.unwrap();
    let before = engine.statistics().await;

    let blank = vec![ChunkInput::new(" ", 0.0, 1.0), ChunkInput::new("\t\n", 1.0, 2.0)];
    assert!(matches!(
        engine.build_index(&blank).await,
        Err(MemoriaError::NoValidChunks)
    ));
    assert_eq!(engine.statistics().await, before);
}

#[tokio::test]
async fn test_invalid_time_bounds_rejected() {
    let engine = hashing_engine(&open_config());
    let chunks = vec![
        ChunkInput::new("fine", 0.0, 10.0),
        ChunkInput::new("backwards", 20.0, 10.0),
    ];
    let err = engine.build_index(&chunks).await.unwrap_err();
    assert!(matches!(err, MemoriaError::InvalidInput(_)));
    assert!(!engine.is_ready().await);
}

#[tokio::test]
async fn test_provider_failure_leaves_state_untouched() {
    let provider = Arc::new(ScriptedProvider::new(
        "scripted",
        2,
        &[("alpha", vec![1.0, 0.0]), ("beta", vec![0.0, 1.0])],
    ));
    let engine = SemanticSearchEngine::new(&open_config(), provider.clone());
    engine
        .build_index(&[ChunkInput::new("alpha", 0.0, 1.0)])
        .await
        .unwrap();

    provider.set_failing(true);
    let err = engine
        .build_index(&[ChunkInput::new("alpha", 0.0, 1.0), ChunkInput::new("beta", 1.0, 2.0)])
        .await
        .unwrap_err();
    assert!(matches!(err, MemoriaError::EmbeddingProvider(_)));
    assert!(matches!(
        engine.search("alpha", 1, None).await,
        Err(MemoriaError::EmbeddingProvider(_))
    ));

    provider.set_failing(false);
    let results = engine.search("alpha", 5, None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "alpha");
}

#[tokio::test]
async fn test_one_provider_call_per_operation() {
    let provider = Arc::new(ScriptedProvider::new(
        "scripted",
        2,
        &[("alpha", vec![1.0, 0.0]), ("beta", vec![0.0, 1.0]), ("gamma", vec![1.0, 1.0])],
    ));
    let engine = SemanticSearchEngine::new(&open_config(), provider.clone());

    let chunks: Vec<ChunkInput> = ["alpha", "beta", "gamma"]
        .iter()
        .map(|t| ChunkInput::new(*t, 0.0, 0.0))
        .collect();
    engine.build_index(&chunks).await.unwrap();
    assert_eq!(provider.calls(), 1);

    engine.search("alpha", 2, None).await.unwrap();
    assert_eq!(provider.calls(), 2);

    engine.pairwise_similarity("alpha", "beta").await.unwrap();
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_ranks_contiguous_after_threshold() {
    let provider = Arc::new(ScriptedProvider::new(
        "scripted",
        2,
        &[
            ("query", vec![1.0, 0.0]),
            ("close", vec![0.9, 0.435_889_9]),
            ("far", vec![0.5, 0.866_025_4]),
            ("near", vec![0.8, 0.6]),
        ],
    ));
    let engine = SemanticSearchEngine::new(&open_config(), provider);
    let chunks: Vec<ChunkInput> = ["close", "far", "near"]
        .iter()
        .map(|t| ChunkInput::new(*t, 0.0, 0.0))
        .collect();
    engine.build_index(&chunks).await.unwrap();

    let results = engine.search("query", 3, Some(0.6)).await.unwrap();
    let ids: Vec<usize> = results.iter().map(|r| r.chunk_id).collect();
    let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
    assert_eq!(ids, vec![0, 2]);
    assert_eq!(ranks, vec![1, 2]);
    assert!((results[0].similarity_score - 0.9).abs() < 1e-4);
}

#[tokio::test]
async fn test_equal_scores_ordered_by_position() {
    let provider = Arc::new(ScriptedProvider::new(
        "scripted",
        2,
        &[
            ("query", vec![1.0, 0.0]),
            ("other", vec![0.0, 1.0]),
            ("same", vec![2.0, 2.0]),
        ],
    ));
    let engine = SemanticSearchEngine::new(&open_config(), provider);
    let chunks: Vec<ChunkInput> = ["other", "same", "same", "same"]
        .iter()
        .map(|t| ChunkInput::new(*t, 0.0, 0.0))
        .collect();
    engine.build_index(&chunks).await.unwrap();

    let results = engine.search("query", 4, Some(0.0)).await.unwrap();
    let ids: Vec<usize> = results.iter().map(|r| r.chunk_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 0]);
    assert!(results
        .windows(2)
        .all(|w| w[0].similarity_score >= w[1].similarity_score));
}

#[tokio::test]
async fn test_zero_vector_chunk_is_searchable() {
    let provider = Arc::new(ScriptedProvider::new(
        "scripted",
        2,
        &[("query", vec![1.0, 0.0]), ("signal", vec![1.0, 0.0])],
    ));
    let engine = SemanticSearchEngine::new(&open_config(), provider);
    let chunks = vec![ChunkInput::new("silence", 0.0, 1.0), ChunkInput::new("signal", 1.0, 2.0)];
    engine.build_index(&chunks).await.unwrap();

    let results = engine.search("query", 2, Some(0.0)).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk_id, 1);
    assert_eq!(results[1].similarity_score, 0.0);
}

#[tokio::test]
async fn test_pairwise_similarity() {
    let engine = hashing_engine(&open_config());

    let same = engine.pairwise_similarity("x", "x").await.unwrap();
    assert!((same - 1.0).abs() < 1e-4);

    let unrelated = engine
        .pairwise_similarity(
            "AI is a field of computer science",
            "Deep learning uses neural networks",
        )
        .await
        .unwrap();
    assert!(unrelated.abs() < 1e-4);

    assert_eq!(engine.pairwise_similarity("", "x").await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_related_excludes_self() {
    let engine = hashing_engine(&open_config());
    engine.build_index(&lecture_chunks()).await.unwrap();

    let related = engine.related(1, 1).await.unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].chunk_id, 2);
    assert_eq!(related[0].rank, 1);

    for position in 0..3 {
        let related = engine.related(position, 5).await.unwrap();
        assert!(related.len() <= 2);
        assert!(related.iter().all(|r| r.chunk_id != position));
        let ranks: Vec<usize> = related.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, (1..=related.len()).collect::<Vec<_>>());
    }

    assert!(engine.related(0, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_related_out_of_range() {
    let engine = hashing_engine(&open_config());
    engine.build_index(&lecture_chunks()).await.unwrap();

    assert!(matches!(
        engine.related(3, 2).await,
        Err(MemoriaError::PositionOutOfRange { position: 3, size: 3 })
    ));
}

#[tokio::test]
async fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let engine = hashing_engine(&open_config());
    engine.build_index(&lecture_chunks()).await.unwrap();
    engine.save(dir.path()).await.unwrap();

    let restored = hashing_engine(&open_config());
    let report = restored.load(dir.path()).await.unwrap();
    assert_eq!(report.chunks, 3);
    assert_eq!(report.dimension, 384);
    assert!(report.model_mismatch.is_none());
    assert_eq!(restored.statistics().await, engine.statistics().await);

    for query in ["What is artificial intelligence?", "learning", "neural networks experience"] {
        let before = engine.search(query, 3, Some(0.0)).await.unwrap();
        let after = restored.search(query, 3, Some(0.0)).await.unwrap();
        assert_eq!(before, after);
    }
}

#[tokio::test]
async fn test_load_reports_model_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let engine = hashing_engine(&open_config());
    engine.build_index(&lecture_chunks()).await.unwrap();
    engine.save(dir.path()).await.unwrap();

    let provider = Arc::new(ScriptedProvider::new("paraphrase-multilingual", 384, &[]));
    let other = SemanticSearchEngine::new(&open_config(), provider);
    let report = other.load(dir.path()).await.unwrap();

    let mismatch = report.model_mismatch.expect("mismatch recorded");
    assert_eq!(mismatch.configured, "paraphrase-multilingual");
    assert_eq!(mismatch.stored, "hashing-384");

    // Queries still run against the loaded index
    assert!(other.search("anything", 2, Some(0.0)).await.is_ok());
    match other.statistics().await {
        IndexStatistics::Ready { model_name, .. } => assert_eq!(model_name, "hashing-384"),
        other => panic!("unexpected statistics: {:?}", other),
    }
}

#[tokio::test]
async fn test_corrupt_load_preserves_state() {
    let dir = tempfile::tempdir().unwrap();
    let engine = hashing_engine(&open_config());
    engine.build_index(&lecture_chunks()).await.unwrap();
    engine.save(dir.path()).await.unwrap();

    let other_dir = tempfile::tempdir().unwrap();
    let small = hashing_engine(&open_config());
    small
        .build_index(&[ChunkInput::new("only one", 0.0, 1.0)])
        .await
        .unwrap();
    small.save(other_dir.path()).await.unwrap();

    // Pair three vectors with one chunk of metadata
    std::fs::copy(
        dir.path().join(VECTORS_FILE),
        other_dir.path().join(VECTORS_FILE),
    )
    .unwrap();

    let before = small.statistics().await;
    assert!(matches!(
        small.load(other_dir.path()).await,
        Err(MemoriaError::CorruptState(_))
    ));
    assert_eq!(small.statistics().await, before);
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let engine = hashing_engine(&open_config());
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();

    engine.build_index(&lecture_chunks()).await.unwrap();
    let stats_once = engine.statistics().await;
    let results_once = engine.search("learning", 3, Some(0.0)).await.unwrap();
    engine.save(first_dir.path()).await.unwrap();

    engine.build_index(&lecture_chunks()).await.unwrap();
    engine.save(second_dir.path()).await.unwrap();

    assert_eq!(engine.statistics().await, stats_once);
    assert_eq!(engine.search("learning", 3, Some(0.0)).await.unwrap(), results_once);
    assert_eq!(
        std::fs::read(first_dir.path().join(VECTORS_FILE)).unwrap(),
        std::fs::read(second_dir.path().join(VECTORS_FILE)).unwrap()
    );
}

#[tokio::test]
async fn test_segments_to_index() {
    let segments = vec![
        Segment::new(0.0, 12.0, "AI is a field"),
        Segment::new(12.0, 28.0, "of computer science"),
        Segment::new(28.0, 50.0, "Deep learning uses"),
        Segment::new(50.0, 58.0, "neural networks"),
    ];
    let chunks = group_segments_by_time(&segments, 30.0).unwrap();
    assert_eq!(chunks.len(), 2);

    let engine = hashing_engine(&open_config());
    engine.build_index(&chunks).await.unwrap();

    let results = engine.search("neural networks", 1, Some(0.0)).await.unwrap();
    assert_eq!(results[0].chunk_id, 1);
    assert_eq!(results[0].start_time, 28.0);
    assert_eq!(results[0].end_time, 58.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_rebuild() {
    let engine = Arc::new(hashing_engine(&open_config()));
    engine.build_index(&lecture_chunks()).await.unwrap();

    let short = vec![
        ChunkInput::new("neural networks", 0.0, 1.0),
        ChunkInput::new("computer science", 1.0, 2.0),
    ];

    let writer = {
        let engine = engine.clone();
        let short = short.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                let chunks = if i % 2 == 0 { short.clone() } else { lecture_chunks() };
                engine.build_index(&chunks).await.unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..20 {
                let results = engine.search("learning networks", 10, Some(-1.0)).await.unwrap();
                assert!(results.len() == 2 || results.len() == 3);
                assert!(results.iter().all(|r| r.chunk_id < results.len()));
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}
