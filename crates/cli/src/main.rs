use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use memoria_common::{logger, AppConfig, EmbeddingBackend};
use memoria_vector::{
    group_segments_by_time, ChunkInput, Segment, SemanticSearchEngine, METADATA_FILE,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "memoria")]
#[command(about = "Memoria - semantic search over lecture transcript chunks", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Overrides {
    /// Snapshot directory
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Embedding backend (ollama, hashing)
    #[arg(long, global = true)]
    backend: Option<EmbeddingBackend>,

    /// Embedding model name
    #[arg(long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed chunks and write a new index snapshot
    Build {
        /// JSON array of {text, start, end}
        #[arg(long, conflicts_with = "segments", required_unless_present = "segments")]
        chunks: Option<PathBuf>,

        /// JSON array of transcript segments {start, end, text}, grouped by time
        #[arg(long)]
        segments: Option<PathBuf>,
    },

    /// Search the index
    Search {
        query: String,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Chunks related to the chunk at a position
    Related {
        position: usize,

        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Cosine similarity of two texts
    Similarity { text_a: String, text_b: String },

    /// Index statistics
    Stats,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_index(engine: &SemanticSearchEngine) -> Result<()> {
    let report = engine.load_default().await.with_context(|| {
        format!("Failed to load index from {}", engine.index_dir().display())
    })?;
    tracing::info!(
        "Loaded index: {} chunks, dimension {}, model {}",
        report.chunks,
        report.dimension,
        report.model_name
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(dir) = cli.overrides.index_dir {
        config.index_dir = dir;
    }
    if let Some(backend) = cli.overrides.backend {
        config.embedding_backend = backend;
    }
    if let Some(model) = cli.overrides.model {
        config.embedding_model = model;
    }
    config.validate()?;

    logger::init_from_config(&config)?;

    let provider = memoria_embed::provider_from_config(&config)?;
    tracing::info!(
        "Embedding provider: {:?} ({})",
        config.embedding_backend,
        provider.model_name()
    );
    let engine = SemanticSearchEngine::new(&config, Arc::clone(&provider));

    match cli.command {
        Commands::Build { chunks, segments } => {
            let inputs: Vec<ChunkInput> = match (chunks, segments) {
                (Some(path), _) => read_json(&path)?,
                (None, Some(path)) => {
                    let segments: Vec<Segment> = read_json(&path)?;
                    group_segments_by_time(&segments, config.chunk_duration_secs as f64)?
                }
                (None, None) => anyhow::bail!("Either --chunks or --segments is required"),
            };

            tracing::info!("Building index from {} chunks", inputs.len());
            let indexed = engine.build_index(&inputs).await?;
            engine.save_default().await?;
            tracing::info!(
                "Index saved to {} ({} chunks)",
                config.index_dir.display(),
                indexed
            );
            print_json(&engine.statistics().await)?;
        }
        Commands::Search { query, top_k, threshold } => {
            load_index(&engine).await?;
            let top_k = top_k.unwrap_or(config.default_top_k);
            let results = engine.search(&query, top_k, threshold).await?;
            tracing::info!("{} results for '{}'", results.len(), query);
            print_json(&results)?;
        }
        Commands::Related { position, top_k } => {
            load_index(&engine).await?;
            let results = match top_k {
                Some(k) => engine.related(position, k).await?,
                None => engine.related_default(position).await?,
            };
            print_json(&results)?;
        }
        Commands::Similarity { text_a, text_b } => {
            let score = engine.pairwise_similarity(&text_a, &text_b).await?;
            print_json(&serde_json::json!({ "similarity": score }))?;
        }
        Commands::Stats => {
            if engine.index_dir().join(METADATA_FILE).exists() {
                load_index(&engine).await?;
            }
            print_json(&engine.statistics().await)?;
        }
    }

    Ok(())
}
