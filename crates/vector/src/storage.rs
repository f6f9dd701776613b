//! Two-artifact index snapshot.
//!
//! `vectors.bin`:
//! - magic: `b"MVEC"`
//! - index type: `[u8; 8]` (`b"FLATIP01"`: flat inner product, layout v1)
//! - vector count `N`: u64 (little-endian)
//! - dimension `D`: u32 (little-endian)
//! - `N * D` f32 (little-endian), row-major
//!
//! `metadata.json`: chunk metadata in position order, the embedding model
//! name and the SHA-256 of the vector payload. Loading cross-checks both
//! artifacts, so vectors from one save never pair with metadata from another.

use chrono::{DateTime, Utc};
use memoria_common::{MemoriaError, Result};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::index::SimilarityIndex;
use crate::store::{Chunk, ChunkStore};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.json";

const MAGIC: &[u8; 4] = b"MVEC";
const INDEX_TYPE_FLAT_IP: &[u8; 8] = b"FLATIP01";
const METADATA_FORMAT_VERSION: u32 = 2;

/// magic(4) + index_type(8) + count(8) + dimension(4)
const HEADER_SIZE: usize = 24;

#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
    format_version: u32,
    created_at: DateTime<Utc>,
    dimension: usize,
    vector_count: usize,
    /// Hex SHA-256 of the f32 payload in `vectors.bin`
    vectors_sha256: String,
    chunks: Vec<Chunk>,
    model_name: String,
}

/// Index, metadata and model identity restored together
#[derive(Debug)]
pub struct IndexSnapshot {
    pub index: SimilarityIndex,
    pub store: ChunkStore,
    pub model_name: String,
}

/// Write `index` and `store` under `dir`.
///
/// Each artifact is written to a `.tmp` sibling, synced, then renamed into
/// place.
pub fn save_snapshot(
    dir: &Path,
    index: &SimilarityIndex,
    store: &ChunkStore,
    model_name: &str,
) -> Result<()> {
    let matrix = index.matrix().ok_or(MemoriaError::IndexNotBuilt)?;
    if matrix.nrows() != store.size() {
        return Err(MemoriaError::corrupt_state(format!(
            "Index has {} vectors but store has {} chunks",
            matrix.nrows(),
            store.size()
        )));
    }

    std::fs::create_dir_all(dir)?;

    let vectors_tmp = temp_path(dir, VECTORS_FILE);
    let metadata_tmp = temp_path(dir, METADATA_FILE);

    let written = write_vectors(&vectors_tmp, matrix).and_then(|vectors_sha256| {
        let metadata = MetadataFile {
            format_version: METADATA_FORMAT_VERSION,
            created_at: Utc::now(),
            dimension: matrix.ncols(),
            vector_count: matrix.nrows(),
            vectors_sha256,
            chunks: store.chunks().to_vec(),
            model_name: model_name.to_string(),
        };
        write_metadata(&metadata_tmp, &metadata)
    });
    if let Err(e) = written {
        let _ = std::fs::remove_file(&vectors_tmp);
        let _ = std::fs::remove_file(&metadata_tmp);
        return Err(e);
    }

    std::fs::rename(&vectors_tmp, dir.join(VECTORS_FILE))?;
    std::fs::rename(&metadata_tmp, dir.join(METADATA_FILE))?;
    Ok(())
}

/// Read and validate the snapshot under `dir`.
pub fn load_snapshot(dir: &Path) -> Result<IndexSnapshot> {
    let (matrix, vectors_sha256) = read_vectors(&dir.join(VECTORS_FILE))?;

    let raw = std::fs::read_to_string(dir.join(METADATA_FILE))?;
    let metadata: MetadataFile = serde_json::from_str(&raw)
        .map_err(|e| MemoriaError::corrupt_state(format!("Unreadable metadata: {}", e)))?;

    if metadata.format_version != METADATA_FORMAT_VERSION {
        return Err(MemoriaError::corrupt_state(format!(
            "Unsupported metadata format version {}",
            metadata.format_version
        )));
    }

    if metadata.vectors_sha256 != vectors_sha256 {
        return Err(MemoriaError::corrupt_state(
            "Vector file does not belong to this metadata (checksum mismatch)",
        ));
    }

    let count = matrix.nrows();
    if metadata.chunks.len() != count || metadata.vector_count != count {
        return Err(MemoriaError::corrupt_state(format!(
            "Vector count {} does not match metadata ({} chunks, {} recorded)",
            count,
            metadata.chunks.len(),
            metadata.vector_count
        )));
    }
    if metadata.dimension != matrix.ncols() {
        return Err(MemoriaError::corrupt_state(format!(
            "Vector dimension {} does not match metadata dimension {}",
            matrix.ncols(),
            metadata.dimension
        )));
    }

    let store = ChunkStore::from_chunks(metadata.chunks)?;
    let index = SimilarityIndex::from_matrix(matrix)
        .map_err(|e| MemoriaError::corrupt_state(format!("Invalid vector matrix: {}", e)))?;

    Ok(IndexSnapshot {
        index,
        store,
        model_name: metadata.model_name,
    })
}

fn temp_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.tmp", name))
}

/// Write the vector artifact, returning the hex SHA-256 of its payload
fn write_vectors(path: &Path, matrix: ArrayView2<'_, f32>) -> Result<String> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let dimension = u32::try_from(matrix.ncols())
        .map_err(|_| MemoriaError::invalid_input("Vector dimension exceeds u32"))?;

    writer.write_all(MAGIC)?;
    writer.write_all(INDEX_TYPE_FLAT_IP)?;
    writer.write_all(&(matrix.nrows() as u64).to_le_bytes())?;
    writer.write_all(&dimension.to_le_bytes())?;

    let mut hasher = Sha256::new();
    for value in matrix.iter() {
        let bytes = value.to_le_bytes();
        hasher.update(bytes);
        writer.write_all(&bytes)?;
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn write_metadata(path: &Path, metadata: &MetadataFile) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, metadata)?;
    writer.flush()?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Read the vector artifact and the hex SHA-256 of its payload
fn read_vectors(path: &Path) -> Result<(Array2<f32>, String)> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < HEADER_SIZE {
        return Err(MemoriaError::corrupt_state(format!(
            "Vector file too short: {} bytes",
            bytes.len()
        )));
    }

    let (header, payload) = bytes.split_at(HEADER_SIZE);
    if &header[0..4] != MAGIC {
        return Err(MemoriaError::corrupt_state("Not a vector file (bad magic)"));
    }
    if &header[4..12] != INDEX_TYPE_FLAT_IP {
        return Err(MemoriaError::corrupt_state(format!(
            "Unsupported index type '{}'",
            String::from_utf8_lossy(&header[4..12])
        )));
    }

    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&header[12..20]);
    let mut dim_bytes = [0u8; 4];
    dim_bytes.copy_from_slice(&header[20..24]);
    let count = u64::from_le_bytes(count_bytes);
    let dimension = u32::from_le_bytes(dim_bytes) as u64;

    let expected_len = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| MemoriaError::corrupt_state("Vector header sizes overflow"))?;
    if payload.len() as u64 != expected_len {
        return Err(MemoriaError::corrupt_state(format!(
            "Vector payload is {} bytes, header declares {} x {}",
            payload.len(),
            count,
            dimension
        )));
    }

    let values: Vec<f32> = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    if let Some(position) = values.iter().position(|v| !v.is_finite()) {
        return Err(MemoriaError::corrupt_state(format!(
            "Non-finite vector value at row {}",
            position / dimension.max(1) as usize
        )));
    }

    let matrix = Array2::from_shape_vec((count as usize, dimension as usize), values)
        .map_err(|e| MemoriaError::corrupt_state(format!("Invalid vector shape: {}", e)))?;
    Ok((matrix, format!("{:x}", Sha256::digest(payload))))
}
